//! monogate - a minimal synchronous HTTP/1.1 server
//!
//! This crate serves exactly one request per connection: raw socket bytes are
//! decoded into a request with a streaming, content-length-bounded body
//! reader, handed to an application callback through a WSGI-style
//! "start response, then stream body" contract, and the response is written
//! back with header emission deferred until body data exists.

pub mod gateway;
pub mod http;
pub mod server;
