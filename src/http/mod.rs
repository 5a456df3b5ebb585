//! HTTP/1.1 framing and streaming
//!
//! This module implements the message framing pipeline: incremental decoding
//! of a request head out of an unbounded byte stream, a lazy
//! content-length-bounded body reader, and the deferred-header response
//! emission state machine.
//!
//! # Architecture
//!
//! The framing layer is transport-agnostic: the decoder and body reader pull
//! from any [`std::io::Read`] and the response pipeline writes to any
//! [`std::io::Write`], so unit tests run against in-memory buffers while the
//! server hands in both halves of a `TcpStream`.
//!
//! Connections are strictly one-shot. A connection carries exactly one
//! request, read once, and one response, written once; there is no
//! keep-alive, pipelining, or chunked transfer-encoding.

pub mod body;
pub mod headers;
pub mod request;
pub mod response;

pub use body::{BodyInput, BodyReader};
pub use headers::Headers;
pub use request::{decode, Request};
pub use response::ResponsePipeline;

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed before the request head was complete")]
    ConnectionClosed,

    /// The uniform framing error surfaced by the decoder. The underlying
    /// cause is logged, never carried to the peer.
    #[error("bad request")]
    BadRequest,

    #[error("malformed request: {0}")]
    Malformed(String),

    /// Response-contract violation, e.g. status set twice without error
    /// information or a metadata change after the head went out. Fatal to
    /// the worker: the response framing can no longer be trusted.
    #[error("response contract violation: {0}")]
    Contract(String),
}

/// CRLF line ending
pub const CRLF: &str = "\r\n";

/// Head/body boundary in a request
pub const DOUBLE_CRLF: &[u8] = b"\r\n\r\n";

/// Pull size while scanning for the end of the request head
pub const HEAD_CHUNK_SIZE: usize = 512;

/// Default pull size for body reads
pub const BODY_CHUNK_SIZE: usize = 4096;
