//! Response emission pipeline
//!
//! Implements the deferred-header contract: status and headers are accepted
//! exactly once, but nothing hits the wire until the body produces its first
//! non-empty chunk or is proven empty. The original callback-and-flags
//! protocol is modeled as an explicit state machine so a late metadata
//! change is a checkable transition error instead of a silent overwrite.

use std::io::Write;

use bytes::Bytes;

use super::headers::Headers;
use super::{Error, Result, CRLF};

/// Status line for rejected requests
pub const BAD_REQUEST: &str = "400 Bad Request";

/// Status line for application failures
pub const INTERNAL_SERVER_ERROR: &str = "500 Internal Server Error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingResponse,
    MetadataSet,
    HeadersSent,
    BodyStreaming,
    Done,
}

/// One-shot response writer
///
/// Owns the write half of the connection for the lifetime of the response.
/// Transitions: `AwaitingResponse → MetadataSet → HeadersSent →
/// BodyStreaming → Done`; every transition is guarded and a violation
/// surfaces as [`Error::Contract`].
pub struct ResponsePipeline<W: Write> {
    transport: W,
    state: State,
    status: Option<String>,
    headers: Headers,
}

impl<W: Write> ResponsePipeline<W> {
    /// Create a pipeline over a transport
    pub fn new(transport: W) -> Self {
        ResponsePipeline {
            transport,
            state: State::AwaitingResponse,
            status: None,
            headers: Headers::new(),
        }
    }

    /// Accept status and headers, exactly once
    ///
    /// A second call is a contract violation; the error-carrying replacement
    /// path is [`ResponsePipeline::override_metadata`].
    pub fn set_metadata(&mut self, status: impl Into<String>, headers: Headers) -> Result<()> {
        if self.state != State::AwaitingResponse {
            return Err(Error::Contract(
                "status and headers already set".to_string(),
            ));
        }

        self.status = Some(status.into());
        self.headers = headers;
        self.state = State::MetadataSet;
        Ok(())
    }

    /// Replace pending metadata on behalf of an error
    ///
    /// Permitted only while nothing has been written; once the head is on
    /// the wire the status line cannot be taken back and the violation is
    /// fatal.
    pub fn override_metadata(&mut self, status: impl Into<String>, headers: Headers) -> Result<()> {
        match self.state {
            State::AwaitingResponse | State::MetadataSet => {
                self.status = Some(status.into());
                self.headers = headers;
                self.state = State::MetadataSet;
                Ok(())
            }
            _ => Err(Error::Contract(
                "head already sent, status can no longer change".to_string(),
            )),
        }
    }

    /// Stream the body and complete the response
    ///
    /// Pulls chunks until the first non-empty one before writing anything;
    /// an all-empty body still gets a complete head so the client always
    /// receives a valid response line. Chunks are forwarded verbatim, in
    /// order, with no additional framing — the producer is responsible for
    /// matching any `Content-Length` it declared.
    pub fn stream_body<I>(&mut self, body: I) -> Result<()>
    where
        I: IntoIterator<Item = Bytes>,
    {
        if self.state != State::MetadataSet {
            return Err(Error::Contract(format!(
                "body streamed in state {:?}",
                self.state
            )));
        }

        let mut chunks = body.into_iter();
        let first = chunks.by_ref().find(|chunk| !chunk.is_empty());

        self.send_head()?;
        self.state = State::BodyStreaming;

        if let Some(chunk) = first {
            self.transport.write_all(&chunk)?;
            for chunk in chunks {
                self.transport.write_all(&chunk)?;
            }
        }

        self.transport.flush()?;
        self.state = State::Done;
        Ok(())
    }

    /// Whether the response ran to completion
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    fn send_head(&mut self) -> Result<()> {
        let status = self.status.as_deref().unwrap_or_default();
        log::debug!("sending response head: {}", status);

        write!(self.transport, "HTTP/1.1 {}{}", status, CRLF)?;
        for line in self.headers.to_lines() {
            write!(self.transport, "{}{}", line, CRLF)?;
        }
        self.transport.write_all(CRLF.as_bytes())?;

        self.state = State::HeadersSent;
        Ok(())
    }
}
