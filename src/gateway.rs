//! Application bridge
//!
//! The boundary between the framing layer and request-handling logic: the
//! server hands the application a request environment plus a one-shot
//! status-setting handle, and the application hands back a lazily-produced
//! sequence of body chunks.

use bytes::Bytes;

use crate::http::{BodyInput, Error, Headers, Result};

/// Error type applications fail with
pub type AppError = Box<dyn std::error::Error + Send + Sync>;

/// Lazily-produced response body
pub type BodyChunks = Box<dyn Iterator<Item = Bytes> + Send>;

/// What an application call produces
pub type AppResult = std::result::Result<BodyChunks, AppError>;

/// Request environment handed to the application
///
/// Carries the decoded start-line tokens, the negotiated metadata the
/// application usually needs, and the live body reader.
pub struct Environ<'a> {
    /// Request verb, uppercased
    pub method: String,
    /// Resource path, unparsed
    pub path: String,
    /// Protocol version token, uppercased
    pub protocol: String,
    /// Value of the `Content-Type` header, if any
    pub content_type: Option<String>,
    /// Declared body length in bytes
    pub content_length: usize,
    /// Configured listen host
    pub server_host: String,
    /// Configured listen port
    pub server_port: u16,
    /// Streaming request body
    pub input: &'a mut dyn BodyInput,
}

/// One-shot status/headers collector
///
/// The application must call [`StartResponse::start`] exactly once under
/// normal operation. A repeat call is accepted only when it carries error
/// information, in which case it replaces the pending metadata; the
/// emission pipeline has not written anything while the application is
/// still running, so the replacement is always in time.
#[derive(Default)]
pub struct StartResponse {
    status: Option<String>,
    headers: Option<Headers>,
}

impl StartResponse {
    /// Create an empty collector
    pub fn new() -> Self {
        StartResponse::default()
    }

    /// Set the response status line and headers
    ///
    /// `error` is the error-information channel: a second call without it
    /// is a contract violation, a second call with it replaces the pending
    /// metadata.
    pub fn start<N, V>(
        &mut self,
        status: impl Into<String>,
        header_pairs: impl IntoIterator<Item = (N, V)>,
        error: Option<&AppError>,
    ) -> Result<()>
    where
        N: AsRef<str>,
        V: Into<String>,
    {
        if self.status.is_some() && error.is_none() {
            return Err(Error::Contract(
                "status and headers already set, and no error provided".to_string(),
            ));
        }

        self.status = Some(status.into());
        self.headers = Some(Headers::from_pairs(header_pairs));
        Ok(())
    }

    /// Whether the application has provided metadata
    pub fn is_set(&self) -> bool {
        self.status.is_some()
    }

    /// Take the collected status and headers
    pub fn into_parts(self) -> Option<(String, Headers)> {
        match (self.status, self.headers) {
            (Some(status), Some(headers)) => Some((status, headers)),
            _ => None,
        }
    }
}

/// A request-handling callback
///
/// Implemented for free by any matching closure or function. The
/// application consumes the environment (headers and body), sets its
/// status and headers through `response`, and returns the body chunks.
pub trait Application: Send + Sync {
    fn call(&self, env: Environ<'_>, response: &mut StartResponse) -> AppResult;
}

impl<F> Application for F
where
    F: Fn(Environ<'_>, &mut StartResponse) -> AppResult + Send + Sync,
{
    fn call(&self, env: Environ<'_>, response: &mut StartResponse) -> AppResult {
        self(env, response)
    }
}
