//! HTTP request decoding
//!
//! The decoder pulls fixed-size chunks off a byte source until the head/body
//! boundary (`\r\n\r\n`) shows up, parses the start-line and header block,
//! and hands the overshoot past the boundary to the body reader as pre-read
//! content.

use std::io::Read;
use std::str;

use bytes::BytesMut;

use super::body::{find, BodyReader};
use super::headers::Headers;
use super::{Error, Result, CRLF, DOUBLE_CRLF, HEAD_CHUNK_SIZE};

/// A decoded HTTP request
///
/// The start-line tokens and headers are fixed at construction; the body
/// reader stays live and is consumed incrementally by the application.
pub struct Request<R> {
    verb: String,
    resource: String,
    version: String,
    headers: Headers,
    body: BodyReader<R>,
}

impl<R> Request<R> {
    /// Get the request verb (uppercased)
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Get the resource path, unparsed
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Get the protocol version token (uppercased)
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Get the headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Get the body reader
    pub fn body_mut(&mut self) -> &mut BodyReader<R> {
        &mut self.body
    }

    /// Decompose into start-line tokens, headers and body reader
    pub fn into_parts(self) -> (String, String, String, Headers, BodyReader<R>) {
        (
            self.verb,
            self.resource,
            self.version,
            self.headers,
            self.body,
        )
    }
}

/// The body length declared by `Content-Length`
///
/// Absent and non-numeric values both mean an empty body; a bad value does
/// not reject the request.
pub fn declared_content_length(headers: &Headers) -> usize {
    headers
        .get("Content-Length")
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0)
}

/// Decode one request from a byte source
///
/// Fails with [`Error::ConnectionClosed`] when the source ends before the
/// head is complete, and with the uniform [`Error::BadRequest`] for every
/// other framing problem; the underlying cause is logged only.
pub fn decode<R: Read>(source: R) -> Result<Request<R>> {
    match decode_inner(source) {
        Ok(request) => Ok(request),
        Err(Error::ConnectionClosed) => Err(Error::ConnectionClosed),
        Err(cause) => {
            log::warn!("rejecting request: {}", cause);
            Err(Error::BadRequest)
        }
    }
}

fn decode_inner<R: Read>(mut source: R) -> Result<Request<R>> {
    let mut buffer = BytesMut::new();

    // The delimiter may straddle pulls, so scan the whole accumulated
    // buffer each round.
    let boundary = loop {
        let mut chunk = [0u8; HEAD_CHUNK_SIZE];
        let pulled = source.read(&mut chunk)?;

        if pulled == 0 {
            return Err(Error::ConnectionClosed);
        }

        buffer.extend_from_slice(&chunk[..pulled]);

        if let Some(pos) = find(&buffer, DOUBLE_CRLF) {
            break pos;
        }
    };

    let lookahead = buffer.split_off(boundary + DOUBLE_CRLF.len());
    buffer.truncate(boundary);

    if !buffer.is_ascii() {
        return Err(Error::Malformed("request head is not ASCII".to_string()));
    }
    let head = str::from_utf8(&buffer).expect("ASCII head is valid UTF-8");

    let mut lines = head.split(CRLF);
    let start_line = lines.next().unwrap_or_default();
    let (verb, resource, version) = parse_start_line(start_line)?;
    let headers = Headers::from_lines(lines);

    let content_length = declared_content_length(&headers);

    // The head pull may have overshot past the framed body; bytes beyond
    // the declared length belong to no message on a one-shot connection
    let mut lookahead = lookahead;
    lookahead.truncate(content_length);

    let body = BodyReader::bounded(source, content_length).with_preread(&lookahead);

    Ok(Request {
        verb,
        resource,
        version,
        headers,
        body,
    })
}

/// Parse `VERB SP RESOURCE SP VERSION`
///
/// Exactly three tokens split on single spaces; anything else is malformed.
fn parse_start_line(line: &str) -> Result<(String, String, String)> {
    let tokens: Vec<&str> = line.split(' ').collect();

    if tokens.len() != 3 {
        return Err(Error::Malformed(format!(
            "start-line has {} tokens, expected 3: {:?}",
            tokens.len(),
            line
        )));
    }

    Ok((
        tokens[0].trim().to_uppercase(),
        tokens[1].trim().to_string(),
        tokens[2].trim().to_uppercase(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Source that delivers at most `step` bytes per pull
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl Trickle {
        fn new(data: &[u8], step: usize) -> Self {
            Trickle {
                data: data.to_vec(),
                pos: 0,
                step,
            }
        }
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self
                .step
                .min(buf.len())
                .min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn test_decode_get_request() {
        let mut request = decode(Cursor::new(b"GET /x HTTP/1.1\r\nHost: h\r\n\r\n".to_vec()))
            .unwrap();

        assert_eq!(request.verb(), "GET");
        assert_eq!(request.resource(), "/x");
        assert_eq!(request.version(), "HTTP/1.1");
        assert_eq!(request.headers().get("Host"), Some("h".to_string()));
        assert_eq!(&request.body_mut().read(100).unwrap()[..], b"");
    }

    #[test]
    fn test_decode_is_fragmentation_independent() {
        let wire = b"POST /submit HTTP/1.1\r\nHost: example\r\nContent-Length: 5\r\n\r\nhello";

        for step in [1, 2, 3, 7, 512] {
            let mut request = decode(Trickle::new(wire, step)).unwrap();

            assert_eq!(request.verb(), "POST");
            assert_eq!(request.resource(), "/submit");
            assert_eq!(
                request.headers().get("Content-Length"),
                Some("5".to_string())
            );
            assert_eq!(&request.body_mut().read_all().unwrap()[..], b"hello");
        }
    }

    #[test]
    fn test_body_lookahead_handed_to_reader() {
        // The head pull overshoots into the body; those bytes must come
        // back out of the reader first.
        let wire = b"POST /x HTTP/1.1\r\nContent-Length: 9\r\n\r\nlive long and prosper";
        let mut request = decode(Cursor::new(wire.to_vec())).unwrap();

        assert_eq!(&request.body_mut().read(500).unwrap()[..], b"live long");
        assert_eq!(&request.body_mut().read(500).unwrap()[..], b"");
    }

    #[test]
    fn test_start_line_tokens_uppercased() {
        let mut request =
            decode(Cursor::new(b"get /MixedCase http/1.1\r\n\r\n".to_vec())).unwrap();

        assert_eq!(request.verb(), "GET");
        assert_eq!(request.resource(), "/MixedCase");
        assert_eq!(request.version(), "HTTP/1.1");
        assert_eq!(&request.body_mut().read_all().unwrap()[..], b"");
    }

    #[test]
    fn test_malformed_start_line() {
        let result = decode(Cursor::new(b"GET /x\r\n\r\n".to_vec()));
        assert!(matches!(result, Err(Error::BadRequest)));

        let result = decode(Cursor::new(b"GET  /x HTTP/1.1\r\n\r\n".to_vec()));
        assert!(matches!(result, Err(Error::BadRequest)));
    }

    #[test]
    fn test_premature_close() {
        let result = decode(Cursor::new(b"GET /x HTTP/1.1\r\nHost: h\r\n".to_vec()));
        assert!(matches!(result, Err(Error::ConnectionClosed)));

        let result = decode(Cursor::new(Vec::<u8>::new()));
        assert!(matches!(result, Err(Error::ConnectionClosed)));
    }

    #[test]
    fn test_non_ascii_head_rejected() {
        let result = decode(Cursor::new(b"GET /caf\xc3\xa9 HTTP/1.1\r\n\r\n".to_vec()));
        assert!(matches!(result, Err(Error::BadRequest)));
    }

    #[test]
    fn test_non_numeric_content_length_means_empty_body() {
        let wire = b"POST /x HTTP/1.1\r\nContent-Length: banana\r\n\r\n";
        let mut request = decode(Cursor::new(wire.to_vec())).unwrap();

        // The unparseable declaration sizes the budget at zero, so nothing
        // further is pulled off the source
        assert_eq!(&request.body_mut().read_all().unwrap()[..], b"");
        assert!(request.body_mut().is_exhausted());
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let wire = b"GET / HTTP/1.1\r\ncontent-type: text/plain\r\n\r\n";
        let request = decode(Cursor::new(wire.to_vec())).unwrap();

        assert_eq!(
            request.headers().get("Content-Type"),
            Some("text/plain".to_string())
        );
    }

    #[test]
    fn test_declared_content_length() {
        let mut headers = Headers::new();
        assert_eq!(declared_content_length(&headers), 0);

        headers.add("Content-Length", "42");
        assert_eq!(declared_content_length(&headers), 42);
    }
}
