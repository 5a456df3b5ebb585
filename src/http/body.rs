//! Streaming request body reader
//!
//! The body reader wraps the live byte source left over after the request
//! head was decoded, together with the byte budget declared by
//! `Content-Length`. Reads are served from a small read-ahead buffer that is
//! refilled on demand, and the reader never pulls more bytes from the source
//! than the budget allows, so bytes past the framing boundary are never
//! consumed.

use std::io::Read;

use bytes::{Bytes, BytesMut};

use super::{Result, BODY_CHUNK_SIZE};

// Recognized line terminators, in match priority order
const LINE_ENDINGS: [&[u8]; 3] = [b"\r\n", b"\r", b"\n"];

/// Read interface handed to applications
///
/// Object-safe view of [`BodyReader`] so application code does not need to
/// know the concrete source type.
pub trait BodyInput {
    /// Read up to `size` bytes; fewer only once the source is exhausted
    fn read(&mut self, size: usize) -> Result<Bytes>;

    /// Read the rest of the framed body
    fn read_all(&mut self) -> Result<Bytes>;

    /// Read the next line including its terminator
    fn read_line(&mut self) -> Result<Bytes>;

    /// Drain the body into lines
    fn read_lines(&mut self) -> Result<Vec<Bytes>>;
}

/// Streaming, content-length-bounded body reader
///
/// Created by the request decoder with the decoder's look-ahead overshoot as
/// initial buffered content. Blocking: a pull waits until the source
/// delivers data or reports end-of-data. There is no timeout, so a silent
/// peer with budget remaining holds the caller indefinitely.
pub struct BodyReader<R> {
    source: R,
    buffered: BytesMut,
    source_bytes_left: usize,
    chunk_size: usize,
    source_exhausted: bool,
}

impl<R: Read> BodyReader<R> {
    /// Create a reader with no byte budget (reads until end-of-data)
    pub fn new(source: R) -> Self {
        Self::bounded(source, usize::MAX)
    }

    /// Create a reader that will pull at most `content_length` bytes
    pub fn bounded(source: R, content_length: usize) -> Self {
        BodyReader {
            source,
            buffered: BytesMut::new(),
            source_bytes_left: content_length,
            chunk_size: BODY_CHUNK_SIZE,
            source_exhausted: false,
        }
    }

    /// Seed the buffer with bytes already pulled off the source
    ///
    /// The pre-read bytes count against the content-length budget.
    pub fn with_preread(mut self, preread: &[u8]) -> Self {
        self.source_bytes_left = self.source_bytes_left.saturating_sub(preread.len());
        self.buffered.extend_from_slice(preread);
        self
    }

    /// Override the pull chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Whether the source has reported end-of-data or the budget is spent
    pub fn is_exhausted(&self) -> bool {
        self.source_exhausted || self.source_bytes_left == 0
    }

    /// Read up to `size` bytes
    ///
    /// Returns exactly `size` bytes while that many remain between the
    /// buffer and the source; fewer (possibly zero) once the source is
    /// exhausted. Never returns more than requested.
    pub fn read(&mut self, size: usize) -> Result<Bytes> {
        self.fill_buffer(size)?;
        let take = size.min(self.buffered.len());
        Ok(self.buffered.split_to(take).freeze())
    }

    /// Read the rest of the framed body in one call
    ///
    /// Leaves the reader exhausted; subsequent reads return empty.
    pub fn read_all(&mut self) -> Result<Bytes> {
        let rest = self.buffered.len().saturating_add(self.source_bytes_left);
        self.read(rest)
    }

    /// Read the next line including its terminator
    ///
    /// CRLF, lone CR and lone LF all terminate a line, checked in that
    /// order against the buffered bytes. Once the source exhausts, the
    /// remaining unterminated tail is returned exactly once; after that the
    /// result is empty.
    pub fn read_line(&mut self) -> Result<Bytes> {
        loop {
            for ending in LINE_ENDINGS {
                if let Some(pos) = find(&self.buffered, ending) {
                    return Ok(self.buffered.split_to(pos + ending.len()).freeze());
                }
            }

            if self.source_exhausted {
                let tail = self.buffered.split_to(self.buffered.len());
                return Ok(tail.freeze());
            }

            let target = self.buffered.len() + self.chunk_size;
            self.fill_buffer(target)?;
        }
    }

    /// Drain the body into a sequence of lines
    ///
    /// Includes the final unterminated fragment if present.
    pub fn read_lines(&mut self) -> Result<Vec<Bytes>> {
        let mut lines = Vec::new();

        loop {
            let line = self.read_line()?;
            if line.is_empty() {
                return Ok(lines);
            }
            lines.push(line);
        }
    }

    /// Pull from the source until the buffer holds `target` bytes or the
    /// source is exhausted
    ///
    /// Each pull is capped at `min(chunk_size, remaining_budget)`; with the
    /// budget spent the pull is zero-length, the source reports zero bytes,
    /// and the exhausted flag latches. This bound is what keeps the reader
    /// from consuming bytes past the framing boundary.
    fn fill_buffer(&mut self, target: usize) -> Result<()> {
        while self.buffered.len() < target && !self.source_exhausted {
            let max_allowed = self.chunk_size.min(self.source_bytes_left);
            let mut chunk = vec![0u8; max_allowed];

            let pulled = self.source.read(&mut chunk)?;
            if pulled == 0 {
                self.source_exhausted = true;
                break;
            }

            self.source_bytes_left = self.source_bytes_left.saturating_sub(pulled);
            self.buffered.extend_from_slice(&chunk[..pulled]);
        }

        Ok(())
    }
}

impl<R: Read> BodyInput for BodyReader<R> {
    fn read(&mut self, size: usize) -> Result<Bytes> {
        BodyReader::read(self, size)
    }

    fn read_all(&mut self) -> Result<Bytes> {
        BodyReader::read_all(self)
    }

    fn read_line(&mut self) -> Result<Bytes> {
        BodyReader::read_line(self)
    }

    fn read_lines(&mut self) -> Result<Vec<Bytes>> {
        BodyReader::read_lines(self)
    }
}

/// Find the first occurrence of `needle` in `haystack`
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
