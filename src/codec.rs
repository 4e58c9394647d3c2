//! Line framing for requests and responses.
//!
//! Every frame is one line of UTF-8 text terminated by a line feed:
//!
//! ```text
//! request  = action SP message LF
//! response = message LF
//! ```
//!
//! The action runs up to the first space and may not be empty. Message
//! fields escape backslash, line feed and carriage return as `\\`, `\n` and
//! `\r`, so any string survives the trip. A carriage return immediately
//! before the terminator is discarded, which lets line-oriented tools such as
//! `telnet` talk to the server.
//!
//! The free functions work on complete buffers. [`RequestCodec`] and
//! [`ResponseCodec`] adapt the same grammar to `tokio_util`'s
//! [`Decoder`]/[`Encoder`] traits, accumulating partial reads until a
//! terminator arrives.

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

pub mod error;

pub use error::{CodecError, FramingError};

use crate::message::{Request, Response};

/// Frame terminator.
pub const TERMINATOR: u8 = b'\n';

/// Separator between action and message.
pub const DELIMITER: u8 = b' ';

/// Minimum frame length in bytes.
///
/// Frame lengths passed to codec constructors are clamped to at least this
/// value.
pub const MIN_FRAME_LENGTH: usize = 64;

/// Maximum frame length in bytes (16 MiB).
///
/// Frame lengths passed to codec constructors are clamped to at most this
/// value to prevent unbounded buffering.
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

/// Frame length used when none is configured (64 KiB).
pub const DEFAULT_FRAME_LENGTH: usize = 64 * 1024;

pub(crate) fn clamp_frame_length(value: usize) -> usize {
    value.clamp(MIN_FRAME_LENGTH, MAX_FRAME_LENGTH)
}

/// Decode one complete request frame.
///
/// `bytes` must hold exactly one frame, terminator included.
///
/// # Errors
///
/// Returns [`CodecError::MalformedRequest`] if the terminator or delimiter is
/// missing, either field is empty, the frame is not UTF-8, an escape is
/// invalid, bytes follow the terminator, or the buffer is longer than
/// [`MAX_FRAME_LENGTH`].
///
/// # Examples
///
/// ```
/// use parley::codec::decode_request;
///
/// let request = decode_request(b"upper hello world\n").expect("valid frame");
/// assert_eq!(request.action, "upper");
/// assert_eq!(request.message, "hello world");
/// assert!(decode_request(b"upper\n").is_err());
/// ```
pub fn decode_request(bytes: &[u8]) -> Result<Request, CodecError> {
    let line = single_line(bytes).map_err(CodecError::MalformedRequest)?;
    parse_request_line(line).map_err(CodecError::MalformedRequest)
}

/// Encode a response as a single frame. Never fails.
///
/// ```
/// use parley::{codec::encode_response, message::Response};
///
/// let bytes = encode_response(&Response::new("two\nlines"));
/// assert_eq!(&bytes[..], b"two\\nlines\n");
/// ```
#[must_use]
pub fn encode_response(response: &Response) -> Bytes {
    let mut dst = BytesMut::with_capacity(response.message.len() + 1);
    put_response(response, &mut dst);
    dst.freeze()
}

/// Encode a request as a single frame.
///
/// # Errors
///
/// Returns a [`FramingError`] if the action is empty or contains a space or
/// line feed, or if the message is empty.
pub fn encode_request(request: &Request) -> Result<Bytes, FramingError> {
    let mut dst = BytesMut::with_capacity(request.action.len() + request.message.len() + 2);
    put_request(request, &mut dst)?;
    Ok(dst.freeze())
}

/// Decode one complete response frame.
///
/// # Errors
///
/// Returns [`CodecError::MalformedResponse`] if the terminator is missing,
/// the frame is not UTF-8, an escape is invalid, or bytes follow the
/// terminator.
pub fn decode_response(bytes: &[u8]) -> Result<Response, CodecError> {
    let line = single_line(bytes).map_err(CodecError::MalformedResponse)?;
    parse_response_line(line).map_err(CodecError::MalformedResponse)
}

/// Split off the single line in `bytes`, without its terminator.
fn single_line(bytes: &[u8]) -> Result<&[u8], FramingError> {
    if bytes.len() > MAX_FRAME_LENGTH {
        return Err(FramingError::OversizedFrame {
            size: bytes.len(),
            max: MAX_FRAME_LENGTH,
        });
    }
    let end = bytes
        .iter()
        .position(|&b| b == TERMINATOR)
        .ok_or(FramingError::MissingTerminator)?;
    let count = bytes.len() - end - 1;
    if count > 0 {
        return Err(FramingError::TrailingBytes { count });
    }
    Ok(&bytes[..end])
}

fn strip_carriage_return(line: &[u8]) -> &[u8] { line.strip_suffix(b"\r").unwrap_or(line) }

fn parse_request_line(line: &[u8]) -> Result<Request, FramingError> {
    let line = std::str::from_utf8(strip_carriage_return(line))
        .map_err(|_| FramingError::InvalidUtf8)?;
    let (action, message) = line
        .split_once(char::from(DELIMITER))
        .ok_or(FramingError::MissingDelimiter)?;
    if action.is_empty() {
        return Err(FramingError::EmptyAction);
    }
    let message = unescape(message)?;
    if message.is_empty() {
        return Err(FramingError::EmptyMessage);
    }
    Ok(Request {
        action: action.to_owned(),
        message,
    })
}

fn parse_response_line(line: &[u8]) -> Result<Response, FramingError> {
    let line = std::str::from_utf8(strip_carriage_return(line))
        .map_err(|_| FramingError::InvalidUtf8)?;
    Ok(Response {
        message: unescape(line)?,
    })
}

fn put_request(request: &Request, dst: &mut BytesMut) -> Result<(), FramingError> {
    let action = request.action.as_bytes();
    if action.is_empty() {
        return Err(FramingError::EmptyAction);
    }
    if action.iter().any(|&b| b == DELIMITER || b == TERMINATOR) {
        return Err(FramingError::ReservedCharacter);
    }
    if request.message.is_empty() {
        return Err(FramingError::EmptyMessage);
    }
    dst.reserve(action.len() + request.message.len() + 2);
    dst.put_slice(action);
    dst.put_u8(DELIMITER);
    escape_into(&request.message, dst);
    dst.put_u8(TERMINATOR);
    Ok(())
}

fn put_response(response: &Response, dst: &mut BytesMut) {
    dst.reserve(response.message.len() + 1);
    escape_into(&response.message, dst);
    dst.put_u8(TERMINATOR);
}

fn escape_into(text: &str, dst: &mut BytesMut) {
    for &b in text.as_bytes() {
        match b {
            b'\\' => dst.put_slice(b"\\\\"),
            b'\n' => dst.put_slice(b"\\n"),
            b'\r' => dst.put_slice(b"\\r"),
            other => dst.put_u8(other),
        }
    }
}

fn unescape(text: &str) -> Result<String, FramingError> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices();
    while let Some((offset, c)) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some((_, '\\')) => out.push('\\'),
            Some((_, 'n')) => out.push('\n'),
            Some((_, 'r')) => out.push('\r'),
            _ => return Err(FramingError::InvalidEscape { offset }),
        }
    }
    Ok(out)
}

/// Incremental line splitter shared by both streaming codecs.
#[derive(Clone, Debug)]
struct LineSplitter {
    max_frame_length: usize,
    /// Bytes already searched for a terminator.
    scanned: usize,
}

impl LineSplitter {
    fn new(max_frame_length: usize) -> Self {
        Self {
            max_frame_length: clamp_frame_length(max_frame_length),
            scanned: 0,
        }
    }

    /// Remove the next complete line from `src`, terminator included.
    fn next_line(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, FramingError> {
        let found = src[self.scanned..]
            .iter()
            .position(|&b| b == TERMINATOR)
            .map(|i| self.scanned + i);
        match found {
            Some(end) => {
                self.scanned = 0;
                if end + 1 > self.max_frame_length {
                    return Err(FramingError::OversizedFrame {
                        size: end + 1,
                        max: self.max_frame_length,
                    });
                }
                Ok(Some(src.split_to(end + 1)))
            }
            None if src.len() > self.max_frame_length => Err(FramingError::OversizedFrame {
                size: src.len(),
                max: self.max_frame_length,
            }),
            None => {
                self.scanned = src.len();
                Ok(None)
            }
        }
    }

    /// Like [`next_line`](Self::next_line), but a leftover partial frame at
    /// end of stream is an error. An empty buffer is a clean close.
    fn last_line(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, FramingError> {
        if let Some(line) = self.next_line(src)? {
            return Ok(Some(line));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let bytes_received = src.len();
        src.clear();
        self.scanned = 0;
        Err(FramingError::Truncated { bytes_received })
    }
}

fn without_terminator(line: &BytesMut) -> &[u8] { &line[..line.len() - 1] }

/// Server-side codec: decodes [`Request`]s and encodes [`Response`]s.
#[derive(Clone, Debug)]
pub struct RequestCodec {
    lines: LineSplitter,
}

impl RequestCodec {
    /// Construct a codec accepting frames up to `max_frame_length` bytes.
    ///
    /// The limit is clamped to [`MIN_FRAME_LENGTH`]..=[`MAX_FRAME_LENGTH`].
    #[must_use]
    pub fn new(max_frame_length: usize) -> Self {
        Self {
            lines: LineSplitter::new(max_frame_length),
        }
    }

    /// Return the maximum frame length accepted by this codec.
    #[must_use]
    pub fn max_frame_length(&self) -> usize { self.lines.max_frame_length }
}

impl Default for RequestCodec {
    fn default() -> Self { Self::new(DEFAULT_FRAME_LENGTH) }
}

impl Decoder for RequestCodec {
    type Item = Request;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(line) = self
            .lines
            .next_line(src)
            .map_err(CodecError::MalformedRequest)?
        else {
            return Ok(None);
        };
        parse_request_line(without_terminator(&line))
            .map(Some)
            .map_err(CodecError::MalformedRequest)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(line) = self
            .lines
            .last_line(src)
            .map_err(CodecError::MalformedRequest)?
        else {
            return Ok(None);
        };
        parse_request_line(without_terminator(&line))
            .map(Some)
            .map_err(CodecError::MalformedRequest)
    }
}

impl Encoder<Response> for RequestCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Response, dst: &mut BytesMut) -> Result<(), Self::Error> {
        put_response(&item, dst);
        Ok(())
    }
}

/// Client-side codec: encodes [`Request`]s and decodes [`Response`]s.
#[derive(Clone, Debug)]
pub struct ResponseCodec {
    lines: LineSplitter,
}

impl ResponseCodec {
    /// Construct a codec accepting response frames up to `max_frame_length`
    /// bytes.
    #[must_use]
    pub fn new(max_frame_length: usize) -> Self {
        Self {
            lines: LineSplitter::new(max_frame_length),
        }
    }
}

impl Default for ResponseCodec {
    fn default() -> Self { Self::new(MAX_FRAME_LENGTH) }
}

impl Decoder for ResponseCodec {
    type Item = Response;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(line) = self
            .lines
            .next_line(src)
            .map_err(CodecError::MalformedResponse)?
        else {
            return Ok(None);
        };
        parse_response_line(without_terminator(&line))
            .map(Some)
            .map_err(CodecError::MalformedResponse)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(line) = self
            .lines
            .last_line(src)
            .map_err(CodecError::MalformedResponse)?
        else {
            return Ok(None);
        };
        parse_response_line(without_terminator(&line))
            .map(Some)
            .map_err(CodecError::MalformedResponse)
    }
}

impl Encoder<Request> for ResponseCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        put_request(&item, dst).map_err(CodecError::MalformedRequest)
    }
}

#[cfg(test)]
mod tests;
