//! Error types for the codec layer.
//!
//! [`FramingError`] names the way a frame violated the line grammar;
//! [`CodecError`] wraps it with the direction it was read in, plus transport
//! failures surfaced while reading.

use std::io;

use thiserror::Error;

/// Violations of the line framing grammar.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// The bytes end without a line feed.
    #[error("missing terminator")]
    MissingTerminator,

    /// The request line carries no space between action and message.
    #[error("missing delimiter between action and message")]
    MissingDelimiter,

    /// The action field is empty.
    #[error("empty action")]
    EmptyAction,

    /// The request message field is empty.
    #[error("empty message")]
    EmptyMessage,

    /// The action contains a byte reserved by the framing.
    #[error("action contains a reserved character")]
    ReservedCharacter,

    /// The frame is not valid UTF-8.
    #[error("frame is not valid UTF-8")]
    InvalidUtf8,

    /// A backslash is followed by something other than `\`, `n` or `r`.
    #[error("invalid escape sequence at byte {offset}")]
    InvalidEscape {
        /// Offset of the backslash within the message field.
        offset: usize,
    },

    /// Bytes follow the terminator of a single-frame buffer.
    #[error("{count} unexpected bytes after terminator")]
    TrailingBytes {
        /// Number of bytes after the terminator.
        count: usize,
    },

    /// The frame grew past the configured maximum without terminating.
    #[error("frame exceeds max length: {size} > {max}")]
    OversizedFrame {
        /// Bytes buffered when the limit was hit.
        size: usize,
        /// Maximum allowed frame size.
        max: usize,
    },

    /// The stream ended part way through a frame.
    #[error("stream ended after {bytes_received} bytes of an incomplete frame")]
    Truncated {
        /// Bytes of the partial frame received before end of stream.
        bytes_received: usize,
    },
}

/// Top-level codec error.
///
/// # Examples
///
/// ```
/// use parley::codec::{CodecError, FramingError};
///
/// let err = CodecError::MalformedRequest(FramingError::EmptyAction);
/// assert_eq!(err.to_string(), "malformed request: empty action");
/// assert!(err.is_malformed());
/// ```
#[derive(Debug, Error)]
pub enum CodecError {
    /// A request frame broke the framing grammar.
    #[error("malformed request: {0}")]
    MalformedRequest(FramingError),

    /// A response frame broke the framing grammar.
    #[error("malformed response: {0}")]
    MalformedResponse(FramingError),

    /// Reading from the transport failed.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

impl CodecError {
    /// Whether the error came from the peer's bytes rather than the transport.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedRequest(_) | Self::MalformedResponse(_))
    }

    /// The framing violation, if this is a malformed frame.
    #[must_use]
    pub fn framing(&self) -> Option<&FramingError> {
        match self {
            Self::MalformedRequest(e) | Self::MalformedResponse(e) => Some(e),
            Self::Io(_) => None,
        }
    }
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
