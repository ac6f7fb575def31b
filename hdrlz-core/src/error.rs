//! Error types for hdrlz operations.
//!
//! Every failure the codec can report is one of five kinds: a header that is
//! too short, a length outside the supported range, an unknown header
//! selector, a malformed token stream, or a decompressed size that disagrees
//! with the declared one. Compression only fails for inputs above
//! [`MAX_INPUT_SIZE`](crate::MAX_INPUT_SIZE).

use thiserror::Error;

/// The main error type for hdrlz operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HdrLzError {
    /// Not enough bytes to decode the requested header type.
    #[error("Truncated {header} header: need {needed} bytes, have {available}")]
    TruncatedHeader {
        /// Name of the header framing being decoded.
        header: &'static str,
        /// Number of bytes the header needs.
        needed: usize,
        /// Number of bytes that were available.
        available: usize,
    },

    /// A length exceeds what this build can represent or what the caller allows.
    #[error("Length overflow: {length} exceeds maximum {max}")]
    LengthOverflow {
        /// The offending length.
        length: u64,
        /// The maximum accepted length.
        max: u64,
    },

    /// Unrecognized header type selector.
    #[error("Invalid header type selector: {selector}")]
    InvalidHeaderType {
        /// The selector value supplied by the caller.
        selector: i64,
    },

    /// Token stream is structurally invalid.
    #[error("Corrupted stream at offset {offset}: {message}")]
    CorruptedStream {
        /// Byte offset in the compressed input where corruption was detected.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// Decompressed byte count disagrees with the declared length.
    #[error("Length mismatch: header declares {expected} bytes, stream produced {actual}")]
    LengthMismatch {
        /// Declared length.
        expected: usize,
        /// Bytes produced (or about to be produced) by the stream.
        actual: usize,
    },
}

/// Result type alias for hdrlz operations.
pub type Result<T> = std::result::Result<T, HdrLzError>;

impl HdrLzError {
    /// Create a truncated header error.
    pub fn truncated_header(header: &'static str, needed: usize, available: usize) -> Self {
        Self::TruncatedHeader {
            header,
            needed,
            available,
        }
    }

    /// Create a length overflow error.
    pub fn length_overflow(length: u64, max: u64) -> Self {
        Self::LengthOverflow { length, max }
    }

    /// Create an invalid header type error.
    pub fn invalid_header_type(selector: impl Into<i64>) -> Self {
        Self::InvalidHeaderType {
            selector: selector.into(),
        }
    }

    /// Create a corrupted stream error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::CorruptedStream {
            offset,
            message: message.into(),
        }
    }

    /// Create a length mismatch error.
    pub fn length_mismatch(expected: usize, actual: usize) -> Self {
        Self::LengthMismatch { expected, actual }
    }

    /// Shift the offset of a corrupted stream error by `base` bytes.
    ///
    /// Used when a block nested inside a container reports a position
    /// relative to its own start.
    pub fn offset_by(self, base: u64) -> Self {
        match self {
            Self::CorruptedStream { offset, message } => Self::CorruptedStream {
                offset: offset + base,
                message,
            },
            other => other,
        }
    }

    /// Whether the error was raised while reading the length header.
    pub fn is_header_error(&self) -> bool {
        matches!(
            self,
            Self::TruncatedHeader { .. } | Self::InvalidHeaderType { .. }
        )
    }
}
