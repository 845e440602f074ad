//! Error types for OxiGIF operations.
//!
//! This module provides the error type shared by the bitstream and container
//! layers. The codec crate defines its own error type and converts into this
//! one at the container boundary.

use std::io;
use thiserror::Error;

/// The main error type for OxiGIF operations.
#[derive(Debug, Error)]
pub enum OxiGifError {
    /// I/O error from underlying reader/writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid magic number in file header.
    #[error("Invalid magic number: expected {expected:02x?}, found {found:02x?}")]
    InvalidMagic {
        /// Expected magic bytes.
        expected: Vec<u8>,
        /// Actual magic bytes found.
        found: Vec<u8>,
    },

    /// Invalid header format.
    #[error("Invalid header: {message}")]
    InvalidHeader {
        /// Description of the header error.
        message: String,
    },

    /// Unexpected end of file.
    #[error("Unexpected end of file: expected {expected} more bytes")]
    UnexpectedEof {
        /// Number of bytes that were expected but not available.
        expected: usize,
    },

    /// Corrupted data in file.
    #[error("Corrupted data at offset {offset}: {message}")]
    CorruptedData {
        /// Byte offset where corruption was detected.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// Feature is valid but not supported.
    #[error("Not supported: {message}")]
    NotSupported {
        /// Description of the unsupported feature.
        message: String,
    },

    /// LZW codec error.
    #[error("LZW error: {message}")]
    Lzw {
        /// Description of the codec failure.
        message: String,
    },
}

/// Result type alias for OxiGIF operations.
pub type Result<T> = std::result::Result<T, OxiGifError>;

impl OxiGifError {
    /// Create an invalid magic error.
    pub fn invalid_magic(expected: impl Into<Vec<u8>>, found: impl Into<Vec<u8>>) -> Self {
        Self::InvalidMagic {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create an invalid header error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Create an unexpected EOF error.
    pub fn unexpected_eof(expected: usize) -> Self {
        Self::UnexpectedEof { expected }
    }

    /// Create a corrupted data error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::CorruptedData {
            offset,
            message: message.into(),
        }
    }

    /// Create a not supported error.
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OxiGifError::invalid_magic(vec![0x1F, 0x9D], vec![0x47, 0x49]);
        assert!(err.to_string().contains("Invalid magic"));

        let err = OxiGifError::invalid_header("missing image descriptor");
        assert!(err.to_string().contains("missing image descriptor"));

        let err = OxiGifError::corrupted(13, "sub-block overruns file");
        assert!(err.to_string().contains("offset 13"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: OxiGifError = io_err.into();
        assert!(matches!(err, OxiGifError::Io(_)));
    }
}
