//! LZW-specific error types.

use oxigif_core::OxiGifError;
use thiserror::Error;

/// LZW decoding and optimization errors.
#[derive(Debug, Error)]
pub enum LzwError {
    /// A token beyond the current dictionary was read.
    #[error("Invalid LZW token {token} with {dict_size} dictionary entries at bit {position}")]
    InvalidToken {
        /// The offending token.
        token: u32,
        /// Dictionary entries at the time of the error.
        dict_size: u32,
        /// Bit position within the LZW payload.
        position: u64,
    },

    /// The first token after a dictionary reset must be a literal.
    #[error("Block starts with token {token}, which is not a literal")]
    BlockStartNotLiteral {
        /// The offending token.
        token: u32,
    },

    /// The dictionary exceeded the format's code space.
    #[error("Dictionary overflow: more than {max} entries")]
    DictionaryOverflow {
        /// Maximum number of entries the format allows.
        max: u32,
    },

    /// Invalid code size.
    #[error("Invalid code size: {0}")]
    InvalidCodeSize(u8),

    /// GIF payloads must end with an empty sub-block.
    #[error("LZW payload is not terminated by an empty sub-block")]
    UnterminatedStream,

    /// A code straddled into a sub-block that cannot hold it.
    #[error("Sub-block too short for a {needed}-bit code")]
    SubBlockTooShort {
        /// Remaining bits the code still needed.
        needed: u8,
    },

    /// The encoder was given no input.
    #[error("Empty input")]
    EmptyInput,

    /// A block may only start at a multiple of the alignment.
    #[error("Block may not start at unaligned offset {from} (alignment {alignment})")]
    UnalignedBlockStart {
        /// Requested block start.
        from: u32,
        /// Configured alignment.
        alignment: u32,
    },

    /// No scored block continues from this offset.
    #[error(
        "Gap between blocks at offset {position}: choose a smaller alignment or a higher token limit"
    )]
    BlockGap {
        /// Input offset with no continuation.
        position: u32,
    },

    /// A `.Z` dictionary restart is only representable at the widest code size.
    #[error("Dictionary restarts need 16-bit codes, current code size is {code_size}")]
    RestartCodeSize {
        /// Code size at the attempted restart.
        code_size: u8,
    },

    /// A non-empty block produced no output.
    #[error("Block at offset {position} with length {length} produced no output")]
    EmptyBlock {
        /// Block start.
        position: u32,
        /// Block length in bytes.
        length: u32,
    },

    /// Settings combination the encoder cannot work with.
    #[error("Invalid settings: {message}")]
    InvalidSettings {
        /// Description of the problem.
        message: String,
    },

    /// Error from the underlying bit reader.
    #[error(transparent)]
    Bitstream(#[from] OxiGifError),
}

/// Result type for LZW operations.
pub type Result<T> = std::result::Result<T, LzwError>;

impl LzwError {
    /// Create an invalid settings error.
    pub fn invalid_settings(message: impl Into<String>) -> Self {
        Self::InvalidSettings {
            message: message.into(),
        }
    }
}

impl From<LzwError> for OxiGifError {
    fn from(err: LzwError) -> Self {
        match err {
            LzwError::Bitstream(inner) => inner,
            other => OxiGifError::Lzw {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LzwError::InvalidToken {
            token: 4097,
            dict_size: 4095,
            position: 1234,
        };
        assert!(err.to_string().contains("4097"));

        let err = LzwError::BlockGap { position: 500 };
        assert!(err.to_string().contains("alignment"));
    }

    #[test]
    fn test_conversion_to_container_error() {
        let err: OxiGifError = LzwError::UnterminatedStream.into();
        assert!(matches!(err, OxiGifError::Lzw { .. }));

        let inner = OxiGifError::unexpected_eof(1);
        let err: OxiGifError = LzwError::Bitstream(inner).into();
        assert!(matches!(err, OxiGifError::UnexpectedEof { .. }));
    }
}
