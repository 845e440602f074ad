//! # OxiGIF LZW
//!
//! Lossless LZW recompression for GIF and Unix compress (`.Z`) bitstreams.
//!
//! The decoder recovers the literal byte stream from an existing file. The
//! encoder then searches for a cheaper encoding of the same bytes along two
//! axes:
//!
//! - **Non-greedy parsing**: sometimes a shorter match now enables a much
//!   longer match right after it, saving a whole code.
//! - **Block boundaries**: a reverse dynamic program over the input picks the
//!   positions where emitting a clear code (dictionary reset) minimizes the
//!   total encoded bit length.
//!
//! The output decodes to exactly the same bytes, only the token stream
//! changes.
//!
//! ## Example
//!
//! ```
//! use oxigif_lzw::{recompress, Flavor, OptimizationSettings};
//!
//! let pixels = vec![0u8, 1, 0, 1, 0, 1, 0, 1];
//! let mut settings = OptimizationSettings::gif(2);
//! settings.start_with_clear_code = false;
//! let bits = recompress(&pixels, Flavor::Gif, &settings, false).unwrap();
//! assert!(!bits.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

mod decoder;
mod dictionary;
mod encoder;
mod error;
mod settings;

pub use decoder::LzwDecoder;
pub use dictionary::CodeTrie;
pub use encoder::{BlockStats, LzwEncoder};
pub use error::{LzwError, Result};
pub use settings::{Flavor, OptimizationSettings};

use oxigif_core::BitVec;

/// Recompress a literal byte stream end to end.
///
/// Runs the reverse scoring pass over every aligned offset, then re-encodes
/// along the optimal restart set. `smart_greedy` scores each offset twice
/// (non-greedy, then greedy) and keeps the cheaper parse per block.
///
/// This is the convenience entry point; callers that want progress reporting
/// drive [`LzwEncoder::optimize_partial`] themselves.
pub fn recompress(
    data: &[u8],
    flavor: Flavor,
    settings: &OptimizationSettings,
    smart_greedy: bool,
) -> Result<BitVec> {
    let mut encoder = LzwEncoder::new(data, flavor);
    encoder.scan(settings, smart_greedy)?;
    encoder.optimize(settings)
}
