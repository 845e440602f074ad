//! # OxiGIF Container
//!
//! Container parsing and bit-exact rewriting for the two file formats the
//! toolkit recompresses:
//!
//! - [`gif`]: GIF 87a/89a images, single frame or animated. Headers,
//!   extensions, palettes and the trailer are retained byte for byte; only
//!   the LZW payload of each frame is replaced.
//! - [`zfile`]: Unix compress `.Z` files in block mode.
//!
//! Both containers decode through `oxigif-lzw` and hand the caller a flat
//! literal byte stream per frame; the re-encoded bit vector goes back through
//! the same container for framing.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod gif;
pub mod zfile;

pub use gif::{Color, Frame, GifImage};
pub use zfile::ZFile;
