//! # OxiGIF Core
//!
//! Core components for the OxiGIF recompression toolkit.
//!
//! This crate provides the building blocks shared by the codec and container
//! layers:
//!
//! - [`bitstream`]: bit-granular reading and a growable bit vector, both
//!   LSB-first as required by GIF and Unix compress bitstreams
//! - [`error`]: error types
//!
//! ## Architecture
//!
//! OxiGIF is layered:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ CLI                                          │
//! │     option parsing, progress, summary        │
//! ├──────────────────────────────────────────────┤
//! │ Container                                    │
//! │     GIF header/frame parsing, .Z header,     │
//! │     bit-exact rewriting                      │
//! ├──────────────────────────────────────────────┤
//! │ Codec                                        │
//! │     LZW decoder, trie, non-greedy encoder,   │
//! │     block-boundary optimizer                 │
//! ├──────────────────────────────────────────────┤
//! │ BitStream (this crate)                       │
//! │     BitReader / BitVec                       │
//! └──────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod bitstream;
pub mod error;

pub use bitstream::{BitReader, BitVec};
pub use error::{OxiGifError, Result};
