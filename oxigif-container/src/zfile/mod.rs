//! Unix compress `.Z` container support.
//!
//! A `.Z` file is two magic bytes, one flags byte and a raw little-endian
//! LZW bitstream. Only block mode (flag bit 0x80) is supported; the low five
//! flag bits hold the maximum code size, almost always 16.

use oxigif_core::{BitReader, BitVec, OxiGifError, Result};
use oxigif_lzw::{Flavor, LzwDecoder};
use std::io::Write;

/// Magic bytes of a `.Z` file.
pub const MAGIC: [u8; 2] = [0x1F, 0x9D];

/// Block mode: the stream may contain clear codes.
const FLAG_BLOCK_MODE: u8 = 0x80;
/// Reserved bits, must be zero.
const FLAG_RESERVED: u8 = 0x60;
/// Low bits hold the maximum code size.
const FLAG_MAX_BITS: u8 = 0x1F;

/// A parsed `.Z` file: the original flags byte plus the decoded payload.
#[derive(Debug, Clone)]
pub struct ZFile {
    flags: u8,
    data: Vec<u8>,
    compressed_bits: u64,
}

impl ZFile {
    /// Parse and decompress a `.Z` file held in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut input = BitReader::new(bytes);

        let found = [input.read_byte()?, input.read_byte()?];
        if found != MAGIC {
            return Err(OxiGifError::invalid_magic(MAGIC.to_vec(), found.to_vec()));
        }

        let flags = input.read_byte()?;
        if flags & FLAG_BLOCK_MODE == 0 {
            return Err(OxiGifError::not_supported("only .Z block mode"));
        }
        if flags & FLAG_RESERVED != 0 {
            return Err(OxiGifError::invalid_header("unknown .Z format flag"));
        }
        let max_code_size = flags & FLAG_MAX_BITS;

        // Crude pre-sizing; the payload usually expands about threefold.
        let size_hint = bytes.len().saturating_mul(3);
        let mut decoder = LzwDecoder::new(Flavor::UnixCompress, 8, max_code_size)?;
        let data = decoder.decode(&mut input, size_hint)?;

        Ok(Self {
            flags,
            data,
            compressed_bits: decoder.compressed_bits(),
        })
    }

    /// Load and decompress a `.Z` file from disk.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Wrap raw, not yet compressed bytes so they can be written as a fresh
    /// `.Z` file with 16-bit codes.
    pub fn from_raw(data: Vec<u8>) -> Self {
        Self {
            flags: FLAG_BLOCK_MODE | 16,
            data,
            compressed_bits: 0,
        }
    }

    /// Decompressed contents.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Maximum bits per code, from the header flags.
    pub fn max_code_size(&self) -> u8 {
        self.flags & FLAG_MAX_BITS
    }

    /// Raw payload bits of the original encoding, for statistics.
    pub fn compressed_bits(&self) -> u64 {
        self.compressed_bits
    }

    /// Write the file with the payload replaced.
    ///
    /// The original flags byte is kept, so the maximum code size stays
    /// unchanged. Returns the number of bytes written.
    pub fn write_optimized<W: Write>(&self, writer: &mut W, payload: &BitVec) -> Result<u64> {
        writer.write_all(&MAGIC)?;
        writer.write_all(&[self.flags])?;
        writer.write_all(payload.as_bytes())?;
        Ok(3 + payload.byte_len() as u64)
    }
}
