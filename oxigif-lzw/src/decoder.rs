//! LZW decoder for GIF and Unix compress bitstreams.
//!
//! The decoder rebuilds the literal byte stream and, along the way, the exact
//! bit count of the original payload so callers can compare it against the
//! re-encoded result.

use crate::error::{LzwError, Result};
use crate::settings::Flavor;
use oxigif_core::BitReader;

/// Placeholder for "no parent code".
const NO_PREVIOUS: u32 = u32::MAX;

/// Tree node for a decoded LZW code: parent code, last byte, match length.
#[derive(Debug, Clone, Copy)]
struct BackReference {
    /// Code of the parent, which holds everything except the last byte.
    previous: u32,
    /// Last byte of the match.
    last: u8,
    /// Match length in bytes.
    length: u32,
    /// Position of one occurrence in the output stream.
    pos: u32,
}

/// Convert a code to bytes by walking the parent chain backwards into a
/// pre-reserved tail region of the buffer.
fn expand(buffer: &mut Vec<u8>, mut code: u32, lut: &[BackReference]) {
    let entry = lut[code as usize];
    if entry.length == 1 {
        buffer.push(entry.last);
        return;
    }

    let start = buffer.len();
    buffer.resize(start + entry.length as usize, 0);
    let mut pos = buffer.len();
    for _ in 0..entry.length {
        pos -= 1;
        buffer[pos] = lut[code as usize].last;
        code = lut[code as usize].previous;
    }
}

/// Decoder for a single LZW payload.
///
/// GIF payloads arrive in sub-blocks of at most 255 bytes, each preceded by a
/// length byte, and a code may straddle a sub-block boundary. `.Z` payloads
/// are a raw bitstream with re-alignment rules around dictionary resets. Both
/// framings are handled here so the container layer only deals in whole
/// bytes.
#[derive(Debug)]
pub struct LzwDecoder {
    flavor: Flavor,
    min_code_size: u8,
    max_code_size: u8,
    /// Bits remaining in the current GIF sub-block.
    bits_left_in_block: u32,
    /// Raw payload bits consumed, excluding sub-block length bytes.
    compressed_bits: u64,
}

impl LzwDecoder {
    /// Create a decoder.
    ///
    /// `min_code_size` is the code-size byte of a GIF frame (2..=8, always 8
    /// for `.Z`); `max_code_size` is 12 for GIF and taken from the header
    /// flags for `.Z`.
    pub fn new(flavor: Flavor, min_code_size: u8, max_code_size: u8) -> Result<Self> {
        if !(2..=8).contains(&min_code_size) {
            return Err(LzwError::InvalidCodeSize(min_code_size));
        }
        if max_code_size <= min_code_size || max_code_size > flavor.max_code_bits() {
            return Err(LzwError::InvalidCodeSize(max_code_size));
        }

        Ok(Self {
            flavor,
            min_code_size,
            max_code_size,
            bits_left_in_block: 0,
            compressed_bits: 0,
        })
    }

    /// Raw payload bits consumed by the last [`LzwDecoder::decode`] call,
    /// not counting sub-block length bytes or trailing padding.
    pub fn compressed_bits(&self) -> u64 {
        self.compressed_bits
    }

    /// Decode one LZW payload into its literal byte stream.
    ///
    /// `size_hint` pre-sizes the output buffer (frame width times height for
    /// GIF). For GIF the reader is left just past the terminating empty
    /// sub-block; for `.Z` decoding stops once fewer bits remain than one
    /// code needs.
    pub fn decode(&mut self, input: &mut BitReader<'_>, size_hint: usize) -> Result<Vec<u8>> {
        let clear: u32 = 1 << self.min_code_size;
        let end_of_stream = self.flavor.has_end_of_stream().then_some(clear + 1);
        let max_color = clear - 1;
        let max_token = 1usize << self.max_code_size;

        // Literals plus placeholders for the control codes.
        let mut lut: Vec<BackReference> = Vec::with_capacity(max_token);
        for i in 0..=max_color {
            lut.push(BackReference {
                previous: NO_PREVIOUS,
                last: i as u8,
                length: 1,
                pos: NO_PREVIOUS,
            });
        }
        let reserved = if self.flavor.has_end_of_stream() { 2 } else { 1 };
        for _ in 0..reserved {
            lut.push(BackReference {
                previous: NO_PREVIOUS,
                last: 0,
                length: 0,
                pos: NO_PREVIOUS,
            });
        }

        let mut code_size = self.min_code_size + 1;
        self.bits_left_in_block = 0;
        self.compressed_bits = 0;

        let mut bytes = Vec::with_capacity(size_hint);

        // Pass the first token through, skipping any leading clear codes.
        let mut token = self.read_code(input, code_size)?;
        while token == clear {
            token = self.read_code(input, code_size)?;
        }
        if token as usize >= lut.len() {
            return Err(LzwError::InvalidToken {
                token,
                dict_size: lut.len() as u32,
                position: self.compressed_bits,
            });
        }
        if end_of_stream != Some(token) {
            bytes.push(token as u8);
        }

        let mut num_tokens_block: u32 = 1;

        while end_of_stream != Some(token) {
            // One more bit per code once the table fills the current width.
            if lut.len() == 1 << code_size && code_size < self.max_code_size {
                code_size += 1;
            }

            // compress' LZW has no end-of-stream code; stop on exhaustion.
            if self.flavor == Flavor::UnixCompress && u64::from(code_size) > input.bits_left() {
                break;
            }

            let prev_token = token;
            token = self.read_code(input, code_size)?;
            if token as usize > lut.len() {
                return Err(LzwError::InvalidToken {
                    token,
                    dict_size: lut.len() as u32,
                    position: self.compressed_bits,
                });
            }

            num_tokens_block += 1;

            let mut reset = false;
            while token == clear {
                // Drop all codes with 2+ bytes.
                lut.truncate(max_color as usize + 1 + reserved);

                if self.flavor == Flavor::UnixCompress {
                    // Bits left over in the current byte are discarded.
                    if self.compressed_bits % 8 != 0 {
                        let skip = (8 - self.compressed_bits % 8) as u8;
                        self.read_code(input, skip)?;
                    }
                    // A block's token count is padded to a multiple of 8 with
                    // dummy codes, still at the pre-reset width.
                    let gap = (8 - (num_tokens_block & 7)) & 7;
                    for _ in 0..gap {
                        input.read_bits(code_size)?;
                    }
                }

                code_size = self.min_code_size + 1;
                token = self.read_code(input, code_size)?;
                num_tokens_block = 1;

                if token > max_color {
                    return Err(LzwError::BlockStartNotLiteral { token });
                }
                bytes.push(token as u8);
                reset = true;
            }
            if reset {
                continue;
            }

            if end_of_stream == Some(token) {
                break;
            }

            let mut add = BackReference {
                previous: prev_token,
                last: 0,
                length: lut[prev_token as usize].length + 1,
                pos: bytes.len() as u32,
            };

            if token as usize >= lut.len() {
                // The code being defined right now: previous string plus its
                // own first byte.
                if token as usize != lut.len() {
                    return Err(LzwError::InvalidToken {
                        token,
                        dict_size: lut.len() as u32,
                        position: self.compressed_bits,
                    });
                }
                if lut.len() >= max_token {
                    return Err(LzwError::DictionaryOverflow {
                        max: max_token as u32,
                    });
                }
                expand(&mut bytes, prev_token, &lut);
                add.last = bytes[add.pos as usize];
                bytes.push(add.last);
            } else {
                expand(&mut bytes, token, &lut);
                add.last = bytes[add.pos as usize];
            }

            if lut.len() < max_token {
                lut.push(add);
            }
        }

        // Skip whatever is left of the final sub-block.
        let mut unused = self.bits_left_in_block;
        while unused > 8 {
            self.read_code(input, 8)?;
            unused -= 8;
        }
        self.read_code(input, unused as u8)?;
        self.compressed_bits -= u64::from(unused);

        // GIF only: a zero-sized block must follow.
        if self.flavor == Flavor::Gif && input.read_byte()? != 0 {
            return Err(LzwError::UnterminatedStream);
        }

        Ok(bytes)
    }

    /// Read bits from the payload, crossing into the next GIF sub-block when
    /// the current one runs out mid-code.
    fn read_code(&mut self, input: &mut BitReader<'_>, num_bits: u8) -> Result<u32> {
        if num_bits == 0 {
            return Ok(0);
        }

        self.compressed_bits += u64::from(num_bits);

        if self.flavor == Flavor::UnixCompress {
            return Ok(input.read_bits(num_bits)?);
        }

        if u32::from(num_bits) <= self.bits_left_in_block {
            self.bits_left_in_block -= u32::from(num_bits);
            return Ok(input.read_bits(num_bits)?);
        }

        // The code straddles a sub-block boundary: low bits come from the
        // current block, high bits from the next.
        let mut low = 0;
        let mut shift = 0u8;
        let mut needed = num_bits;
        if self.bits_left_in_block > 0 {
            shift = self.bits_left_in_block as u8;
            low = input.read_bits(shift)?;
            needed -= shift;
        }

        self.bits_left_in_block = 8 * u32::from(input.read_byte()?);
        if self.bits_left_in_block < u32::from(needed) {
            return Err(LzwError::SubBlockTooShort { needed });
        }

        let high = input.read_bits(needed)? << shift;
        self.bits_left_in_block -= u32::from(needed);

        Ok(low | high)
    }
}
