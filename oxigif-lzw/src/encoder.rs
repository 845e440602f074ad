//! LZW encoder with non-greedy parsing and block-boundary optimization.
//!
//! The encoder holds the literal byte stream for one frame plus a dictionary
//! trie and a table of block scores. [`LzwEncoder::optimize_partial`] encodes
//! (or score-only simulates) a single block starting at a given offset;
//! scoring every aligned offset from right to left fills the table with the
//! cheapest total bit count from each offset to the end of the input.
//! [`LzwEncoder::optimize`] then walks the table forward to recover the
//! optimal restart set and re-encodes along it.

use crate::dictionary::CodeTrie;
use crate::error::{LzwError, Result};
use crate::settings::{Flavor, OptimizationSettings};
use oxigif_core::BitVec;

/// Cost of the locally optimal block starting at one aligned offset.
///
/// `total_bits == 0` means the offset has not been reached yet; the slot one
/// past the input doubles as the all-zero terminal entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockStats {
    /// Bytes of input consumed by this block.
    pub length: u32,
    /// Bits this block emits on its own, closing code and padding included.
    pub bits: u32,
    /// Bits of this block plus all following blocks along the optimal path.
    pub total_bits: u64,
    /// Number of LZW codes in this block.
    pub tokens: u32,
    /// Number of non-greedy matches chosen in this block.
    pub nongreedy: u32,
    /// True if the block ends in the middle of a match.
    pub partial: bool,
}

/// Minimum number of bits needed to represent `token`.
fn min_bits(mut token: u32) -> u8 {
    let mut result = 0;
    loop {
        token >>= 1;
        result += 1;
        if token == 0 {
            return result;
        }
    }
}

/// LZW encoder for one literal byte stream.
///
/// The input is borrowed for the whole encode session; the trie and the block
/// table live inside the encoder and are dropped with it.
#[derive(Debug)]
pub struct LzwEncoder<'a> {
    /// Uncompressed input.
    data: &'a [u8],
    /// Block scores per aligned offset, filled right to left.
    best: Vec<BlockStats>,
    /// Dictionary trie, reinitialized for every block.
    trie: CodeTrie,
    /// 12 for GIF, 16 for `.Z`.
    max_code_bits: u8,
    flavor: Flavor,
}

impl<'a> LzwEncoder<'a> {
    /// Create an encoder over `data`.
    pub fn new(data: &'a [u8], flavor: Flavor) -> Self {
        Self {
            data,
            best: Vec::new(),
            trie: CodeTrie::new(flavor.max_dictionary()),
            max_code_bits: flavor.max_code_bits(),
            flavor,
        }
    }

    /// Length of the longest dictionary match starting at `from`, capped at
    /// `max_length`. There is always a code for the first byte.
    fn find_match(&self, from: usize, max_length: usize) -> usize {
        let mut code = u32::from(self.data[from]);
        let mut offset = from + 1;
        for length in 1..max_length {
            match self.trie.child(code, self.data[offset]) {
                Some(next) => code = next,
                None => return length,
            }
            offset += 1;
        }
        max_length
    }

    /// Walk the trie along `data[from..from + length]`, register the one-byte
    /// extension if another byte follows, and return the code of the match.
    fn add_code(&mut self, from: usize, length: usize) -> u32 {
        let mut code = u32::from(self.data[from]);
        for offset in from + 1..from + length {
            code = self
                .trie
                .child(code, self.data[offset])
                .expect("match walks a path that exists in the trie");
        }

        if from + length < self.data.len() {
            self.trie.add_child(code, self.data[from + length]);
        }

        code
    }

    /// Scores recorded for the block starting at `from`, if any.
    pub fn best_block(&self, from: u32, alignment: u32) -> Option<BlockStats> {
        if alignment == 0 {
            return None;
        }
        self.best
            .get(from as usize / alignment as usize)
            .copied()
            .filter(|stats| stats.length > 0)
    }

    /// Encode or score one block.
    ///
    /// Simulates encoding from `from` under a fresh dictionary until
    /// `max_length` bytes (0 = no limit), the dictionary cap, the token cap
    /// or the end of input. With `emit` false nothing is produced and the
    /// block table is updated with the cheapest place to cut the block; with
    /// `emit` true the packed codes are returned. `is_final` selects the
    /// closing control code (end-of-stream versus clear).
    pub fn optimize_partial(
        &mut self,
        from: u32,
        max_length: u32,
        emit: bool,
        is_final: bool,
        settings: &OptimizationSettings,
    ) -> Result<BitVec> {
        if self.data.is_empty() {
            return Err(LzwError::EmptyInput);
        }
        if settings.alignment == 0 {
            return Err(LzwError::invalid_settings("alignment cannot be zero"));
        }
        if !(2..=8).contains(&settings.min_code_size) {
            return Err(LzwError::InvalidCodeSize(settings.min_code_size));
        }

        let alignment = settings.alignment as usize;
        let needed = self.data.len() / alignment + 2;
        if self.best.len() < needed {
            self.best = vec![BlockStats::default(); needed];
        }

        let from = from as usize;
        if from % alignment != 0 {
            return Err(LzwError::UnalignedBlockStart {
                from: from as u32,
                alignment: alignment as u32,
            });
        }
        if from >= self.data.len() {
            return Err(LzwError::invalid_settings("block starts beyond the input"));
        }

        let mut length = self.data.len() - from;
        if max_length != 0 && length > max_length as usize {
            length = max_length as usize;
        }

        let from_aligned = from / alignment;

        let mut result = if emit {
            BitVec::with_capacity(length * usize::from(self.max_code_bits))
        } else {
            BitVec::new()
        };

        // Scoring this block greedily again is pointless if the non-greedy
        // pass already found nothing non-greedy here.
        if settings.greedy
            && settings.avoid_nongreedy_again
            && !emit
            && self.best[from_aligned].nongreedy == 0
            && self.best[from_aligned].length > 0
        {
            return Ok(result);
        }

        let clear: u32 = 1 << settings.min_code_size;
        let end_of_stream = clear + 1;

        let reserved = if self.flavor.has_end_of_stream() {
            clear + 2
        } else {
            clear + 1
        };
        self.trie.reset(reserved);

        let format_cap = self.trie.capacity();

        let mut num_bits: u32 = 0;
        let mut num_tokens: u32 = 0;
        let mut num_nongreedy: u32 = 0;
        // Bytes still covered by the current match; 0 means find a new one.
        let mut match_length: usize = 0;
        let mut code_size = min_bits(self.trie.len());

        let last_pos = from + length - 1;
        for i in from..=last_pos {
            let num_bytes = (i - from + 1) as u32;

            // ----- match finding -----

            if match_length == 0 {
                // Oversized blocks rarely compress better and some decoders
                // mishandle a full dictionary.
                if settings.max_dictionary > 0 && self.trie.len() >= settings.max_dictionary {
                    break;
                }
                if settings.max_tokens > 0 && num_tokens >= settings.max_tokens {
                    break;
                }

                let remaining = length + from - i;
                match_length = self.find_match(i, remaining);

                let mut try_nongreedy = !settings.greedy;
                if match_length == 1 || (match_length as u32) < settings.min_nongreedy_match {
                    try_nongreedy = false;
                }
                // Too close to the end for the lookahead to pay off.
                if i + match_length + 4 >= self.data.len() {
                    try_nongreedy = false;
                }

                // Don't carve up runs of one value.
                if try_nongreedy && !settings.split_runs {
                    let last_match_byte = match_length - 1;
                    let mut all_the_same = self.data[i] == self.data[i + last_match_byte];
                    let mut scan = 1;
                    while scan + 1 < last_match_byte && all_the_same {
                        all_the_same = self.data[i] == self.data[i + scan];
                        scan += 1;
                    }
                    if all_the_same {
                        try_nongreedy = false;
                    }
                }

                // Flexible parsing: a shorter match now may leave a longer
                // match for the next token.
                if try_nongreedy {
                    let second = self.find_match(i + match_length, remaining - match_length);
                    let mut best_pair = match_length + second;
                    let at_least = best_pair + settings.min_improvement as usize;

                    let mut choice = match_length;
                    for shorter in (1..match_length).rev() {
                        let next = self.find_match(i + shorter, remaining - shorter);
                        let sum = shorter + next;
                        if sum >= at_least && sum > best_pair {
                            best_pair = sum;
                            choice = shorter;
                        }
                    }

                    if choice < match_length {
                        match_length = choice;
                        num_nongreedy += 1;
                    }
                }

                // ----- code generation -----

                // One more bit per code once the next assignment would not
                // fit the current width.
                if self.trie.len() < format_cap {
                    let threshold = self.trie.len() - 1;
                    if threshold & (threshold - 1) == 0 && code_size < self.max_code_bits {
                        code_size += 1;
                        // .Z streams keep 9 bits across the very first token.
                        if self.flavor == Flavor::UnixCompress && threshold == 256 {
                            code_size -= 1;
                        }
                    }
                }

                let code = self.add_code(i, match_length);
                if emit {
                    result.push_bits(code, code_size);
                }

                num_bits += u32::from(code_size);
                num_tokens += 1;
            }

            match_length -= 1;

            // ----- cost evaluation -----

            if settings.read_only_best {
                continue;
            }

            let is_last_byte = i + 1 == self.data.len();
            let next = i + 1;
            let next_aligned = if alignment > 1 {
                next.div_ceil(alignment)
            } else {
                next
            };
            // Nothing to chain to: no block has been scored from there yet.
            if !is_last_byte && self.best[next_aligned].total_bits == 0 {
                continue;
            }

            // Costs are recorded at aligned cuts only, except the last byte.
            if alignment > 1 && num_bytes as usize % alignment != 0 && !is_last_byte {
                continue;
            }

            // Extra bits to close the block here: one control code, possibly
            // one bit wider if the dictionary just hit a power of two.
            let mut close_cost = u32::from(code_size);
            let threshold = self.trie.len() - 1;
            if threshold & (threshold - 1) == 0 && code_size < self.max_code_bits {
                close_cost += 1;
            }

            if self.flavor == Flavor::UnixCompress {
                // Restarts are only representable once codes are 16 bits wide.
                if !is_last_byte && code_size < 16 {
                    continue;
                }

                // No end-of-stream token in the .Z format.
                if is_last_byte {
                    close_cost = 0;
                }

                // Fill the last byte.
                if num_bits % 8 != 0 {
                    close_cost += 8 - num_bits % 8;
                }

                // Dictionary resets are followed by dummy codes until the
                // block's token count is a multiple of 8.
                if !is_last_byte {
                    let tokens_plus_clear = num_tokens + 1;
                    let gap = (8 - (tokens_plus_clear & 7)) & 7;
                    close_cost += u32::from(code_size) * gap;
                }
            }

            let is_partial = match_length > 0;
            let true_bits = num_bits + close_cost;
            let total_bits = u64::from(true_bits) + self.best[next_aligned].total_bits;

            // Better path, or no path known so far? Ties go to the longer
            // block: every dictionary restart costs the decoder time.
            let best = &mut self.best[from_aligned];
            if best.total_bits == 0 || best.total_bits >= total_bits {
                best.bits = true_bits;
                best.total_bits = total_bits;
                best.length = num_bytes;
                best.tokens = num_tokens;
                best.partial = is_partial;
                best.nongreedy = num_nongreedy;
            }
        }

        if emit {
            // Close the block with a control code at the width the current
            // dictionary size demands.
            code_size = min_bits(self.trie.len() - 1);
            if self.flavor.has_end_of_stream() {
                let closing = if is_final { end_of_stream } else { clear };
                result.push_bits(closing, code_size);
            } else {
                if !is_final {
                    result.push_bits(clear, code_size);
                    num_tokens += 1;
                }

                // Fill the current byte.
                while result.len() % 8 != 0 {
                    result.push(false);
                }

                if !is_final {
                    if code_size != 16 {
                        return Err(LzwError::RestartCodeSize { code_size });
                    }
                    // Same padding the decoder skips after a reset.
                    let gap = (8 - (num_tokens & 7)) & 7;
                    let num_zeros = u32::from(code_size) * gap / 8;
                    result.push_zeros(8 * num_zeros as usize);
                }
            }
        }

        Ok(result)
    }

    /// Fill the block table by scoring every aligned offset, right to left.
    ///
    /// With `smart_greedy` each offset is scored twice, non-greedy first,
    /// so the table keeps whichever parse is cheaper per block.
    pub fn scan(&mut self, settings: &OptimizationSettings, smart_greedy: bool) -> Result<()> {
        if self.data.is_empty() {
            return Err(LzwError::EmptyInput);
        }
        if settings.alignment == 0 {
            return Err(LzwError::invalid_settings("alignment cannot be zero"));
        }

        let alignment = settings.alignment as usize;
        for i in (0..self.data.len()).rev() {
            if i % alignment != 0 {
                continue;
            }
            self.optimize_partial(i as u32, 0, false, true, settings)?;
            if smart_greedy && !settings.greedy {
                let mut greedy = *settings;
                greedy.greedy = true;
                self.optimize_partial(i as u32, 0, false, true, &greedy)?;
            }
        }
        Ok(())
    }

    /// Recover the optimal restart set from the block table and re-encode
    /// along it.
    ///
    /// Requires a completed scoring pass; fails with a gap error if some
    /// offset on the path was never reached (alignment too coarse for the
    /// token or dictionary limits).
    pub fn optimize(&mut self, settings: &OptimizationSettings) -> Result<BitVec> {
        if settings.alignment == 0 {
            return Err(LzwError::invalid_settings("alignment cannot be zero"));
        }

        let alignment = settings.alignment as usize;
        let mut pos = 0usize;
        let mut aligned = 0usize;
        let mut restarts = Vec::new();
        while pos < self.data.len() {
            let length = self.best.get(aligned).map_or(0, |stats| stats.length) as usize;
            if length == 0 {
                return Err(LzwError::BlockGap {
                    position: pos as u32,
                });
            }
            pos += length;
            aligned = pos / alignment;
            restarts.push(pos as u32);
        }

        self.merge(&restarts, settings)
    }

    /// Encode along an explicit, ascending list of block boundaries.
    ///
    /// `restarts` holds the end offset of each block; the end of the input is
    /// appended if missing. Blocks re-use the scored parse mode where the
    /// block table is available.
    pub fn merge(&mut self, restarts: &[u32], settings: &OptimizationSettings) -> Result<BitVec> {
        if settings.alignment == 0 {
            return Err(LzwError::invalid_settings("alignment cannot be zero"));
        }
        if restarts.is_empty() {
            return Err(LzwError::invalid_settings("empty restart list"));
        }

        let mut settings = *settings;
        let alignment = settings.alignment as usize;

        let mut result = BitVec::with_capacity(self.data.len() * 3);

        if settings.start_with_clear_code && self.flavor == Flavor::Gif {
            let clear = 1u32 << settings.min_code_size;
            result.push_bits(clear, settings.min_code_size + 1);
        }

        if !restarts.windows(2).all(|pair| pair[0] < pair[1])
            || restarts
                .iter()
                .any(|&pos| pos as usize > self.data.len())
        {
            return Err(LzwError::invalid_settings(
                "restart list must be strictly ascending and within the input",
            ));
        }

        let mut restarts = restarts.to_vec();
        if (*restarts.last().unwrap_or(&0) as usize) < self.data.len() {
            restarts.push(self.data.len() as u32);
        }

        let mut pos: u32 = 0;
        for (index, &restart) in restarts.iter().enumerate() {
            // Placeholder entry for a block starting at offset 0.
            if restart == 0 {
                continue;
            }

            let is_final = index == restarts.len() - 1;
            let block_length = restart - pos;

            // Blocks without non-greedy wins re-encode faster greedily and
            // produce the same codes.
            if let Some(stats) = self.best.get(pos as usize / alignment) {
                settings.greedy = stats.nongreedy == 0;
                if settings.greedy {
                    settings.avoid_nongreedy_again = true;
                }
            }
            settings.read_only_best = true;

            let block = self.optimize_partial(pos, block_length, true, is_final, &settings)?;
            if block.is_empty() && block_length > 0 {
                return Err(LzwError::EmptyBlock {
                    position: pos,
                    length: block_length,
                });
            }
            result.append(&block);

            pos = restart;
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::LzwDecoder;
    use oxigif_core::{BitReader, BitVec};

    fn plain_settings(min_code_size: u8) -> OptimizationSettings {
        let mut settings = OptimizationSettings::gif(min_code_size);
        settings.start_with_clear_code = false;
        settings.max_tokens = 0;
        settings
    }

    /// Wrap a raw code stream into GIF sub-blocks and decode it back.
    fn decode_gif(bits: &BitVec, min_code_size: u8, size_hint: usize) -> Vec<u8> {
        let mut payload = Vec::new();
        for chunk in bits.as_bytes().chunks(255) {
            payload.push(chunk.len() as u8);
            payload.extend_from_slice(chunk);
        }
        payload.push(0);

        let mut reader = BitReader::new(&payload);
        let mut decoder = LzwDecoder::new(Flavor::Gif, min_code_size, 12).unwrap();
        decoder.decode(&mut reader, size_hint).unwrap()
    }

    #[test]
    fn test_min_bits() {
        assert_eq!(min_bits(0), 1);
        assert_eq!(min_bits(1), 1);
        assert_eq!(min_bits(2), 2);
        assert_eq!(min_bits(6), 3);
        assert_eq!(min_bits(255), 8);
        assert_eq!(min_bits(256), 9);
        assert_eq!(min_bits(4095), 12);
    }

    #[test]
    fn test_encode_zero_run() {
        // [0; 8] with 2-bit literals: 0, then the freshly created pair and
        // triple codes, then the pair again at the stepped-up width.
        let data = [0u8; 8];
        let mut encoder = LzwEncoder::new(&data, Flavor::Gif);
        let bits = encoder
            .optimize_partial(0, 0, true, true, &plain_settings(2))
            .unwrap();

        let bytes = bits.as_bytes().to_vec();
        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read_bits(3).unwrap(), 0); // literal
        assert_eq!(reader.read_bits(3).unwrap(), 6); // [0, 0]
        assert_eq!(reader.read_bits(3).unwrap(), 7); // [0, 0, 0]
        assert_eq!(reader.read_bits(4).unwrap(), 6); // [0, 0] again, wider
        assert_eq!(reader.read_bits(4).unwrap(), 5); // end of stream
        assert_eq!(bits.len(), 17);

        assert_eq!(decode_gif(&bits, 2, data.len()), data);
    }

    #[test]
    fn test_encode_alternating_pair() {
        let data = [0u8, 1, 0, 1, 0, 1];
        let mut encoder = LzwEncoder::new(&data, Flavor::Gif);
        let bits = encoder
            .optimize_partial(0, 0, true, true, &plain_settings(2))
            .unwrap();

        let bytes = bits.as_bytes().to_vec();
        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read_bits(3).unwrap(), 0); // literal 0
        assert_eq!(reader.read_bits(3).unwrap(), 1); // literal 1
        assert_eq!(reader.read_bits(3).unwrap(), 6); // [0, 1]
        assert_eq!(reader.read_bits(4).unwrap(), 6); // [0, 1] again, wider
        assert_eq!(reader.read_bits(4).unwrap(), 5); // end of stream

        assert_eq!(decode_gif(&bits, 2, data.len()), data);
    }

    #[test]
    fn test_nongreedy_beats_greedy() {
        // After the warm-up, the dictionary holds ab, ba, abb, baa, aa and
        // aaa. At offset 9 the greedy match "aaa" leaves only single letters,
        // while taking "aa" leaves "abb": two codes instead of three.
        let a = 0u8;
        let b = 1u8;
        let data = [a, b, a, b, b, a, a, a, a, a, a, a, b, b, a, a, a];

        let mut settings = plain_settings(2);
        settings.greedy = false;
        settings.split_runs = true;

        let mut encoder = LzwEncoder::new(&data, Flavor::Gif);
        encoder.optimize_partial(0, 0, false, true, &settings).unwrap();
        let stats = encoder.best_block(0, 1).unwrap();
        assert_eq!(stats.length, 17);
        assert_eq!(stats.tokens, 9);
        assert_eq!(stats.nongreedy, 1);
        assert_eq!(stats.bits, 37);

        let mut greedy = settings;
        greedy.greedy = true;
        let mut greedy_encoder = LzwEncoder::new(&data, Flavor::Gif);
        greedy_encoder
            .optimize_partial(0, 0, false, true, &greedy)
            .unwrap();
        let greedy_stats = greedy_encoder.best_block(0, 1).unwrap();
        assert_eq!(greedy_stats.tokens, 10);
        assert_eq!(greedy_stats.nongreedy, 0);
        assert_eq!(greedy_stats.bits, 41);

        let bits = encoder.optimize_partial(0, 0, true, true, &settings).unwrap();
        assert_eq!(bits.len(), 37);
        assert_eq!(decode_gif(&bits, 2, data.len()), data);
    }

    #[test]
    fn test_run_guard_keeps_runs_whole() {
        // A constant input must not be fractured by the lookahead unless
        // split_runs says so; the non-greedy encoding equals the greedy one.
        let data = [7u8; 1000];

        let mut nongreedy = plain_settings(3);
        nongreedy.greedy = false;

        let mut encoder = LzwEncoder::new(&data, Flavor::Gif);
        let bits = encoder
            .optimize_partial(0, 0, true, true, &nongreedy)
            .unwrap();
        assert_eq!(encoder.best_block(0, 1).unwrap().nongreedy, 0);

        let mut greedy_encoder = LzwEncoder::new(&data, Flavor::Gif);
        let greedy_bits = greedy_encoder
            .optimize_partial(0, 0, true, true, &plain_settings(3))
            .unwrap();
        assert_eq!(bits, greedy_bits);

        assert_eq!(decode_gif(&bits, 3, data.len()), data);
    }

    #[test]
    fn test_scan_and_optimize_roundtrip() {
        let data = [0u8, 0, 1, 0, 0, 1, 1, 0, 0, 0, 1, 1, 1, 0, 1, 0];
        let settings = plain_settings(2);
        let mut encoder = LzwEncoder::new(&data, Flavor::Gif);
        encoder.scan(&settings, false).unwrap();
        let bits = encoder.optimize(&settings).unwrap();
        assert_eq!(decode_gif(&bits, 2, data.len()), data);

        // The scored cost matches the emitted stream when one block wins.
        let stats = encoder.best_block(0, 1).unwrap();
        assert_eq!(u64::from(stats.bits), stats.total_bits);
    }

    #[test]
    fn test_misuse_errors() {
        let data = [0u8, 1, 2, 3];
        let mut encoder = LzwEncoder::new(&data, Flavor::Gif);

        let mut settings = plain_settings(2);
        settings.alignment = 0;
        assert!(matches!(
            encoder.optimize_partial(0, 0, false, true, &settings),
            Err(LzwError::InvalidSettings { .. })
        ));

        settings.alignment = 4;
        assert!(matches!(
            encoder.optimize_partial(2, 0, false, true, &settings),
            Err(LzwError::UnalignedBlockStart { from: 2, .. })
        ));

        // No scoring pass has run, so there is no path through the table.
        let settings = plain_settings(2);
        let mut fresh = LzwEncoder::new(&data, Flavor::Gif);
        assert!(matches!(
            fresh.optimize(&settings),
            Err(LzwError::BlockGap { position: 0 })
        ));

        assert!(matches!(
            fresh.merge(&[], &settings),
            Err(LzwError::InvalidSettings { .. })
        ));

        let empty: [u8; 0] = [];
        let mut empty_encoder = LzwEncoder::new(&empty, Flavor::Gif);
        assert!(matches!(
            empty_encoder.optimize_partial(0, 0, false, true, &settings),
            Err(LzwError::EmptyInput)
        ));
    }

    #[test]
    fn test_best_block_unreached() {
        let data = [0u8; 16];
        let encoder = LzwEncoder::new(&data, Flavor::Gif);
        assert!(encoder.best_block(0, 1).is_none());
        assert!(encoder.best_block(0, 0).is_none());
    }
}
