//! End-to-end recompression tests: score, pick restarts, emit, decode, and
//! compare against the original literal stream bit for bit.

use oxigif_core::{BitReader, BitVec};
use oxigif_lzw::{recompress, Flavor, LzwDecoder, LzwEncoder, OptimizationSettings};

/// Reproducible noise, which fills the dictionary about as fast as possible.
fn pseudo_random(size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let mut seed: u64 = 0x1234_5678_9ABC_DEF0;
    for _ in 0..size {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        data.push((seed >> 32) as u8);
    }
    data
}

/// Text-like data with plenty of medium-length repeats.
fn text_like(size: usize) -> Vec<u8> {
    let phrase = b"the quick brown fox jumps over the lazy dog. ";
    let mut data = Vec::with_capacity(size);
    while data.len() < size {
        let take = phrase.len().min(size - data.len());
        data.extend_from_slice(&phrase[..take]);
    }
    data
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

fn decode_unix(bits: &BitVec, size_hint: usize) -> Vec<u8> {
    let payload = bits.as_bytes().to_vec();
    let mut reader = BitReader::new(&payload);
    let mut decoder = LzwDecoder::new(Flavor::UnixCompress, 8, 16).unwrap();
    decoder.decode(&mut reader, size_hint).unwrap()
}

#[test]
fn gif_restarts_roundtrip() {
    // A small token budget forces several blocks, so the emitted stream
    // contains clear codes and the decoder has to resynchronize its widths.
    let data = pseudo_random(30_000);

    let mut settings = OptimizationSettings::gif(8);
    settings.alignment = 256;
    settings.max_tokens = 2_000;

    let mut encoder = LzwEncoder::new(&data, Flavor::Gif);
    encoder.scan(&settings, false).unwrap();
    let bits = encoder.optimize(&settings).unwrap();

    // The token budget cannot cover the input in one block.
    let first = encoder.best_block(0, settings.alignment).unwrap();
    assert!((first.length as usize) < data.len());

    // Chain property of the block table: each block's total cost is its own
    // bits plus the total of the block it chains to.
    let mut pos = 0u32;
    while (pos as usize) < data.len() {
        let stats = encoder.best_block(pos, settings.alignment).unwrap();
        let next = pos + stats.length;
        let rest = if (next as usize) < data.len() {
            encoder
                .best_block(next, settings.alignment)
                .unwrap()
                .total_bits
        } else {
            0
        };
        assert_eq!(stats.total_bits, u64::from(stats.bits) + rest);
        assert!(stats.length > 0);
        pos = next;
    }

    assert_eq!(decode_gif(&bits, 8, data.len()), data);
}

#[test]
fn unix_restart_padding_roundtrip() {
    // Enough noise to push the dictionary past the 16-bit width threshold;
    // the dictionary cap then forces a restart, which in the .Z format pads
    // to a byte boundary plus dummy codes until the token count is a
    // multiple of 8. The decoder has to skip exactly the same bits.
    let data = pseudo_random(140_000);

    let mut settings = OptimizationSettings::unix_compress();
    settings.alignment = 4_096;
    settings.max_dictionary = 45_000;
    settings.max_tokens = 0;

    let mut encoder = LzwEncoder::new(&data, Flavor::UnixCompress);
    encoder.scan(&settings, false).unwrap();
    let bits = encoder.optimize(&settings).unwrap();

    // At least one restart happened.
    let first = encoder.best_block(0, settings.alignment).unwrap();
    assert!((first.length as usize) < data.len());

    // The stream is byte aligned: .Z payloads are written as whole bytes.
    assert_eq!(decode_unix(&bits, data.len()), data);
}

#[test]
fn unix_single_block_roundtrip() {
    let data = text_like(4_000);

    let mut settings = OptimizationSettings::unix_compress();
    settings.alignment = 512;

    let bits = recompress(&data, Flavor::UnixCompress, &settings, false).unwrap();
    assert_eq!(decode_unix(&bits, data.len()), data);
}

#[test]
fn smart_greedy_never_loses_to_greedy() {
    let data = text_like(400);

    let mut greedy = OptimizationSettings::gif(8);
    greedy.start_with_clear_code = false;
    let greedy_bits = recompress(&data, Flavor::Gif, &greedy, false).unwrap();

    let mut smart = greedy;
    smart.greedy = false;
    smart.avoid_nongreedy_again = true;
    smart.max_dictionary = OptimizationSettings::GIF_MAX_DICTIONARY;
    let smart_bits = recompress(&data, Flavor::Gif, &smart, true).unwrap();

    assert!(smart_bits.len() <= greedy_bits.len());
    assert_eq!(decode_gif(&greedy_bits, 8, data.len()), data);
    assert_eq!(decode_gif(&smart_bits, 8, data.len()), data);
}

#[test]
fn leading_clear_code_is_skipped_by_the_decoder() {
    let data = text_like(300);

    let mut settings = OptimizationSettings::gif(8);
    assert!(settings.start_with_clear_code);
    settings.alignment = 64;

    let bits = recompress(&data, Flavor::Gif, &settings, false).unwrap();
    assert_eq!(decode_gif(&bits, 8, data.len()), data);

    // The payload starts with the clear code at the initial width.
    let bytes = bits.as_bytes().to_vec();
    let mut reader = BitReader::new(&bytes);
    assert_eq!(reader.read_bits(9).unwrap(), 256);
}

#[test]
fn alignment_trades_size_for_speed() {
    // A finer grid can only find a better or equal restart set.
    let data = text_like(2_000);

    let mut coarse = OptimizationSettings::gif(8);
    coarse.start_with_clear_code = false;
    coarse.alignment = 256;
    coarse.max_tokens = 300;
    let coarse_bits = recompress(&data, Flavor::Gif, &coarse, false).unwrap();

    let mut fine = coarse;
    fine.alignment = 32;
    let fine_bits = recompress(&data, Flavor::Gif, &fine, false).unwrap();

    assert!(fine_bits.len() <= coarse_bits.len());
    assert_eq!(decode_gif(&coarse_bits, 8, data.len()), data);
    assert_eq!(decode_gif(&fine_bits, 8, data.len()), data);
}
