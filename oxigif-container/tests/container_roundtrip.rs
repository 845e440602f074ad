//! Whole-file round trips: build a file, parse it, recompress it, write it,
//! parse it again, and compare pixels and retained bytes.

use oxigif_container::{GifImage, ZFile};
use oxigif_lzw::{recompress, Flavor, LzwEncoder, OptimizationSettings};

/// Assemble a single-frame GIF with a 4-color global palette.
///
/// `packed_descriptor` is the image descriptor's packed field (interlace bit
/// 0x40). The pixels are encoded greedily in one block.
fn build_gif(width: u16, height: u16, pixels: &[u8], packed_descriptor: u8) -> Vec<u8> {
    assert_eq!(pixels.len(), usize::from(width) * usize::from(height));

    let mut file = Vec::new();
    file.extend_from_slice(b"GIF89a");
    // Logical screen descriptor: 2-bit global palette, background 0.
    file.extend_from_slice(&width.to_le_bytes());
    file.extend_from_slice(&height.to_le_bytes());
    file.push(0x81); // global color table, depth 2
    file.push(0);
    file.push(0);
    // Four palette entries.
    for &(r, g, b) in &[(0, 0, 0), (255, 0, 0), (0, 255, 0), (0, 0, 255)] {
        file.extend_from_slice(&[r, g, b]);
    }
    // A comment extension, retained verbatim by the parser.
    file.extend_from_slice(&[0x21, 0xFE, 3, b'h', b'e', b'y', 0]);
    // Image descriptor.
    file.push(0x2C);
    file.extend_from_slice(&0u16.to_le_bytes());
    file.extend_from_slice(&0u16.to_le_bytes());
    file.extend_from_slice(&width.to_le_bytes());
    file.extend_from_slice(&height.to_le_bytes());
    file.push(packed_descriptor);
    // LZW payload: code size byte plus sub-blocks.
    file.push(2);
    let mut encoder = LzwEncoder::new(pixels, Flavor::Gif);
    let settings = OptimizationSettings::gif(2);
    let bits = encoder
        .merge(&[pixels.len() as u32], &settings)
        .expect("single-block encode");
    for chunk in bits.as_bytes().chunks(255) {
        file.push(chunk.len() as u8);
        file.extend_from_slice(chunk);
    }
    file.push(0);
    file.push(0x3B);
    file
}

#[test]
fn gif_parse_recompress_reparse() {
    let pixels: Vec<u8> = (0..64u8).map(|i| i % 4).collect();
    let file = build_gif(8, 8, &pixels, 0);

    let gif = GifImage::from_bytes(&file).unwrap();
    assert_eq!(gif.width(), 8);
    assert_eq!(gif.height(), 8);
    assert_eq!(gif.color_depth(), 2);
    assert_eq!(gif.num_frames(), 1);
    assert!(!gif.is_animated());
    assert_eq!(gif.version(), b"GIF89a");
    assert_eq!(gif.global_color_map().len(), 4);

    let frame = &gif.frames()[0];
    assert_eq!(frame.pixels, pixels);
    assert_eq!(frame.min_code_size, 2);
    assert!(!frame.is_interlaced);
    assert_eq!(frame.extensions, vec![(0xFE, b"hey".to_vec())]);
    assert!(frame.compressed_bits > 0);

    // Recompress and write.
    let mut settings = OptimizationSettings::gif(frame.min_code_size);
    settings.alignment = 8;
    let payload = recompress(&frame.pixels, Flavor::Gif, &settings, false).unwrap();
    let mut written = Vec::new();
    gif.write_optimized(&mut written, &[payload]).unwrap();

    // Everything up to the code-size byte is the retained original bytes.
    let header_len = file.iter().position(|&b| b == 0x2C).unwrap() + 10;
    assert_eq!(&written[..header_len], &file[..header_len]);
    assert_eq!(*written.last().unwrap(), 0x3B);

    // The rewritten file decodes to the same pixels.
    let reparsed = GifImage::from_bytes(&written).unwrap();
    assert_eq!(reparsed.frames()[0].pixels, pixels);
    assert_eq!(reparsed.frames()[0].min_code_size, 2);
    assert_eq!(reparsed.global_color_map(), gif.global_color_map());
}

#[test]
fn gif_rejects_bad_signature() {
    let file = b"JIF89a".to_vec();
    assert!(GifImage::from_bytes(&file).is_err());

    let mut file = build_gif(2, 2, &[0, 1, 2, 3], 0);
    file[4] = b'8'; // version "GIF88a"
    assert!(GifImage::from_bytes(&file).is_err());
}

#[test]
fn gif_rejects_trailing_garbage() {
    let mut file = build_gif(2, 2, &[0, 1, 2, 3], 0);
    file.push(0xAA);
    assert!(GifImage::from_bytes(&file).is_err());
}

#[test]
fn gif_deinterlace_reorders_rows_and_flag() {
    // 1 pixel per row, 8 rows, stored interlaced: pass order 0 8.. 4.. 2 6.. odd.
    let sequential: Vec<u8> = vec![0, 1, 2, 3, 0, 1, 2, 3];
    let interlaced: Vec<u8> = vec![0, 0, 2, 2, 1, 3, 1, 3];
    let file = build_gif(1, 8, &interlaced, 0x40);

    let mut gif = GifImage::from_bytes(&file).unwrap();
    assert!(gif.frames()[0].is_interlaced);

    gif.set_interlacing(false).unwrap();
    assert!(!gif.frames()[0].is_interlaced);
    assert_eq!(gif.frames()[0].pixels, sequential);

    // Converting back restores the stored order.
    gif.set_interlacing(true).unwrap();
    assert_eq!(gif.frames()[0].pixels, interlaced);

    // Write the deinterlaced image; the rewritten descriptor has the flag
    // cleared and the parser returns sequential rows.
    gif.set_interlacing(false).unwrap();
    let settings = OptimizationSettings::gif(2);
    let payload = recompress(&gif.frames()[0].pixels, Flavor::Gif, &settings, false).unwrap();
    let mut written = Vec::new();
    gif.write_optimized(&mut written, &[payload]).unwrap();

    let reparsed = GifImage::from_bytes(&written).unwrap();
    assert!(!reparsed.frames()[0].is_interlaced);
    assert_eq!(reparsed.frames()[0].pixels, sequential);
}

#[test]
fn gif_ppm_and_index_dumps() {
    let pixels = vec![0u8, 1, 2, 3];
    let file = build_gif(2, 2, &pixels, 0);
    let gif = GifImage::from_bytes(&file).unwrap();

    let mut ppm = Vec::new();
    gif.dump_ppm(&mut ppm, 0).unwrap();
    assert!(ppm.starts_with(b"P6\n2 2\n255\n"));
    // Four RGB triplets follow the header.
    assert_eq!(ppm.len(), b"P6\n2 2\n255\n".len() + 12);
    assert!(gif.dump_ppm(&mut Vec::new(), 1).is_err());

    let mut indices = Vec::new();
    gif.dump_indices(&mut indices, 0).unwrap();
    assert_eq!(indices, pixels);
}

#[test]
fn zfile_recompress_roundtrip() {
    let phrase = b"compress and recompress the very same bytes. ";
    let mut data = Vec::new();
    while data.len() < 6_000 {
        data.extend_from_slice(phrase);
    }

    // Build a .Z file from scratch, then treat it as an existing input.
    let raw = ZFile::from_raw(data.clone());
    let mut settings = OptimizationSettings::unix_compress();
    settings.alignment = 1_024;
    let payload = recompress(&data, Flavor::UnixCompress, &settings, false).unwrap();

    let mut file = Vec::new();
    let written = raw.write_optimized(&mut file, &payload).unwrap();
    assert_eq!(written, file.len() as u64);
    assert_eq!(&file[..3], &[0x1F, 0x9D, 0x90]);

    let parsed = ZFile::from_bytes(&file).unwrap();
    assert_eq!(parsed.data(), &data[..]);
    assert_eq!(parsed.max_code_size(), 16);

    // Round two through the same container keeps the bytes stable.
    let payload2 = recompress(parsed.data(), Flavor::UnixCompress, &settings, false).unwrap();
    let mut file2 = Vec::new();
    parsed.write_optimized(&mut file2, &payload2).unwrap();
    assert_eq!(file2, file);
}
