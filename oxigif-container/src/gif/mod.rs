//! GIF 87a/89a container support.
//!
//! The parser keeps three classes of data per file: the decoded pixel
//! indices of every frame, the retained raw bytes of everything that is not
//! LZW payload (global header, per-frame headers, trailer), and the metadata
//! needed to drive the encoder (code size, dimensions, interlace flag).
//! Writing an optimized file re-emits the retained bytes unchanged around the
//! freshly framed payloads, so everything except the LZW data is bit-exact.

mod interlace;

use oxigif_core::{BitReader, BitVec, OxiGifError, Result};
use oxigif_lzw::{Flavor, LzwDecoder};
use std::io::Write;

/// Image trailer marker.
const TRAILER: u8 = 0x3B;
/// Marker starting every extension block.
const EXTENSION_INTRODUCER: u8 = 0x21;
/// Marker starting an image descriptor.
const IMAGE_SEPARATOR: u8 = 0x2C;
/// Extension label that announces animation timing.
const GRAPHIC_CONTROL_LABEL: u8 = 0xF9;
/// Interlace bit inside the image descriptor's packed field.
const INTERLACE_MASK: u8 = 0x40;
/// GIF codes never exceed 12 bits.
const MAX_CODE_SIZE: u8 = 12;

/// One palette entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    /// Red component.
    pub red: u8,
    /// Green component.
    pub green: u8,
    /// Blue component.
    pub blue: u8,
}

/// A single image within a GIF file.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw bytes from the first extension up to the code-size byte,
    /// retained for bit-exact rewriting.
    pub raw_header: Vec<u8>,
    /// Decoded pixel indices, row-major in stored order.
    pub pixels: Vec<u8>,
    /// Code-size byte preceding the LZW payload (2..=8).
    pub min_code_size: u8,
    /// Raw payload bits of the original encoding, for statistics.
    pub compressed_bits: u64,
    /// Left edge within the logical screen.
    pub offset_left: u16,
    /// Top edge within the logical screen.
    pub offset_top: u16,
    /// Frame width in pixels.
    pub width: u16,
    /// Frame height in pixels.
    pub height: u16,
    /// True if rows are stored in interlaced pass order.
    pub is_interlaced: bool,
    /// Sort flag of the local color table.
    pub is_sorted: bool,
    /// Local color table, empty if the global one applies.
    pub local_color_map: Vec<Color>,
    /// Extension blocks preceding this frame: (label, concatenated data).
    pub extensions: Vec<(u8, Vec<u8>)>,
    /// Offset of the packed field holding the interlace bit, relative to
    /// `raw_header`.
    interlace_flag_offset: usize,
}

/// A parsed GIF file, ready for per-frame recompression.
#[derive(Debug, Clone)]
pub struct GifImage {
    raw_header: Vec<u8>,
    raw_trailer: Vec<u8>,
    version: [u8; 6],
    width: u16,
    height: u16,
    color_depth: u8,
    is_sorted: bool,
    background_color: u8,
    aspect_ratio: u8,
    is_animated: bool,
    global_color_map: Vec<Color>,
    frames: Vec<Frame>,
}

/// 16 bits, little endian.
fn read_word(input: &mut BitReader<'_>) -> Result<u16> {
    let low = u16::from(input.read_byte()?);
    let high = u16::from(input.read_byte()?);
    Ok(low | high << 8)
}

fn read_color(input: &mut BitReader<'_>) -> Result<Color> {
    Ok(Color {
        red: input.read_byte()?,
        green: input.read_byte()?,
        blue: input.read_byte()?,
    })
}

impl GifImage {
    /// Parse a complete GIF file held in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut input = BitReader::new(bytes);

        // Signature: "GIF" plus version 87a or 89a.
        let mut version = [0u8; 6];
        for slot in version.iter_mut() {
            *slot = input.read_byte()?;
        }
        if &version[..3] != b"GIF" {
            return Err(OxiGifError::invalid_magic(
                b"GIF".to_vec(),
                version[..3].to_vec(),
            ));
        }
        if version[3] != b'8' || (version[4] != b'7' && version[4] != b'9') || version[5] != b'a' {
            return Err(OxiGifError::invalid_header(
                "invalid GIF version, only 87a and 89a supported",
            ));
        }

        // Logical screen descriptor.
        let width = read_word(&mut input)?;
        let height = read_word(&mut input)?;
        let color_depth = input.read_bits(3)? as u8 + 1;
        let is_sorted = input.read_bool()?;
        input.skip_bits(3)?;
        let has_global_color_map = input.read_bool()?;
        let background_color = input.read_byte()?;
        let aspect_ratio = input.read_byte()?;

        let mut global_color_map = Vec::new();
        if has_global_color_map {
            for _ in 0..1usize << color_depth {
                global_color_map.push(read_color(&mut input)?);
            }
        }

        let raw_header = bytes[..input.bytes_read()].to_vec();

        let mut frames = Vec::new();
        let mut is_animated = false;
        loop {
            let frame_start = input.bytes_read();
            let marker = input.peek_bits(8)? as u8;
            if marker == TRAILER {
                break;
            }

            let mut frame = Frame {
                raw_header: Vec::new(),
                pixels: Vec::new(),
                min_code_size: 0,
                compressed_bits: 0,
                offset_left: 0,
                offset_top: 0,
                width: 0,
                height: 0,
                is_interlaced: false,
                is_sorted: false,
                local_color_map: Vec::new(),
                extensions: Vec::new(),
                interlace_flag_offset: 0,
            };

            Self::parse_extensions(&mut input, &mut frame, &mut is_animated)?;
            Self::parse_image_descriptor(&mut input, &mut frame, frame_start)?;
            frame.raw_header = bytes[frame_start..input.bytes_read()].to_vec();

            frame.min_code_size = input.read_byte()?;
            let size_hint = usize::from(frame.width) * usize::from(frame.height);
            let mut decoder = LzwDecoder::new(Flavor::Gif, frame.min_code_size, MAX_CODE_SIZE)?;
            frame.pixels = decoder.decode(&mut input, size_hint)?;
            frame.compressed_bits = decoder.compressed_bits();

            frames.push(frame);
        }

        let raw_trailer = vec![input.peek_bits(8)? as u8];
        if input.read_byte()? != TRAILER {
            return Err(OxiGifError::invalid_header("invalid trailer"));
        }
        if !input.is_empty() {
            return Err(OxiGifError::invalid_header(
                "data found after the GIF trailer",
            ));
        }

        Ok(Self {
            raw_header,
            raw_trailer,
            version,
            width,
            height,
            color_depth,
            is_sorted,
            background_color,
            aspect_ratio,
            is_animated,
            global_color_map,
            frames,
        })
    }

    /// Load and parse a GIF file from disk.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    fn parse_extensions(
        input: &mut BitReader<'_>,
        frame: &mut Frame,
        is_animated: &mut bool,
    ) -> Result<()> {
        loop {
            let marker = input.peek_bits(8)? as u8;
            if marker != EXTENSION_INTRODUCER {
                return Ok(());
            }
            input.skip_bits(8)?;

            let label = input.read_byte()?;
            if label == GRAPHIC_CONTROL_LABEL {
                *is_animated = true;
            }

            // Read all parts, usually just one.
            let mut data = Vec::new();
            loop {
                let length = input.read_byte()?;
                if length == 0 {
                    break;
                }
                for _ in 0..length {
                    data.push(input.read_byte()?);
                }
            }
            frame.extensions.push((label, data));
        }
    }

    fn parse_image_descriptor(
        input: &mut BitReader<'_>,
        frame: &mut Frame,
        frame_start: usize,
    ) -> Result<()> {
        let identifier = input.read_byte()?;
        if identifier != IMAGE_SEPARATOR {
            return Err(OxiGifError::invalid_header(
                "expected image descriptor, but not found",
            ));
        }

        frame.offset_left = read_word(input)?;
        frame.offset_top = read_word(input)?;
        frame.width = read_word(input)?;
        frame.height = read_word(input)?;

        // The packed field comes next; remember where it lives so the
        // interlace bit can be toggled in the retained bytes.
        frame.interlace_flag_offset = input.bytes_read() - frame_start;

        let mut size_local_color_map = 1usize << (input.read_bits(3)? + 1);
        input.skip_bits(2)?;
        frame.is_sorted = input.read_bool()?;
        frame.is_interlaced = input.read_bool()?;
        let has_local_color_map = input.read_bool()?;
        if !has_local_color_map {
            size_local_color_map = 0;
        }

        for _ in 0..size_local_color_map {
            frame.local_color_map.push(read_color(input)?);
        }

        Ok(())
    }

    /// Number of frames, 1 unless animated.
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// All parsed frames.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Screen width in pixels.
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Screen height in pixels.
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Bits per color of the global palette.
    pub fn color_depth(&self) -> u8 {
        self.color_depth
    }

    /// Global palette, possibly empty.
    pub fn global_color_map(&self) -> &[Color] {
        &self.global_color_map
    }

    /// True if a graphic control extension was seen.
    pub fn is_animated(&self) -> bool {
        self.is_animated
    }

    /// Version string, "GIF87a" or "GIF89a".
    pub fn version(&self) -> &[u8; 6] {
        &self.version
    }

    /// Sort flag of the global palette.
    pub fn is_sorted(&self) -> bool {
        self.is_sorted
    }

    /// Background color index.
    pub fn background_color(&self) -> u8 {
        self.background_color
    }

    /// Pixel aspect ratio byte.
    pub fn aspect_ratio(&self) -> u8 {
        self.aspect_ratio
    }

    /// Convert between interlaced and sequential row order.
    ///
    /// Reorders the pixel rows of the single frame and toggles the interlace
    /// bit in its retained header. Animated images are not supported.
    pub fn set_interlacing(&mut self, make_interlaced: bool) -> Result<()> {
        if self.frames.len() != 1 || self.is_animated {
            return Err(OxiGifError::not_supported(
                "interlace conversion of animated images",
            ));
        }

        let frame = &mut self.frames[0];
        let offset = frame.interlace_flag_offset;
        if offset == 0 || offset >= frame.raw_header.len() {
            return Err(OxiGifError::invalid_header("interlace flag not found"));
        }

        // Row order is irrelevant for a single line.
        if frame.height <= 1 {
            return Ok(());
        }

        let currently_interlaced = frame.raw_header[offset] & INTERLACE_MASK != 0;
        if currently_interlaced == make_interlaced {
            return Ok(());
        }

        let width = usize::from(frame.width);
        let height = usize::from(frame.height);
        if make_interlaced {
            frame.raw_header[offset] |= INTERLACE_MASK;
            frame.pixels = interlace::to_interlaced(&frame.pixels, width, height);
        } else {
            frame.raw_header[offset] &= !INTERLACE_MASK;
            frame.pixels = interlace::to_sequential(&frame.pixels, width, height);
        }
        frame.is_interlaced = make_interlaced;

        Ok(())
    }

    /// Write the file with every frame's LZW payload replaced.
    ///
    /// `payloads` holds one re-encoded bit vector per frame. Everything
    /// around the payloads is the retained original bytes. Returns the
    /// number of bytes written.
    pub fn write_optimized<W: Write>(&self, writer: &mut W, payloads: &[BitVec]) -> Result<u64> {
        if payloads.len() != self.frames.len() {
            return Err(OxiGifError::invalid_header(
                "payload count does not match frame count",
            ));
        }

        let mut written = 0u64;
        writer.write_all(&self.raw_header)?;
        written += self.raw_header.len() as u64;

        for (frame, payload) in self.frames.iter().zip(payloads) {
            writer.write_all(&frame.raw_header)?;
            writer.write_all(&[frame.min_code_size])?;
            written += frame.raw_header.len() as u64 + 1;

            // Sub-blocks of at most 255 data bytes each.
            for chunk in payload.as_bytes().chunks(255) {
                writer.write_all(&[chunk.len() as u8])?;
                writer.write_all(chunk)?;
                written += chunk.len() as u64 + 1;
            }

            // Empty block terminates the payload.
            writer.write_all(&[0])?;
            written += 1;
        }

        writer.write_all(&self.raw_trailer)?;
        written += self.raw_trailer.len() as u64;

        Ok(written)
    }

    /// Store one frame as a binary PPM image.
    pub fn dump_ppm<W: Write>(&self, writer: &mut W, frame_index: usize) -> Result<()> {
        let frame = self
            .frames
            .get(frame_index)
            .ok_or_else(|| OxiGifError::invalid_header("invalid frame number"))?;
        if frame.width != self.width || frame.height != self.height {
            return Err(OxiGifError::not_supported("PPM dump of partial frames"));
        }

        // Local palette entries shadow the global ones.
        let mut color_map = self.global_color_map.clone();
        for (index, &color) in frame.local_color_map.iter().enumerate() {
            if index < color_map.len() {
                color_map[index] = color;
            } else {
                color_map.push(color);
            }
        }

        write!(writer, "P6\n{} {}\n255\n", self.width, self.height)?;
        for &pixel in &frame.pixels {
            let color = color_map
                .get(usize::from(pixel))
                .ok_or_else(|| OxiGifError::invalid_header("pixel outside the palette"))?;
            writer.write_all(&[color.red, color.green, color.blue])?;
        }

        Ok(())
    }

    /// Store one frame's raw pixel indices.
    pub fn dump_indices<W: Write>(&self, writer: &mut W, frame_index: usize) -> Result<()> {
        let frame = self
            .frames
            .get(frame_index)
            .ok_or_else(|| OxiGifError::invalid_header("invalid frame number"))?;
        writer.write_all(&frame.pixels)?;
        Ok(())
    }
}
