//! OxiGIF CLI - lossless GIF and .Z recompression.
//!
//! Decodes the LZW payload of a GIF (or Unix compress .Z) file and re-encodes
//! it with non-greedy parsing and optimized dictionary restarts. Pixels,
//! palettes, extensions and all other metadata are preserved byte for byte.

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use oxigif_container::{GifImage, ZFile};
use oxigif_core::BitVec;
use oxigif_lzw::{Flavor, LzwEncoder, OptimizationSettings};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "oxigif")]
#[command(version, about = "Lossless GIF and .Z LZW recompression")]
#[command(long_about = "
OxiGIF losslessly shrinks the LZW bitstream of GIF and Unix compress files.
The decoded pixels stay bit-identical; only the token stream changes.

Examples:
  oxigif --info image.gif
  oxigif image.gif smaller.gif
  oxigif --prettygood --summary image.gif smaller.gif
  oxigif --alignment 64 --nongreedy 2 animation.gif smaller.gif
  oxigif archive.Z smaller.Z
")]
struct Cli {
    /// Input file (GIF, or .Z with -Z / a .Z extension)
    input: PathBuf,

    /// Output file; not needed with --info or --benchmark
    output: Option<PathBuf>,

    /// Non-greedy search plus a greedy re-check per block; typically the best results
    #[arg(short, long)]
    prettygood: bool,

    /// Blocks start at multiples of this value (1 = best compression, may be slow)
    #[arg(short, long, default_value_t = 1, value_name = "N")]
    alignment: u32,

    /// Maximum size of the LZW dictionary per block (0 = format maximum)
    #[arg(short, long, value_name = "N")]
    dictionary: Option<u32>,

    /// Maximum number of tokens per block (0 = unlimited; huge values are slow)
    #[arg(short = 't', long, value_name = "N")]
    maxtokens: Option<u32>,

    /// Produce files that are friendlier to faulty decoders
    #[arg(short, long)]
    compatible: bool,

    /// Ensure that the output is not interlaced
    #[arg(short = 'l', long)]
    deinterlace: bool,

    /// Greedy match search (the default)
    #[arg(short, long)]
    greedy: bool,

    /// Non-greedy match search; the value is the minimum match length
    #[arg(short, long, value_name = "LEN", num_args = 0..=1, require_equals = true, default_missing_value = "2")]
    nongreedy: Option<u32>,

    /// Minimum number of bytes a non-greedy match must save (requires --nongreedy)
    #[arg(short, long, value_name = "N")]
    minimprovement: Option<u32>,

    /// Analyze the internal structure of INPUT
    #[arg(short, long)]
    info: bool,

    /// Overwrite OUTPUT if it already exists
    #[arg(short, long)]
    force: bool,

    /// Allow partial matching of long runs of the same byte (requires --nongreedy)
    #[arg(short = 'r', long)]
    splitruns: bool,

    /// Custom block boundaries instead of searching, ascending (e.g. -u 500,2000,9000)
    #[arg(short = 'u', long, value_delimiter = ',', value_name = "POS")]
    userdefined: Option<Vec<u32>>,

    /// Compare the file sizes of INPUT and OUTPUT when finished
    #[arg(short, long)]
    summary: bool,

    /// Show debug messages
    #[arg(short, long)]
    verbose: bool,

    /// No output during compression
    #[arg(short, long)]
    quiet: bool,

    /// INPUT and OUTPUT are in .Z file format instead of GIF
    #[arg(short = 'Z', long = "unix-compress")]
    unix_compress: bool,

    /// Benchmark the decoder; the value is the number of iterations
    #[arg(short, long, value_name = "ITERATIONS", num_args = 0..=1, require_equals = true, default_missing_value = "100")]
    benchmark: Option<u32>,

    /// Skip the initial clear code and start immediately with compressed data
    #[arg(short = 'y', long)]
    immediately: bool,

    /// INPUT is not compressed yet; OUTPUT will be a .Z file
    #[arg(long)]
    compress: bool,

    /// Store the decompressed contents of INPUT, which must be a .Z file
    #[arg(long)]
    decompress: bool,

    /// Store the given frame (1-based) in PPM format
    #[arg(long, value_name = "FRAME")]
    ppm: Option<usize>,

    /// Store the given frame's (1-based) raw color indices
    #[arg(long, value_name = "FRAME")]
    indices: Option<usize>,
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> CliResult {
    // Contradicting flags.
    if cli.quiet && cli.verbose {
        return Err("flag --quiet contradicts --verbose".into());
    }
    if cli.quiet && cli.summary {
        return Err("flag --quiet contradicts --summary".into());
    }
    if cli.splitruns && cli.nongreedy.is_none() && !cli.prettygood {
        return Err("flag --splitruns requires --nongreedy".into());
    }
    if cli.alignment == 0 {
        return Err("--alignment cannot be zero".into());
    }
    if let Some(min_match) = cli.nongreedy {
        if min_match < 2 {
            return Err("--nongreedy cannot be less than 2".into());
        }
    }
    if cli.minimprovement == Some(0) {
        return Err("--minimprovement cannot be zero".into());
    }
    if let Some(boundaries) = &cli.userdefined {
        if !boundaries.windows(2).all(|pair| pair[0] < pair[1]) {
            return Err("--userdefined must be an ascendingly sorted list".into());
        }
    }

    // .Z files are recognized by flag, mode or extension.
    let is_gif = !cli.unix_compress
        && !cli.compress
        && !cli.decompress
        && cli.input.extension().and_then(|ext| ext.to_str()) != Some("Z");

    let start = Instant::now();

    if cli.info {
        return cmd_info(cli, is_gif);
    }
    if let Some(iterations) = cli.benchmark {
        return cmd_benchmark(cli, is_gif, iterations);
    }

    let output = cli.output.as_ref().ok_or("missing OUTPUT file")?;
    if *output == cli.input {
        return Err("INPUT and OUTPUT cannot be the same file".into());
    }
    if !cli.force && output.exists() {
        return Err("OUTPUT already exists, please use --force to overwrite".into());
    }

    // Debugging dumps.
    if cli.ppm.is_some() || cli.indices.is_some() {
        if !is_gif {
            return Err("--ppm and --indices only work on GIF files".into());
        }
        let gif = GifImage::open(&cli.input)?;
        let frame = cli.ppm.or(cli.indices).unwrap_or(1);
        let index = frame
            .checked_sub(1)
            .filter(|&i| i < gif.num_frames())
            .ok_or("please specify a valid frame number")?;
        let mut writer = BufWriter::new(File::create(output)?);
        if cli.ppm.is_some() {
            gif.dump_ppm(&mut writer, index)?;
        } else {
            gif.dump_indices(&mut writer, index)?;
        }
        writer.flush()?;
        return Ok(());
    }

    if cli.decompress {
        let z = ZFile::open(&cli.input)?;
        std::fs::write(output, z.data())?;
        return Ok(());
    }

    let (settings, smart_greedy) = build_settings(cli, is_gif);
    if !cli.quiet {
        println!("oxigif {}", env!("CARGO_PKG_VERSION"));
    }

    if is_gif {
        recompress_gif(cli, output, settings, smart_greedy)?;
    } else {
        recompress_z(cli, output, settings)?;
    }

    if cli.summary {
        print_summary(cli, output, &settings, start)?;
    }

    Ok(())
}

/// Translate command line flags into optimizer settings.
fn build_settings(cli: &Cli, is_gif: bool) -> (OptimizationSettings, bool) {
    let mut settings = if is_gif {
        OptimizationSettings::gif(8)
    } else {
        OptimizationSettings::unix_compress()
    };
    let mut smart_greedy = false;

    settings.alignment = cli.alignment;
    settings.split_runs = cli.splitruns;

    if let Some(min_match) = cli.nongreedy {
        settings.greedy = false;
        settings.min_nongreedy_match = min_match;
    }
    if let Some(improvement) = cli.minimprovement {
        settings.min_improvement = improvement;
    }
    if let Some(dictionary) = cli.dictionary {
        settings.max_dictionary = dictionary;
    }
    if let Some(tokens) = cli.maxtokens {
        settings.max_tokens = tokens;
    }
    if cli.prettygood {
        smart_greedy = true;
        settings.greedy = false;
        settings.min_improvement = OptimizationSettings::DEFAULT_MIN_IMPROVEMENT;
        settings.max_dictionary = OptimizationSettings::GIF_MAX_DICTIONARY;
        settings.max_tokens = OptimizationSettings::GIF_MAX_TOKENS;
        settings.avoid_nongreedy_again = true;
    }
    if cli.compatible {
        settings.max_dictionary = OptimizationSettings::COMPATIBLE_MAX_DICTIONARY;
        settings.greedy = true;
        settings.start_with_clear_code = true;
    }
    if cli.greedy {
        settings.greedy = true;
    }
    if cli.immediately {
        settings.start_with_clear_code = false;
    }

    // GIF-sized limits scale up for the 16-bit .Z dictionary.
    if !is_gif {
        settings.start_with_clear_code = false;
        if settings.max_dictionary == OptimizationSettings::GIF_MAX_DICTIONARY
            || settings.max_dictionary == OptimizationSettings::COMPATIBLE_MAX_DICTIONARY
        {
            settings.max_dictionary = OptimizationSettings::UNIX_MAX_DICTIONARY;
        }
        if settings.max_tokens == OptimizationSettings::GIF_MAX_TOKENS {
            settings.max_tokens = OptimizationSettings::UNIX_MAX_TOKENS;
        }
    }

    (settings, smart_greedy)
}

/// Progress bar over the scoring pass, hidden in quiet mode.
///
/// The scoring pass runs right to left over the whole input, so a percentage
/// plus an ETA is more useful than raw position counts; the caller's message
/// names the frame being worked on.
fn create_progress_bar(len: u64, enable: bool) -> ProgressBar {
    if !enable {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg}: {percent:>3}% {bar:30} {eta} left")
            .expect("progress bar template is valid")
            .progress_chars("=> "),
    );
    pb
}

/// Score every aligned offset from right to left, with progress reporting.
fn score_blocks(
    encoder: &mut LzwEncoder<'_>,
    length: usize,
    settings: &OptimizationSettings,
    smart_greedy: bool,
    pb: &ProgressBar,
) -> Result<(), oxigif_lzw::LzwError> {
    let alignment = settings.alignment as usize;
    for i in (0..length).rev() {
        if i % alignment != 0 {
            continue;
        }
        encoder.optimize_partial(i as u32, 0, false, true, settings)?;
        if smart_greedy && !settings.greedy {
            let mut greedy = *settings;
            greedy.greedy = true;
            encoder.optimize_partial(i as u32, 0, false, true, &greedy)?;
        }
        pb.inc(1);
    }
    Ok(())
}

/// Per-block cost report after a completed scoring pass.
fn print_block_costs(encoder: &LzwEncoder<'_>, length: usize, alignment: u32, unit: &str) {
    let mut pos = 0u32;
    while (pos as usize) < length {
        let Some(stats) = encoder.best_block(pos, alignment) else {
            break;
        };
        println!(
            "cost @ {} \t=> bits={} \t{}s={} \ttokens={} \tbits/{}={:.3} \tnon-greedy={}{}",
            pos,
            stats.bits,
            unit,
            stats.length,
            stats.tokens,
            unit,
            f64::from(stats.bits) / f64::from(stats.length),
            stats.nongreedy,
            if stats.partial {
                ", last match is partial"
            } else {
                ""
            }
        );
        pos += stats.length;
    }
}

fn recompress_gif(
    cli: &Cli,
    output: &PathBuf,
    mut settings: OptimizationSettings,
    smart_greedy: bool,
) -> CliResult {
    let mut gif = GifImage::open(&cli.input)?;
    if gif.num_frames() == 0 {
        return Err("no frames found".into());
    }

    if cli.deinterlace {
        gif.set_interlacing(false)?;
    }
    if gif.num_frames() > 1 && cli.userdefined.is_some() {
        return Err("user-defined block boundaries are not allowed for animated GIFs".into());
    }

    let num_frames = gif.num_frames();
    let mut payloads: Vec<BitVec> = Vec::with_capacity(num_frames);

    for (index, frame) in gif.frames().iter().enumerate() {
        settings.min_code_size = frame.min_code_size;
        let mut encoder = LzwEncoder::new(&frame.pixels, Flavor::Gif);

        let payload = if let Some(boundaries) = &cli.userdefined {
            // Clamp to the frame and make sure both ends are present.
            let mut restarts: Vec<u32> = boundaries
                .iter()
                .copied()
                .filter(|&pos| (pos as usize) <= frame.pixels.len())
                .collect();
            if restarts.first() != Some(&0) {
                restarts.insert(0, 0);
            }
            if restarts.last() != Some(&(frame.pixels.len() as u32)) {
                restarts.push(frame.pixels.len() as u32);
            }

            // Limits could truncate a predefined block halfway through.
            let mut merge_settings = settings;
            merge_settings.max_tokens = 0;
            merge_settings.max_dictionary = 0;
            encoder.merge(&restarts, &merge_settings)?
        } else {
            let positions = frame.pixels.len().div_ceil(settings.alignment as usize);
            let pb = create_progress_bar(positions as u64, !cli.quiet);
            pb.set_message(format!(
                "frame {}/{} ({} pixels)",
                index + 1,
                num_frames,
                frame.pixels.len()
            ));
            score_blocks(&mut encoder, frame.pixels.len(), &settings, smart_greedy, &pb)?;
            pb.finish_and_clear();

            if cli.verbose {
                print_block_costs(&encoder, frame.pixels.len(), settings.alignment, "pixel");
            }

            encoder.optimize(&settings)?
        };

        payloads.push(payload);
    }

    let mut writer = BufWriter::new(File::create(output)?);
    gif.write_optimized(&mut writer, &payloads)?;
    writer.flush()?;

    Ok(())
}

fn recompress_z(cli: &Cli, output: &PathBuf, settings: OptimizationSettings) -> CliResult {
    if cli.userdefined.is_some() {
        return Err("user-defined block boundaries are not implemented for .Z files".into());
    }

    let z = if cli.compress {
        ZFile::from_raw(std::fs::read(&cli.input)?)
    } else {
        ZFile::open(&cli.input)?
    };
    // The flags byte is kept verbatim, so the re-encoded stream must not use
    // wider codes than the file announces.
    if z.max_code_size() != 16 {
        return Err(format!(
            "only 16-bit .Z files can be recompressed, this one uses {} bits",
            z.max_code_size()
        )
        .into());
    }

    let mut encoder = LzwEncoder::new(z.data(), Flavor::UnixCompress);

    let positions = z.data().len().div_ceil(settings.alignment as usize);
    let pb = create_progress_bar(positions as u64, !cli.quiet);
    pb.set_message(format!("{} bytes", z.data().len()));
    score_blocks(&mut encoder, z.data().len(), &settings, false, &pb)?;
    pb.finish_and_clear();

    if cli.verbose {
        print_block_costs(&encoder, z.data().len(), settings.alignment, "byte");
    }

    let payload = encoder.optimize(&settings)?;

    let mut writer = BufWriter::new(File::create(output)?);
    z.write_optimized(&mut writer, &payload)?;
    writer.flush()?;

    Ok(())
}

fn cmd_info(cli: &Cli, is_gif: bool) -> CliResult {
    if is_gif {
        let gif = GifImage::open(&cli.input)?;
        println!(
            "'{}' {}, {}x{}, {} colors{}",
            cli.input.display(),
            String::from_utf8_lossy(gif.version()),
            gif.width(),
            gif.height(),
            1u32 << gif.color_depth(),
            if gif.is_animated() { ", animated" } else { "" }
        );

        for (index, frame) in gif.frames().iter().enumerate() {
            println!(
                "frame {}: {}x{} located at {}x{}, {} pixels, code size {}, {} LZW bits{}{}",
                index + 1,
                frame.width,
                frame.height,
                frame.offset_left,
                frame.offset_top,
                frame.pixels.len(),
                frame.min_code_size,
                frame.compressed_bits,
                if frame.is_interlaced {
                    ", interlaced"
                } else {
                    ""
                },
                if frame.local_color_map.is_empty() {
                    String::new()
                } else {
                    format!(", local color map size={}", frame.local_color_map.len())
                }
            );
        }
    } else {
        let z = ZFile::open(&cli.input)?;
        println!(
            "'{}' .Z block mode, {} bit codes, {} bytes uncompressed, {} LZW bits",
            cli.input.display(),
            z.max_code_size(),
            z.data().len(),
            z.compressed_bits()
        );
    }

    Ok(())
}

fn cmd_benchmark(cli: &Cli, is_gif: bool, iterations: u32) -> CliResult {
    if iterations == 0 {
        return Err("--benchmark cannot be zero".into());
    }

    println!("benchmarking '{}' ...", cli.input.display());
    println!("decoding file, {} iterations", iterations);

    let bytes = std::fs::read(&cli.input)?;
    let start = Instant::now();

    let mut num_frames = 0u64;
    let mut num_pixels = 0u64;
    for _ in 0..iterations {
        if is_gif {
            let gif = GifImage::from_bytes(&bytes)?;
            num_frames += gif.num_frames() as u64;
            for frame in gif.frames() {
                num_pixels += frame.pixels.len() as u64;
            }
        } else {
            let z = ZFile::from_bytes(&bytes)?;
            num_frames += 1;
            num_pixels += z.data().len() as u64;
        }
    }

    let seconds = start.elapsed().as_secs_f64();
    println!("elapsed:    {:.6} seconds", seconds);
    println!("per file:   {:.6} seconds", seconds / f64::from(iterations));
    if u64::from(iterations) != num_frames {
        println!("per frame:  {:.6} seconds", seconds / num_frames as f64);
    }
    println!(
        "throughput: {:.3} megapixel/second",
        num_pixels as f64 / seconds / 1_000_000.0
    );

    Ok(())
}

fn print_summary(
    cli: &Cli,
    output: &PathBuf,
    settings: &OptimizationSettings,
    start: Instant,
) -> CliResult {
    let before = std::fs::metadata(&cli.input)?.len() as i64;
    let now = std::fs::metadata(output)?.len() as i64;
    let diff = before - now;

    if diff == 0 {
        print!(
            "no optimization found for '{}', same size as before ({} bytes).",
            cli.input.display(),
            now
        );
    } else if diff > 0 {
        print!(
            "'{}' is {} bytes smaller than '{}' ({} vs {} bytes) => you saved {:.3}%.",
            output.display(),
            diff,
            cli.input.display(),
            now,
            before,
            diff as f64 * 100.0 / before as f64
        );
    } else {
        print!(
            "'{}' is {} bytes larger than '{}' ({} vs {} bytes).",
            output.display(),
            -diff,
            cli.input.display(),
            now,
            before
        );
        // Pointless advice when the slowest settings were already in use.
        if settings.alignment > 1 || settings.greedy {
            print!(" Please use more aggressive optimization settings.");
        }
    }

    println!(
        " Finished after {:.2} seconds.",
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
