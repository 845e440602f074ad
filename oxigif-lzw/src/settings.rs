//! Bitstream flavors and optimization settings.

/// The two LZW container flavors this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// GIF: sub-block framing, end-of-stream code, 12-bit code space.
    Gif,
    /// Unix compress `.Z`: raw framing, no end-of-stream code, 16-bit code space.
    UnixCompress,
}

impl Flavor {
    /// Maximum bits per LZW code.
    pub fn max_code_bits(self) -> u8 {
        match self {
            Flavor::Gif => 12,
            Flavor::UnixCompress => 16,
        }
    }

    /// Maximum number of dictionary entries, one less than the code space.
    pub fn max_dictionary(self) -> u32 {
        (1 << self.max_code_bits()) - 1
    }

    /// True if the flavor reserves an end-of-stream code next to the clear code.
    pub fn has_end_of_stream(self) -> bool {
        matches!(self, Flavor::Gif)
    }
}

/// Parameters steering the block-boundary optimizer.
///
/// The defaults of [`OptimizationSettings::gif`] favor compatibility: greedy
/// matching, a leading clear code and the token limit that keeps the
/// quadratic boundary search tractable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizationSettings {
    /// Bits per literal; the clear code is `1 << min_code_size`. Range 2..=8.
    pub min_code_size: u8,
    /// Emit a clear code before the first block (GIF only). Many decoders
    /// expect it even though the dictionary is already fresh.
    pub start_with_clear_code: bool,
    /// If true, always take the longest match; otherwise look for shorter
    /// matches that make the following match longer.
    pub greedy: bool,
    /// Minimum match length considered for the non-greedy lookahead.
    pub min_nongreedy_match: u32,
    /// Minimum number of bytes a non-greedy pair must gain to be taken.
    pub min_improvement: u32,
    /// Maximum number of dictionary entries per block; 0 means no limit
    /// beyond the format's code space.
    pub max_dictionary: u32,
    /// Maximum number of codes per block; 0 means unlimited. Large values
    /// severely affect the boundary search speed.
    pub max_tokens: u32,
    /// Allow the non-greedy lookahead to carve up runs of identical bytes.
    pub split_runs: bool,
    /// Block starts are considered at multiples of this value; 1 finds the
    /// optimum, larger values trade compression for speed. Must be nonzero.
    pub alignment: u32,
    /// Skip cost bookkeeping; used by the emission pass once the block table
    /// is final.
    pub read_only_best: bool,
    /// Skip the redundant greedy re-score of blocks where the non-greedy
    /// search already found nothing.
    pub avoid_nongreedy_again: bool,
}

impl OptimizationSettings {
    /// Default per-block token limit for GIF frames.
    pub const GIF_MAX_TOKENS: u32 = 20_000;
    /// Default per-block token limit for `.Z` files.
    pub const UNIX_MAX_TOKENS: u32 = 100_000;
    /// Default dictionary limit for GIF frames.
    pub const GIF_MAX_DICTIONARY: u32 = 4096;
    /// Dictionary limit that sidesteps decoders which mishandle a full table.
    pub const COMPATIBLE_MAX_DICTIONARY: u32 = 4093;
    /// Default dictionary limit for `.Z` files.
    pub const UNIX_MAX_DICTIONARY: u32 = 65_536;
    /// Default minimum match length for the non-greedy lookahead.
    pub const DEFAULT_MIN_NONGREEDY: u32 = 2;
    /// Default minimum improvement for a non-greedy pair.
    pub const DEFAULT_MIN_IMPROVEMENT: u32 = 1;

    /// Conservative settings for a GIF frame with the given code size.
    pub fn gif(min_code_size: u8) -> Self {
        Self {
            min_code_size,
            start_with_clear_code: true,
            greedy: true,
            min_nongreedy_match: Self::DEFAULT_MIN_NONGREEDY,
            min_improvement: Self::DEFAULT_MIN_IMPROVEMENT,
            max_dictionary: 0,
            max_tokens: Self::GIF_MAX_TOKENS,
            split_runs: false,
            alignment: 1,
            read_only_best: false,
            avoid_nongreedy_again: false,
        }
    }

    /// Conservative settings for a `.Z` file.
    ///
    /// The literal alphabet is always the full byte range, and there is no
    /// leading clear code in the `.Z` format.
    pub fn unix_compress() -> Self {
        Self {
            min_code_size: 8,
            start_with_clear_code: false,
            max_dictionary: Self::UNIX_MAX_DICTIONARY,
            max_tokens: Self::UNIX_MAX_TOKENS,
            ..Self::gif(8)
        }
    }
}
