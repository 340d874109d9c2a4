//! Size tiers and the routing table of the denoiser
//!
//! A grid is routed by its side length. Larger grids travel through more
//! encoder stages (and the matching decoder suffix); tiny grids only see the
//! outermost stage so they are not over-smoothed.
//!
//! | size           | tier   | encoder          | decoder              |
//! |----------------|--------|------------------|----------------------|
//! | size > 24      | large  | stage1..=stage4  | decoder1..=decoder4  |
//! | 11 < size ≤ 24 | medium | stage1..=stage3  | decoder2..=decoder4  |
//! | 6 < size ≤ 11  | small  | stage1..=stage2  | decoder3..=decoder4  |
//! | size ≤ 6       | tiny   | stage1           | decoder4             |

use std::fmt;
use std::ops::Range;

/// Number of encoder (and decoder) stages in the full-depth path
pub const NUM_STAGES: usize = 4;

/// Grids strictly larger than this use the full-depth path
pub const LARGE_ABOVE: usize = 24;
/// Grids strictly larger than this (and not large) use three stages
pub const MEDIUM_ABOVE: usize = 11;
/// Grids strictly larger than this (and not medium) use two stages
pub const SMALL_ABOVE: usize = 6;

/// Size-based routing category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GridTier {
    Tiny,
    Small,
    Medium,
    Large,
}

impl GridTier {
    pub const ALL: [GridTier; 4] = [
        GridTier::Tiny,
        GridTier::Small,
        GridTier::Medium,
        GridTier::Large,
    ];

    /// Pick the tier for a square grid of side `size`.
    ///
    /// Upper bounds are inclusive, so 24 is medium, 11 is small and 6 is tiny.
    pub fn from_size(size: usize) -> Self {
        if size > LARGE_ABOVE {
            GridTier::Large
        } else if size > MEDIUM_ABOVE {
            GridTier::Medium
        } else if size > SMALL_ABOVE {
            GridTier::Small
        } else {
            GridTier::Tiny
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GridTier::Tiny => "tiny",
            GridTier::Small => "small",
            GridTier::Medium => "medium",
            GridTier::Large => "large",
        }
    }

    /// Number of encoder stages applied
    pub fn encoder_depth(&self) -> usize {
        match self {
            GridTier::Tiny => 1,
            GridTier::Small => 2,
            GridTier::Medium => 3,
            GridTier::Large => 4,
        }
    }

    /// Zero-based indices of the encoder stages applied (a prefix)
    pub fn encoder_stages(&self) -> Range<usize> {
        0..self.encoder_depth()
    }

    /// Zero-based indices of the decoder stages applied (a suffix)
    pub fn decoder_stages(&self) -> Range<usize> {
        (NUM_STAGES - self.encoder_depth())..NUM_STAGES
    }

    /// Whether the encoder prefix ends at a different width than the
    /// decoder suffix starts at
    pub fn needs_bridge(&self) -> bool {
        !matches!(self, GridTier::Large)
    }

    /// Human-readable layer path, e.g. `stage1 -> stage2 -> bridge.small -> decoder3 -> decoder4`
    pub fn stage_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .encoder_stages()
            .map(|i| format!("stage{}", i + 1))
            .collect();
        if self.needs_bridge() {
            names.push(format!("bridge.{}", self.name()));
        }
        names.extend(self.decoder_stages().map(|i| format!("decoder{}", i + 1)));
        names
    }
}

impl fmt::Display for GridTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
