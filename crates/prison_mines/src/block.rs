//! # Block Palette
//!
//! Block type identifiers and the per-mine palette entries ([`BlockSpec`])
//! the selector draws from.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Identifier of a block type as the host names it (`STONE`, `IRON_ORE`).
///
/// Names are stored upper case. Cloning is cheap: a generated mine holds one
/// clone per cell.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct BlockType(Arc<str>);

impl BlockType {
    /// Name of the empty block.
    pub const AIR_NAME: &'static str = "AIR";
    /// Name of the placeholder that tells the engine to leave cells alone.
    pub const IGNORE_NAME: &'static str = "IGNORE";

    /// Creates a block type from a host name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name.trim().to_ascii_uppercase()))
    }

    /// The empty block.
    #[must_use]
    pub fn air() -> Self {
        Self(Arc::from(Self::AIR_NAME))
    }

    /// The ignore placeholder.
    #[must_use]
    pub fn ignore() -> Self {
        Self(Arc::from(Self::IGNORE_NAME))
    }

    /// Returns true for air.
    #[inline]
    #[must_use]
    pub fn is_air(&self) -> bool {
        &*self.0 == Self::AIR_NAME
    }

    /// Returns true for the ignore placeholder.
    #[inline]
    #[must_use]
    pub fn is_ignore(&self) -> bool {
        &*self.0 == Self::IGNORE_NAME
    }

    /// The block name.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for BlockType {
    fn from(name: String) -> Self {
        Self::new(&name)
    }
}

impl From<&str> for BlockType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<BlockType> for String {
    fn from(block: BlockType) -> Self {
        block.0.to_string()
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockType({})", self.0)
    }
}

/// Running counters for one palette entry.
///
/// `placed`, `mined` and the band markers are reset at the start of every
/// generation pass. `mined_total` is cumulative and persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockCounters {
    /// Cells assigned to this block by the current generation.
    pub placed: u64,
    /// Cells of this block broken since the last generation.
    pub mined: u64,
    /// Cells of this block broken over the mine's lifetime.
    pub mined_total: u64,
    /// Breaks not yet flushed to persistence.
    pub unsaved: u64,
    /// First scan position where the exclude-top band no longer applies.
    pub range_low: Option<usize>,
    /// First scan position inside the exclude-bottom band.
    pub range_high: Option<usize>,
}

/// One palette entry of a mine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockSpec {
    /// Block placed when this entry is chosen.
    pub block: BlockType,
    /// Spawn chance in percent, 0 to 100.
    pub chance: f64,
    /// Minimum placements per generation. 0 means unconstrained.
    #[serde(default)]
    pub constraint_min: u64,
    /// Maximum placements per generation. 0 means unconstrained.
    #[serde(default)]
    pub constraint_max: u64,
    /// Never place in the top N levels.
    #[serde(default)]
    pub exclude_top_layers: u64,
    /// Never place in the bottom N levels.
    #[serde(default)]
    pub exclude_bottom_layers: u64,
    /// Mutable counters. Not part of the configuration.
    #[serde(skip)]
    pub counters: BlockCounters,
}

impl BlockSpec {
    /// Creates an unconstrained palette entry.
    #[must_use]
    pub fn new(block: impl Into<BlockType>, chance: f64) -> Self {
        Self {
            block: block.into(),
            chance,
            constraint_min: 0,
            constraint_max: 0,
            exclude_top_layers: 0,
            exclude_bottom_layers: 0,
            counters: BlockCounters::default(),
        }
    }

    /// Sets the minimum placement count.
    #[must_use]
    pub const fn with_min(mut self, min: u64) -> Self {
        self.constraint_min = min;
        self
    }

    /// Sets the maximum placement count.
    #[must_use]
    pub const fn with_max(mut self, max: u64) -> Self {
        self.constraint_max = max;
        self
    }

    /// Excludes the top `layers` levels.
    #[must_use]
    pub const fn excluding_top(mut self, layers: u64) -> Self {
        self.exclude_top_layers = layers;
        self
    }

    /// Excludes the bottom `layers` levels.
    #[must_use]
    pub const fn excluding_bottom(mut self, layers: u64) -> Self {
        self.exclude_bottom_layers = layers;
        self
    }

    /// True if a min or max count is configured.
    #[inline]
    #[must_use]
    pub const fn is_count_constrained(&self) -> bool {
        self.constraint_min > 0 || self.constraint_max > 0
    }

    /// True if a top or bottom band is configured.
    #[inline]
    #[must_use]
    pub const fn is_banded(&self) -> bool {
        self.exclude_top_layers > 0 || self.exclude_bottom_layers > 0
    }

    /// True once the configured maximum has been placed.
    #[inline]
    #[must_use]
    pub const fn max_reached(&self) -> bool {
        self.constraint_max > 0 && self.counters.placed >= self.constraint_max
    }

    /// Placements still missing to reach the minimum.
    #[inline]
    #[must_use]
    pub const fn min_deficit(&self) -> u64 {
        self.constraint_min.saturating_sub(self.counters.placed)
    }

    /// Can this entry be placed at `level` (1-based from the top) and scan
    /// `position`?
    #[must_use]
    pub fn is_eligible(&self, level: u64, position: usize) -> bool {
        if self.exclude_top_layers > 0 && level <= self.exclude_top_layers {
            return false;
        }
        if self.exclude_bottom_layers > 0
            && self.counters.range_high.is_some_and(|high| position >= high)
        {
            return false;
        }
        !self.max_reached()
    }

    /// Half-open `[low, high)` range of scan positions this entry may occupy
    /// in a registry of `len` cells. May be empty.
    #[must_use]
    pub fn eligible_band(&self, len: usize) -> (usize, usize) {
        let low = self.counters.range_low.unwrap_or(0).min(len);
        let high = self.counters.range_high.unwrap_or(len).min(len);
        (low, high)
    }

    /// Resets the per-generation counters. `mined_total` and `unsaved`
    /// survive.
    pub fn reset_counters(&mut self) {
        self.counters.placed = 0;
        self.counters.mined = 0;
        self.counters.range_low = None;
        self.counters.range_high = None;
    }

    /// Records one break of this block.
    #[inline]
    pub fn record_mined(&mut self) {
        self.counters.mined += 1;
        self.counters.mined_total += 1;
        self.counters.unsaved += 1;
    }
}

/// The configured palette of a mine.
pub type Palette = Vec<BlockSpec>;

/// Returns true if the palette tells the engine to leave the mine alone.
#[must_use]
pub fn is_ignore_palette(palette: &[BlockSpec]) -> bool {
    palette.len() == 1 && palette[0].block.is_ignore()
}

// ============================================================================
// TESTS
// ============================================================================
