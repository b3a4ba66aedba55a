//! # Mine Configuration
//!
//! Engine settings and mine definitions, loaded from TOML.
//!
//! ```toml
//! [engine]
//! mine_stats = true
//!
//! [engine.paging]
//! max_page_elapsed_ms = 75
//!
//! [[mine]]
//! name = "a"
//! world = "world"
//! corner_a = [0, 10, 0]
//! corner_b = [9, 19, 9]
//! commands = ["before: say resetting a", "after: say a is ready"]
//!
//! [[mine.block]]
//! block = "STONE"
//! chance = 70.0
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::block::BlockSpec;
use crate::bounds::Bounds;
use crate::error::{MineError, MineResult};

/// Default page time budget in milliseconds.
pub const DEFAULT_PAGE_BUDGET_MS: u64 = 75;
/// Default number of cells between budget checks.
pub const DEFAULT_CHECK_INTERVAL: usize = 250;
/// Default delay before the next page, in ticks.
pub const DEFAULT_SUBMIT_DELAY_TICKS: u64 = 1;
/// Host ticks per second.
pub const TICKS_PER_SECOND: u64 = 20;

/// Paging limits of the reset executor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetPagingConfig {
    /// A page stops once it has run longer than this.
    pub max_page_elapsed_ms: u64,
    /// Cells applied between clock reads.
    pub check_interval_blocks: usize,
    /// Ticks between pages.
    pub submit_delay_ticks: u64,
}

impl Default for ResetPagingConfig {
    fn default() -> Self {
        Self {
            max_page_elapsed_ms: DEFAULT_PAGE_BUDGET_MS,
            check_interval_blocks: DEFAULT_CHECK_INTERVAL,
            submit_delay_ticks: DEFAULT_SUBMIT_DELAY_TICKS,
        }
    }
}

/// Settings shared by every mine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Paging limits.
    pub paging: ResetPagingConfig,
    /// Log statistics after every reset.
    pub mine_stats: bool,
    /// Players closer than this to a mine's center get the reset message.
    pub broadcast_radius: f64,
    /// Ticks before temporary teleport platforms are removed.
    pub overlay_cleanup_delay_ticks: u64,
    /// Block used for the temporary teleport platform.
    pub overlay_block: String,
    /// Fixed seed for block generation. Entropy when absent.
    pub seed: Option<u64>,
    /// Host ticks per second.
    pub ticks_per_second: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            paging: ResetPagingConfig::default(),
            mine_stats: false,
            broadcast_radius: 150.0,
            overlay_cleanup_delay_ticks: 40,
            overlay_block: "GLASS".to_string(),
            seed: None,
            ticks_per_second: TICKS_PER_SECOND,
        }
    }
}

/// Skip-reset heuristic settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkipResetConfig {
    /// Heuristic on or off.
    pub enabled: bool,
    /// Skip while more than this percent of the mine remains.
    pub threshold_percent: f64,
    /// Skips allowed before a reset is forced.
    pub bypass_limit: u32,
}

impl Default for SkipResetConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold_percent: 80.0,
            bypass_limit: 50,
        }
    }
}

/// Definition of one mine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MineDefinition {
    /// Unique name.
    pub name: String,
    /// World identifier.
    pub world: String,
    /// First corner.
    pub corner_a: [i32; 3],
    /// Opposite corner.
    pub corner_b: [i32; 3],
    /// Palette. Chances should sum to at most 100.
    #[serde(default, rename = "block")]
    pub blocks: Vec<BlockSpec>,
    /// Command hooks, prefixed `before: ` or `after: `.
    #[serde(default)]
    pub commands: Vec<String>,
    /// Teleport target in the mine's world.
    #[serde(default)]
    pub spawn: Option<[f64; 3]>,
    /// Named host destination, used when no spawn is set.
    #[serde(default)]
    pub tp_destination: Option<String>,
    /// Skip-reset heuristic.
    #[serde(default)]
    pub skip_reset: SkipResetConfig,
    /// Run the sweeper after breaks.
    #[serde(default)]
    pub mine_sweeper_enabled: bool,
    /// Seconds between timed resets. 0 disables the timer.
    #[serde(default)]
    pub reset_time_secs: u64,
    /// Reset once no more than this percent remains. 0 waits for empty.
    #[serde(default)]
    pub reset_threshold_percent: f64,
    /// Virtual mines have no region and never reset.
    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,
}

impl MineDefinition {
    /// Creates a definition with an empty palette.
    #[must_use]
    pub fn new(name: impl Into<String>, world: impl Into<String>, a: [i32; 3], b: [i32; 3]) -> Self {
        Self {
            name: name.into(),
            world: world.into(),
            corner_a: a,
            corner_b: b,
            blocks: Vec::new(),
            commands: Vec::new(),
            spawn: None,
            tp_destination: None,
            skip_reset: SkipResetConfig::default(),
            mine_sweeper_enabled: false,
            reset_time_secs: 0,
            reset_threshold_percent: 0.0,
            is_virtual: false,
        }
    }

    /// Adds a palette entry.
    #[must_use]
    pub fn with_block(mut self, spec: BlockSpec) -> Self {
        self.blocks.push(spec);
        self
    }

    /// Checks ranges that would make generation meaningless.
    ///
    /// # Errors
    ///
    /// Returns [`MineError::InvalidConfig`] naming the mine and the problem.
    pub fn validate(&self) -> MineResult<()> {
        let bad = |what: String| Err(MineError::InvalidConfig(format!("mine `{}`: {what}", self.name)));

        if self.name.trim().is_empty() {
            return Err(MineError::InvalidConfig("mine name is empty".to_string()));
        }

        let mut sum = 0.0;
        for spec in &self.blocks {
            if !(0.0..=100.0).contains(&spec.chance) {
                return bad(format!("chance {} of {} is outside 0-100", spec.chance, spec.block));
            }
            if spec.constraint_max > 0 && spec.constraint_min > spec.constraint_max {
                return bad(format!(
                    "{} has min {} above max {}",
                    spec.block, spec.constraint_min, spec.constraint_max
                ));
            }
            sum += spec.chance;
        }
        if sum > 100.0 + 1e-9 {
            return bad(format!("block chances sum to {sum:.3}, more than 100"));
        }

        if !self.is_virtual {
            Bounds::new(self.world.clone(), self.corner_a, self.corner_b)
                .check_volume()
                .or_else(|e| bad(e.to_string()))?;
        }

        if !(0.0..=100.0).contains(&self.skip_reset.threshold_percent) {
            return bad("skip reset threshold must be 0-100".to_string());
        }
        if !(0.0..=100.0).contains(&self.reset_threshold_percent) {
            return bad("reset threshold must be 0-100".to_string());
        }

        for command in &self.commands {
            if !command.starts_with(crate::mine::BEFORE_PREFIX)
                && !command.starts_with(crate::mine::AFTER_PREFIX)
            {
                tracing::warn!(mine = %self.name, command = %command, "reset command has no before/after prefix and will never run");
            }
        }
        Ok(())
    }
}

/// Everything loaded from a mines file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MinesConfig {
    /// Engine settings.
    #[serde(default)]
    pub engine: EngineSettings,
    /// Mine definitions.
    #[serde(default, rename = "mine")]
    pub mines: Vec<MineDefinition>,
}

impl MinesConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns a parse error or the first validation failure.
    pub fn from_toml_str(source: &str) -> MineResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error, a parse error or a validation failure.
    pub fn from_file(path: impl AsRef<Path>) -> MineResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Validates engine settings and every mine.
    ///
    /// # Errors
    ///
    /// Returns [`MineError::InvalidConfig`] on the first problem found.
    pub fn validate(&self) -> MineResult<()> {
        if self.engine.paging.check_interval_blocks == 0 {
            return Err(MineError::InvalidConfig(
                "paging check interval must be at least 1".to_string(),
            ));
        }
        if self.engine.ticks_per_second == 0 {
            return Err(MineError::InvalidConfig(
                "ticks per second must be at least 1".to_string(),
            ));
        }

        let mut names = HashSet::with_capacity(self.mines.len());
        for mine in &self.mines {
            mine.validate()?;
            if !names.insert(mine.name.as_str()) {
                return Err(MineError::DuplicateMine(mine.name.clone()));
            }
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
