//! # Mine
//!
//! A mine's definition, palette, generated target blocks and reset state.
//!
//! A `Mine` is shared between the world context and the worker pool as a
//! [`MineHandle`]. Every method here is synchronous and cheap except the
//! ones that walk the target registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::block::{BlockSpec, BlockType, Palette};
use crate::bounds::{Bounds, Edge, Location};
use crate::config::{MineDefinition, SkipResetConfig};
use crate::error::MineResult;
use crate::job::{ResetJob, ResetPhase, ResetStage};
use crate::stats::ResetStats;
use crate::target::{TargetBlockKey, TargetBlockRegistry};

/// Prefix of commands run before a reset.
pub const BEFORE_PREFIX: &str = "before: ";
/// Prefix of commands run after a reset.
pub const AFTER_PREFIX: &str = "after: ";

/// Shared handle to a mine.
pub type MineHandle = Arc<Mutex<Mine>>;

/// Counts saved between restarts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MineCounts {
    /// Mine name.
    pub name: String,
    /// Completed resets.
    pub reset_count: u64,
    /// Lifetime breaks per block name.
    #[serde(default)]
    pub blocks_mined: BTreeMap<String, u64>,
}

/// Mutable reset bookkeeping of one mine.
#[derive(Clone, Debug, Default)]
pub struct MineResetState {
    /// Executor phase.
    pub phase: ResetPhase,
    /// Orchestrator step of the current or last cycle.
    pub stage: ResetStage,
    /// Pages applied in the current cycle.
    pub page: u32,
    /// Next scan position to apply.
    pub position: usize,
    /// Air cells planned by the last generation.
    pub air_count_original: u64,
    /// Air cells now.
    pub air_count: u64,
    /// When the air count was last taken from the world.
    pub air_count_timestamp_ms: u64,
    /// How long that scan took.
    pub air_count_elapsed_ms: u64,
    /// Cells broken. Remaining = total - breaks.
    pub break_count: u64,
    /// Consecutive skip-reset bypasses.
    pub bypass_count: u32,
    /// Completed resets.
    pub reset_count: u64,
    /// Job of the running cycle.
    pub job: Option<ResetJob>,
    /// A sweeper task is scheduled and has not finished.
    pub sweeper_submitted: bool,
    /// When the running cycle started.
    pub cycle_started_ms: u64,
    /// When the last cycle finished (or the mine was registered).
    pub last_reset_ms: u64,
    /// Temporary platform blocks to remove after teleports.
    pub overlay_blocks: Vec<TargetBlockKey>,
    /// Statistics.
    pub stats: ResetStats,
}

impl MineResetState {
    /// Zeroes everything a new generation starts from. The break counter
    /// is left alone: players can keep breaking blocks until paging starts.
    pub fn reset_for_generation(&mut self) {
        self.page = 0;
        self.position = 0;
        self.bypass_count = 0;
        self.air_count_original = 0;
        self.air_count = 0;
        self.stats.reset();
    }
}

/// Result of the skip-reset heuristic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipDecision {
    /// Nothing was mined since the last generation.
    Pristine,
    /// Enough remains; this many bypasses so far.
    Bypassed(u32),
    /// Reset now.
    Reset,
}

/// One mine.
#[derive(Debug)]
pub struct Mine {
    name: String,
    bounds: Bounds,
    palette: Palette,
    commands: Vec<String>,
    spawn: Option<Location>,
    tp_destination: Option<String>,
    skip_reset: SkipResetConfig,
    sweeper_enabled: bool,
    reset_time_secs: u64,
    reset_threshold_percent: f64,
    is_virtual: bool,
    deleted: bool,
    enabled: bool,
    targets: TargetBlockRegistry,
    state: MineResetState,
}

impl Mine {
    /// Builds a mine from its definition. The mine starts enabled; the
    /// orchestrator disables it when its world cannot be resolved.
    ///
    /// # Errors
    ///
    /// Returns the definition's validation error.
    pub fn from_definition(def: &MineDefinition) -> MineResult<Self> {
        def.validate()?;
        let bounds = Bounds::new(def.world.clone(), def.corner_a, def.corner_b);
        let spawn = def
            .spawn
            .map(|[x, y, z]| Location::new(def.world.clone(), x, y, z));

        Ok(Self {
            name: def.name.clone(),
            bounds,
            palette: def.blocks.clone(),
            commands: def.commands.clone(),
            spawn,
            tp_destination: def.tp_destination.clone(),
            skip_reset: def.skip_reset.clone(),
            sweeper_enabled: def.mine_sweeper_enabled,
            reset_time_secs: def.reset_time_secs,
            reset_threshold_percent: def.reset_threshold_percent,
            is_virtual: def.is_virtual,
            deleted: false,
            enabled: true,
            targets: TargetBlockRegistry::new(),
            state: MineResetState::default(),
        })
    }

    /// Wraps the mine in a shared handle.
    #[must_use]
    pub fn into_handle(self) -> MineHandle {
        Arc::new(Mutex::new(self))
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Mine name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Region.
    #[must_use]
    pub const fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Palette.
    #[must_use]
    pub fn palette(&self) -> &[BlockSpec] {
        &self.palette
    }

    /// Mutable palette.
    pub fn palette_mut(&mut self) -> &mut Palette {
        &mut self.palette
    }

    /// Palette entry for a block name.
    #[must_use]
    pub fn spec_index(&self, block: &BlockType) -> Option<usize> {
        self.palette.iter().position(|s| &s.block == block)
    }

    /// Reset command hooks.
    #[must_use]
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Commands with `prefix`, prefix stripped.
    pub fn commands_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.commands
            .iter()
            .filter_map(move |c| c.strip_prefix(prefix))
    }

    /// Teleport target, if configured.
    #[must_use]
    pub const fn spawn(&self) -> Option<&Location> {
        self.spawn.as_ref()
    }

    /// Named host destination, if configured.
    #[must_use]
    pub fn tp_destination(&self) -> Option<&str> {
        self.tp_destination.as_deref()
    }

    /// Skip-reset settings.
    #[must_use]
    pub const fn skip_reset(&self) -> &SkipResetConfig {
        &self.skip_reset
    }

    /// Sweeper on or off.
    #[must_use]
    pub const fn is_sweeper_enabled(&self) -> bool {
        self.sweeper_enabled
    }

    /// Timed reset interval. 0 when off.
    #[must_use]
    pub const fn reset_time_secs(&self) -> u64 {
        self.reset_time_secs
    }

    /// Virtual mines are never reset.
    #[must_use]
    pub const fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    /// Deleted mines are never reset.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Marks the mine deleted.
    pub fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    /// False while the mine's world cannot be resolved.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Updates the enabled flag.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Target blocks.
    #[must_use]
    pub const fn targets(&self) -> &TargetBlockRegistry {
        &self.targets
    }

    /// Mutable target blocks.
    pub fn targets_mut(&mut self) -> &mut TargetBlockRegistry {
        &mut self.targets
    }

    /// Reset state.
    #[must_use]
    pub const fn state(&self) -> &MineResetState {
        &self.state
    }

    /// Mutable reset state.
    pub fn state_mut(&mut self) -> &mut MineResetState {
        &mut self.state
    }

    // ------------------------------------------------------------------
    // Counts
    // ------------------------------------------------------------------

    /// Total cells in the region.
    #[must_use]
    pub const fn total_cells(&self) -> u64 {
        self.bounds.total_cells()
    }

    /// Cells not yet broken.
    #[must_use]
    pub const fn remaining_block_count(&self) -> u64 {
        self.total_cells().saturating_sub(self.state.break_count)
    }

    /// Percent of the mine still standing. 0 for virtual mines.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent_remaining(&self) -> f64 {
        let total = self.total_cells();
        if self.is_virtual || total == 0 {
            return 0.0;
        }
        self.remaining_block_count() as f64 * 100.0 / total as f64
    }

    /// True once the mine is empty or at its configured reset threshold.
    #[must_use]
    pub fn is_depleted(&self) -> bool {
        if self.is_virtual {
            return false;
        }
        self.remaining_block_count() == 0
            || (self.reset_threshold_percent > 0.0
                && self.percent_remaining() <= self.reset_threshold_percent)
    }

    /// Records a break at a cell. Returns false if the cell has no target
    /// block or is already counted. Cells without a target are picked up as
    /// air by the next scan or reset instead.
    pub fn record_break(&mut self, key: TargetBlockKey) -> bool {
        let Some(target) = self.targets.get_mut_by_key(&key) else {
            return false;
        };
        if target.is_air_broken() {
            return false;
        }
        target.set_air_broken();
        if let Some(i) = target.spec() {
            self.palette[i].record_mined();
        }
        self.state.break_count += 1;
        self.state.air_count += 1;
        true
    }

    /// True if breaks have not been persisted yet.
    #[must_use]
    pub fn has_unsaved_counts(&self) -> bool {
        self.palette.iter().any(|s| s.counters.unsaved > 0)
    }

    /// Clears the unsaved markers after a successful save.
    pub fn mark_counts_saved(&mut self) {
        for spec in &mut self.palette {
            spec.counters.unsaved = 0;
        }
    }

    /// Snapshot for persistence.
    #[must_use]
    pub fn counts(&self) -> MineCounts {
        MineCounts {
            name: self.name.clone(),
            reset_count: self.state.reset_count,
            blocks_mined: self
                .palette
                .iter()
                .map(|s| (s.block.to_string(), s.counters.mined_total))
                .collect(),
        }
    }

    /// Restores persisted counts. Unknown block names are ignored.
    pub fn restore_counts(&mut self, counts: &MineCounts) {
        self.state.reset_count = counts.reset_count;
        for spec in &mut self.palette {
            if let Some(total) = counts.blocks_mined.get(spec.block.as_str()) {
                spec.counters.mined_total = *total;
            }
        }
    }

    // ------------------------------------------------------------------
    // Reset heuristics
    // ------------------------------------------------------------------

    /// Decides whether a requested refresh should reset the mine.
    ///
    /// With skip-reset off this always resets. Otherwise a pristine mine is
    /// skipped, and a mine above the threshold is bypassed until the bypass
    /// counter reaches its limit; that evaluation resets and zeroes it.
    pub fn evaluate_skip_reset(&mut self) -> SkipDecision {
        if !self.skip_reset.enabled {
            return SkipDecision::Reset;
        }
        if self.state.air_count_original == self.state.air_count {
            return SkipDecision::Pristine;
        }
        if self.percent_remaining() > self.skip_reset.threshold_percent {
            if self.state.bypass_count >= self.skip_reset.bypass_limit {
                self.state.bypass_count = 0;
                return SkipDecision::Reset;
            }
            self.state.bypass_count += 1;
            return SkipDecision::Bypassed(self.state.bypass_count);
        }
        SkipDecision::Reset
    }

    /// Moves one edge of the region. The old block list no longer matches
    /// and is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MineError::InvalidBounds`] if the region collapses.
    pub fn resize(&mut self, edge: Edge, amount: i32) -> MineResult<()> {
        self.bounds = self.bounds.resized(edge, amount)?;
        self.targets.clear();
        self.state.break_count = 0;
        self.state.air_count = 0;
        self.state.air_count_original = 0;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::TargetBlock;

    fn mine_10() -> Mine {
        let mut def = MineDefinition::new("a", "world", [0, 0, 0], [9, 9, 9])
            .with_block(BlockSpec::new("STONE", 100.0));
        def.skip_reset = SkipResetConfig {
            enabled: true,
            threshold_percent: 10.0,
            bypass_limit: 3,
        };
        def.commands = vec![
            "before: say one".to_string(),
            "after: say two".to_string(),
            "before: say three".to_string(),
        ];
        Mine::from_definition(&def).unwrap()
    }

    fn push_stone(mine: &mut Mine, key: TargetBlockKey) {
        mine.targets_mut()
            .push(TargetBlock::new(key, BlockType::new("STONE"), Some(0), true));
    }

    #[test]
    fn test_remaining_is_total_minus_breaks() {
        let mut mine = mine_10();
        assert_eq!(mine.remaining_block_count(), 1000);
        push_stone(&mut mine, TargetBlockKey::new(1, 1, 1));
        push_stone(&mut mine, TargetBlockKey::new(2, 1, 1));
        assert!(mine.record_break(TargetBlockKey::new(1, 1, 1)));
        assert!(mine.record_break(TargetBlockKey::new(2, 1, 1)));
        assert!(!mine.record_break(TargetBlockKey::new(20, 1, 1)));
        assert_eq!(mine.remaining_block_count(), 998);
        assert!((mine.percent_remaining() - 99.8).abs() < 1e-9);
    }

    #[test]
    fn test_break_on_target_counts_once() {
        let mut mine = mine_10();
        let key = TargetBlockKey::new(0, 9, 0);
        push_stone(&mut mine, key);

        assert!(mine.record_break(key));
        assert!(!mine.record_break(key));
        assert_eq!(mine.state().break_count, 1);
        assert_eq!(mine.palette()[0].counters.mined, 1);
        assert!(mine.has_unsaved_counts());

        let counts = mine.counts();
        assert_eq!(counts.blocks_mined.get("STONE"), Some(&1));
        mine.mark_counts_saved();
        assert!(!mine.has_unsaved_counts());
    }

    #[test]
    fn test_untracked_cells_are_not_counted() {
        let mut mine = mine_10();
        let key = TargetBlockKey::new(3, 3, 3);

        // No scan has run yet, repeated breaks leave the counts alone
        assert!(!mine.record_break(key));
        assert!(!mine.record_break(key));
        assert_eq!(mine.state().break_count, 0);
        assert_eq!(mine.remaining_block_count(), 1000);

        push_stone(&mut mine, key);
        assert!(mine.record_break(key));
        assert_eq!(mine.remaining_block_count(), 999);
    }

    #[test]
    fn test_skip_reset_bypass_limit() {
        let mut mine = mine_10();
        // 15% remaining, air count moved since generation
        mine.state_mut().break_count = 850;
        mine.state_mut().air_count = 850;

        assert_eq!(mine.evaluate_skip_reset(), SkipDecision::Bypassed(1));
        assert_eq!(mine.evaluate_skip_reset(), SkipDecision::Bypassed(2));
        assert_eq!(mine.evaluate_skip_reset(), SkipDecision::Bypassed(3));
        assert_eq!(mine.state().bypass_count, 3);
        assert_eq!(mine.evaluate_skip_reset(), SkipDecision::Reset);
        assert_eq!(mine.state().bypass_count, 0);
    }

    #[test]
    fn test_pristine_mine_is_skipped() {
        let mut mine = mine_10();
        assert_eq!(mine.evaluate_skip_reset(), SkipDecision::Pristine);
        assert_eq!(mine.state().bypass_count, 0);
    }

    #[test]
    fn test_below_threshold_resets() {
        let mut mine = mine_10();
        mine.state_mut().break_count = 950;
        mine.state_mut().air_count = 950;
        assert_eq!(mine.evaluate_skip_reset(), SkipDecision::Reset);
    }

    #[test]
    fn test_depletion_threshold() {
        let mut def = MineDefinition::new("b", "world", [0, 0, 0], [9, 0, 9]);
        def.reset_threshold_percent = 20.0;
        let mut mine = Mine::from_definition(&def).unwrap();
        mine.state_mut().break_count = 79;
        assert!(!mine.is_depleted());
        mine.state_mut().break_count = 80;
        assert!(mine.is_depleted());
    }

    #[test]
    fn test_command_prefixes() {
        let mine = mine_10();
        let before: Vec<&str> = mine.commands_with_prefix(BEFORE_PREFIX).collect();
        let after: Vec<&str> = mine.commands_with_prefix(AFTER_PREFIX).collect();
        assert_eq!(before, vec!["say one", "say three"]);
        assert_eq!(after, vec!["say two"]);
    }

    #[test]
    fn test_restore_counts() {
        let mut mine = mine_10();
        let mut counts = MineCounts {
            name: "a".to_string(),
            reset_count: 7,
            ..MineCounts::default()
        };
        counts.blocks_mined.insert("STONE".to_string(), 42);
        counts.blocks_mined.insert("SAND".to_string(), 3);
        mine.restore_counts(&counts);
        assert_eq!(mine.state().reset_count, 7);
        assert_eq!(mine.palette()[0].counters.mined_total, 42);
    }

    #[test]
    fn test_resize_drops_block_list() {
        let mut mine = mine_10();
        mine.targets_mut().push(TargetBlock::new(
            TargetBlockKey::new(0, 0, 0),
            BlockType::new("STONE"),
            Some(0),
            true,
        ));
        mine.resize(Edge::Top, 5).unwrap();
        assert_eq!(mine.total_cells(), 1500);
        assert!(mine.targets().is_empty());
        assert!(mine.resize(Edge::Top, -20).is_err());
    }
}
