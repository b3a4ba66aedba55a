//! # Air Count Scan
//!
//! Rebuilds a mine's target list from what is actually in the world. Run
//! once on startup so the break counter reflects cells that were mined
//! before the server stopped.
//!
//! Runs on the world context. A failing cell is skipped rather than
//! aborting the pass; see [`CellErrorLog`].

use std::fmt::Write as _;

use tracing::{error, info, warn};

use crate::adapter::{Clock, WorldAdapter};
use crate::block::is_ignore_palette;
use crate::error::MineError;
use crate::mine::Mine;
use crate::target::{TargetBlock, TargetBlockKey};

/// Extra failing coordinates recorded after the first one.
pub const MAX_RECORDED_ERRORS: usize = 20;

/// Per-pass tally of cell errors with bounded detail.
///
/// The first error is logged immediately with its message. Later ones are
/// only counted, and the coordinates of the first [`MAX_RECORDED_ERRORS`]
/// of them are kept for the summary.
#[derive(Debug, Default)]
pub struct CellErrorLog {
    count: usize,
    recorded: Vec<TargetBlockKey>,
}

impl CellErrorLog {
    /// Records one failed cell.
    pub fn record(&mut self, mine: &str, key: TargetBlockKey, err: &MineError) {
        self.count += 1;
        if self.count == 1 {
            error!(
                mine = %mine,
                x = key.x,
                y = key.y,
                z = key.z,
                error = %err,
                "cell access failed, skipping it"
            );
        } else if self.recorded.len() < MAX_RECORDED_ERRORS {
            self.recorded.push(key);
        }
    }

    /// Errors recorded so far.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Coordinates kept for the summary.
    #[must_use]
    pub fn recorded(&self) -> &[TargetBlockKey] {
        &self.recorded
    }

    /// Logs one summary line if more than the first error happened.
    pub fn log_summary(&self, mine: &str, pass: &str) {
        if self.count <= 1 {
            return;
        }
        let mut coords = String::new();
        for key in &self.recorded {
            let _ = write!(coords, " ({}, {}, {})", key.x, key.y, key.z);
        }
        warn!(
            mine = %mine,
            errors = self.count,
            "{pass}: {} cells failed and were skipped, first extra locations:{coords}",
            self.count
        );
    }
}

/// What [`refresh_air_count`] found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanReport {
    /// Cells read successfully.
    pub cells: usize,
    /// Air cells.
    pub air: u64,
    /// Cells that failed.
    pub errors: usize,
    /// Time spent.
    pub elapsed_ms: u64,
}

/// Reads the whole mine, rebuilds the target list from the live cells and
/// sets the air and break counters from it.
///
/// A mine whose palette is only `IGNORE` is not scanned; its counts are
/// zeroed. Virtual, deleted and disabled mines return `None`.
pub fn refresh_air_count(mine: &mut Mine, world: &dyn WorldAdapter, clock: &dyn Clock) -> Option<ScanReport> {
    if mine.is_virtual() || mine.is_deleted() {
        return None;
    }
    if !mine.is_enabled() {
        error!(mine = %mine.name(), "air count failed: mine is not enabled, ensure its world exists");
        return None;
    }

    let start = clock.now_ms();

    if is_ignore_palette(mine.palette()) {
        let state = mine.state_mut();
        state.air_count = 0;
        state.air_count_original = 0;
        state.break_count = 0;
        state.air_count_timestamp_ms = start;
        state.air_count_elapsed_ms = 0;
        return Some(ScanReport {
            cells: 0,
            air: 0,
            errors: 0,
            elapsed_ms: 0,
        });
    }

    let bounds = mine.bounds().clone();
    let name = mine.name().to_string();
    let mut errors = CellErrorLog::default();
    let mut air = 0u64;

    mine.targets_mut().clear();
    for y in (bounds.min_y()..=bounds.max_y()).rev() {
        for x in bounds.min_x()..=bounds.max_x() {
            for z in bounds.min_z()..=bounds.max_z() {
                let key = TargetBlockKey::new(x, y, z);
                match world.resolve_cell(bounds.world(), x, y, z) {
                    Ok(cell) => {
                        if cell.is_empty() {
                            air += 1;
                        }
                        let spec = mine.spec_index(&cell.block);
                        let edge = bounds.is_edge(x, y, z);
                        mine.targets_mut()
                            .push(TargetBlock::new(key, cell.block, spec, edge));
                    }
                    Err(e) => errors.record(&name, key, &e),
                }
            }
        }
    }

    let elapsed_ms = clock.now_ms().saturating_sub(start);
    let cells = mine.targets().len();
    {
        let state = mine.state_mut();
        state.air_count = air;
        state.air_count_original = air;
        state.break_count = air;
        state.air_count_timestamp_ms = start;
        state.air_count_elapsed_ms = elapsed_ms;
    }

    errors.log_summary(&name, "air count");
    info!(mine = %name, cells, air, elapsed_ms, "air count refreshed");

    Some(ScanReport {
        cells,
        air,
        errors: errors.count(),
        elapsed_ms,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockSpec;
    use crate::config::MineDefinition;
    use crate::testing::{TestClock, TestWorld};
    use std::sync::Arc;

    fn mine() -> Mine {
        let def = MineDefinition::new("scan", "world", [0, 0, 0], [4, 4, 4])
            .with_block(BlockSpec::new("STONE", 100.0));
        Mine::from_definition(&def).unwrap()
    }

    fn filled_world() -> (Arc<TestClock>, TestWorld) {
        let clock = Arc::new(TestClock::default());
        let world = TestWorld::new(Arc::clone(&clock));
        for x in 0..5 {
            for y in 0..5 {
                for z in 0..5 {
                    world.put(x, y, z, "STONE");
                }
            }
        }
        (clock, world)
    }

    #[test]
    fn test_counts_mined_cells() {
        let (clock, world) = filled_world();
        world.put(0, 4, 0, "AIR");
        world.put(1, 4, 0, "AIR");
        world.put(2, 2, 2, "DIRT");

        let mut mine = mine();
        let report = refresh_air_count(&mut mine, &world, clock.as_ref()).unwrap();
        assert_eq!(report.cells, 125);
        assert_eq!(report.air, 2);
        assert_eq!(mine.state().break_count, 2);
        assert_eq!(mine.remaining_block_count(), 123);

        let dirt = mine.targets().get_by_key(&TargetBlockKey::new(2, 2, 2)).unwrap();
        assert_eq!(dirt.spec(), None);
        let stone = mine.targets().get_by_key(&TargetBlockKey::new(3, 3, 3)).unwrap();
        assert_eq!(stone.spec(), Some(0));
        assert!(!stone.is_air_broken());
        assert!(mine.targets().get_by_key(&TargetBlockKey::new(0, 4, 0)).unwrap().is_air_broken());
    }

    #[test]
    fn test_failing_cells_are_skipped_and_bounded() {
        let (clock, world) = filled_world();
        for z in 0..5 {
            for x in 0..5 {
                world.fail_at(x, 0, z);
            }
        }
        let mut mine = mine();
        let report = refresh_air_count(&mut mine, &world, clock.as_ref()).unwrap();
        assert_eq!(report.errors, 25);
        assert_eq!(report.cells, 100);

        let mut log = CellErrorLog::default();
        let err = MineError::WorldNotLoaded("world".to_string());
        for i in 0..30 {
            log.record("scan", TargetBlockKey::new(i, 0, 0), &err);
        }
        assert_eq!(log.count(), 30);
        assert_eq!(log.recorded().len(), MAX_RECORDED_ERRORS);
        assert_eq!(log.recorded()[0], TargetBlockKey::new(1, 0, 0));
    }

    #[test]
    fn test_ignore_palette_skips_scan() {
        let (clock, world) = filled_world();
        let def = MineDefinition::new("ignored", "world", [0, 0, 0], [4, 4, 4])
            .with_block(BlockSpec::new("IGNORE", 100.0));
        let mut mine = Mine::from_definition(&def).unwrap();
        mine.state_mut().break_count = 17;
        let report = refresh_air_count(&mut mine, &world, clock.as_ref()).unwrap();
        assert_eq!(report.cells, 0);
        assert_eq!(mine.state().air_count, 0);
        assert_eq!(mine.state().break_count, 0);
    }

    #[test]
    fn test_disabled_mine_is_not_scanned() {
        let (clock, world) = filled_world();
        let mut mine = mine();
        mine.set_enabled(false);
        assert!(refresh_air_count(&mut mine, &world, clock.as_ref()).is_none());
    }
}
