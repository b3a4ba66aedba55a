//! # Mine Sweeper
//!
//! Finds cells that became empty without a counted break (explosions,
//! plugins breaking blocks directly) and adds them to the break counter.
//!
//! Runs on the world context.

use tracing::debug;

use crate::adapter::{Clock, WorldAdapter};
use crate::mine::Mine;
use crate::scan::CellErrorLog;

/// Shortest sweeper delay in seconds, used for a nearly empty mine.
pub const MIN_DELAY_SECS: f64 = 2.0;
/// Added to the delay for a full mine.
pub const DELAY_RANGE_SECS: f64 = 13.0;

/// What one sweep found.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Targets checked.
    pub checked: usize,
    /// Newly detected empty cells.
    pub detected: u64,
    /// Cells that could not be read.
    pub errors: usize,
    /// Time spent.
    pub elapsed_ms: u64,
}

/// Sweeps every target not yet counted as broken.
///
/// Detected cells are flagged, their block's mined count goes up and the
/// total is added to the break counter. The duration goes into the sweeper
/// history and the submitted flag is cleared.
pub fn sweep(mine: &mut Mine, world: &dyn WorldAdapter, clock: &dyn Clock) -> SweepReport {
    let start = clock.now_ms();
    let world_name = mine.bounds().world().to_string();
    let name = mine.name().to_string();

    let mut report = SweepReport::default();
    let mut errors = CellErrorLog::default();
    let mut mined_specs = Vec::new();

    for target in mine.targets_mut().iter_mut() {
        if target.is_air_broken() {
            continue;
        }
        report.checked += 1;

        let key = target.key();
        match world.is_cell_empty(&world_name, key.x, key.y, key.z) {
            Ok(true) => {
                target.set_air_broken();
                if let Some(i) = target.spec() {
                    mined_specs.push(i);
                }
                report.detected += 1;
            }
            Ok(false) => {}
            Err(e) => errors.record(&name, key, &e),
        }
    }

    for i in mined_specs {
        if let Some(spec) = mine.palette_mut().get_mut(i) {
            spec.record_mined();
        }
    }

    report.errors = errors.count();
    report.elapsed_ms = clock.now_ms().saturating_sub(start);
    errors.log_summary(&name, "mine sweeper");

    let state = mine.state_mut();
    state.break_count += report.detected;
    state.air_count += report.detected;
    state.stats.record_sweep(report.elapsed_ms, report.detected);
    state.sweeper_submitted = false;

    debug!(
        mine = %name,
        checked = report.checked,
        detected = report.detected,
        elapsed_ms = report.elapsed_ms,
        "mine sweeper finished"
    );
    report
}

/// Ticks to wait before sweeping: 2 s for an empty mine up to 15 s for a
/// full one, scaled linearly by the fraction remaining.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn sweeper_delay_ticks(total: u64, remaining: u64, ticks_per_second: u64) -> u64 {
    let fraction = if total == 0 {
        0.0
    } else {
        (remaining.min(total) as f64) / (total as f64)
    };
    let secs = MIN_DELAY_SECS + DELAY_RANGE_SECS * fraction;
    (secs * ticks_per_second as f64) as u64
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockSpec;
    use crate::config::MineDefinition;
    use crate::executor::{apply_one_page, begin_paging};
    use crate::generator::generate;
    use crate::job::ResetType;
    use crate::config::ResetPagingConfig;
    use crate::testing::{TestClock, TestWorld};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::sync::Arc;

    fn applied_mine(world: &TestWorld, clock: &TestClock) -> Mine {
        let def = MineDefinition::new("swept", "world", [0, 0, 0], [9, 9, 9])
            .with_block(BlockSpec::new("STONE", 80.0))
            .with_block(BlockSpec::new("COAL_ORE", 20.0));
        let mut mine = Mine::from_definition(&def).unwrap();
        generate(&mut mine, &mut ChaCha8Rng::seed_from_u64(31), ResetType::Normal);
        begin_paging(&mut mine);
        apply_one_page(&mut mine, world, clock, &ResetPagingConfig::default()).unwrap();
        mine
    }

    #[test]
    fn test_sweep_detects_three_then_zero() {
        let clock = Arc::new(TestClock::default());
        let world = TestWorld::new(Arc::clone(&clock));
        let mut mine = applied_mine(&world, &clock);
        let breaks_before = mine.state().break_count;

        let solid: Vec<_> = mine
            .targets()
            .iter()
            .filter(|t| !t.is_air())
            .take(3)
            .map(crate::target::TargetBlock::key)
            .collect();
        for key in &solid {
            world.put(key.x, key.y, key.z, "AIR");
        }

        let first = sweep(&mut mine, &world, clock.as_ref());
        assert_eq!(first.detected, 3);
        assert_eq!(mine.state().break_count, breaks_before + 3);
        for key in &solid {
            assert!(mine.targets().get_by_key(key).unwrap().is_air_broken());
        }
        let mined: u64 = mine.palette().iter().map(|s| s.counters.mined).sum();
        assert_eq!(mined, 3);

        let second = sweep(&mut mine, &world, clock.as_ref());
        assert_eq!(second.detected, 0);
        assert_eq!(mine.state().break_count, breaks_before + 3);
        assert_eq!(mine.state().stats.sweeper_count, 2);
        assert!(!mine.state().sweeper_submitted);
    }

    #[test]
    fn test_remaining_matches_breaks_after_sweeps_and_breaks() {
        let clock = Arc::new(TestClock::default());
        let world = TestWorld::new(Arc::clone(&clock));
        let mut mine = applied_mine(&world, &clock);

        let keys: Vec<_> = mine
            .targets()
            .iter()
            .filter(|t| !t.is_air())
            .take(10)
            .map(crate::target::TargetBlock::key)
            .collect();

        // Half are reported as breaks, all become air, some twice
        for key in &keys[..5] {
            assert!(mine.record_break(*key));
        }
        for key in &keys {
            world.put(key.x, key.y, key.z, "AIR");
        }
        sweep(&mut mine, &world, clock.as_ref());
        assert!(!mine.record_break(keys[7]));
        sweep(&mut mine, &world, clock.as_ref());

        let broken = mine.targets().iter().filter(|t| t.is_air_broken()).count() as u64;
        assert_eq!(mine.state().break_count, broken);
        assert_eq!(mine.remaining_block_count(), mine.total_cells() - mine.state().break_count);
    }

    #[test]
    fn test_delay_scales_with_remaining() {
        assert_eq!(sweeper_delay_ticks(1000, 1000, 20), 300);
        assert_eq!(sweeper_delay_ticks(1000, 0, 20), 40);
        assert_eq!(sweeper_delay_ticks(1000, 500, 20), 170);
        assert_eq!(sweeper_delay_ticks(0, 0, 20), 40);
    }
}
