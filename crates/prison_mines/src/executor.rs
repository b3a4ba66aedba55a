//! # Paged Reset Executor
//!
//! Applies a generated block list to the world in time-boxed pages.
//!
//! ## Design
//!
//! A page starts at the mine's cursor and writes cells in scan order. Every
//! `check_interval_blocks` cells the clock is read; once the page has run
//! longer than `max_page_elapsed_ms` it stops and leaves the cursor at the
//! next unapplied cell. The caller resubmits the next page after
//! `submit_delay_ticks`, so the host keeps ticking between pages.
//!
//! Pages never reorder or reapply cells. A failed write leaves the cursor on
//! the failing cell; earlier cells stay applied.

use tracing::trace;

use crate::adapter::{Clock, WorldAdapter};
use crate::config::ResetPagingConfig;
use crate::error::MineResult;
use crate::job::ResetPhase;
use crate::mine::Mine;

/// Result of one page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageOutcome {
    /// Budget ran out; more pages follow.
    Continue {
        /// Cells written by this page.
        applied: usize,
    },
    /// Cursor reached the end of the list.
    Complete {
        /// Cells written by this page.
        applied: usize,
    },
}

impl PageOutcome {
    /// Cells written by this page.
    #[must_use]
    pub const fn applied(self) -> usize {
        match self {
            Self::Continue { applied } | Self::Complete { applied } => applied,
        }
    }

    /// True once the whole list is applied.
    #[must_use]
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

/// Moves a mine from `Armed` to `Paging`: cursor to zero and the break
/// counter to the planned air count, since air cells count as broken.
pub fn begin_paging(mine: &mut Mine) {
    let state = mine.state_mut();
    state.phase = ResetPhase::Paging;
    state.page = 0;
    state.position = 0;
    state.break_count = state.air_count_original;
}

/// Applies one page starting at the mine's cursor.
///
/// Cells planned as `IGNORE` are skipped without a write.
///
/// # Errors
///
/// Returns the first world write error. The cursor is left on the failing
/// cell.
pub fn apply_one_page(
    mine: &mut Mine,
    world: &dyn WorldAdapter,
    clock: &dyn Clock,
    paging: &ResetPagingConfig,
) -> MineResult<PageOutcome> {
    let start = clock.now_ms();
    let check_interval = paging.check_interval_blocks.max(1);
    let world_name = mine.bounds().world().to_string();

    let mut position = mine.state().position;
    let mut applied = 0usize;
    let mut failure = None;

    for target in mine.targets().tail(position) {
        if !target.block().is_ignore() {
            let key = target.key();
            if let Err(e) = world.set_cell(&world_name, key.x, key.y, key.z, target.block()) {
                failure = Some(e);
                break;
            }
        }
        position += 1;
        applied += 1;

        if applied % check_interval == 0
            && clock.now_ms().saturating_sub(start) > paging.max_page_elapsed_ms
        {
            break;
        }
    }

    let elapsed = clock.now_ms().saturating_sub(start);
    let len = mine.targets().len();
    let state = mine.state_mut();
    state.position = position;
    state.page += 1;
    state.stats.record_page(applied as u64, elapsed);

    if let Some(e) = failure {
        return Err(e);
    }

    trace!(
        mine = %mine.name(),
        page = mine.state().page,
        applied,
        position,
        len,
        elapsed,
        "reset page applied"
    );

    Ok(if position >= len {
        PageOutcome::Complete { applied }
    } else {
        PageOutcome::Continue { applied }
    })
}

// ============================================================================
// TESTS
// ============================================================================
