//! # Reset Statistics
//!
//! Timing and paging counters for the last reset cycle plus a bounded
//! history of sweeper runs.

use std::collections::VecDeque;
use std::fmt::Write as _;

/// Sweeper samples kept per mine.
pub const SWEEPER_HISTORY: usize = 10;

/// Statistics for one mine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResetStats {
    /// Wall time of the whole cycle.
    pub reset_time_ms: u64,
    /// Time spent building the block list.
    pub generation_time_ms: u64,
    /// Time spent applying pages.
    pub block_update_time_ms: u64,
    /// Pages applied.
    pub pages: u32,
    /// Cells applied across all pages.
    pub page_blocks: u64,
    /// Milliseconds spent across all pages.
    pub page_ms: u64,
    sweeper_samples: VecDeque<u64>,
    /// Lifetime sweeper milliseconds.
    pub sweeper_total_ms: u64,
    /// Lifetime sweeper runs.
    pub sweeper_count: u64,
    /// Lifetime cells reconciled by the sweeper.
    pub sweeper_blocks_changed: u64,
}

impl ResetStats {
    /// Zeroes the cycle counters and the sweeper history. Lifetime sweeper
    /// totals survive.
    pub fn reset(&mut self) {
        self.reset_time_ms = 0;
        self.generation_time_ms = 0;
        self.block_update_time_ms = 0;
        self.pages = 0;
        self.page_blocks = 0;
        self.page_ms = 0;
        self.sweeper_samples.clear();
    }

    /// Records one applied page.
    pub fn record_page(&mut self, blocks: u64, elapsed_ms: u64) {
        self.pages += 1;
        self.page_blocks += blocks;
        self.page_ms += elapsed_ms;
        self.block_update_time_ms += elapsed_ms;
    }

    /// Records one sweeper run. Only the last [`SWEEPER_HISTORY`] durations
    /// are kept.
    pub fn record_sweep(&mut self, elapsed_ms: u64, blocks_changed: u64) {
        if self.sweeper_samples.len() == SWEEPER_HISTORY {
            self.sweeper_samples.pop_front();
        }
        self.sweeper_samples.push_back(elapsed_ms);
        self.sweeper_total_ms += elapsed_ms;
        self.sweeper_count += 1;
        self.sweeper_blocks_changed += blocks_changed;
    }

    /// Recent sweeper durations, oldest first.
    pub fn sweeper_samples(&self) -> impl Iterator<Item = u64> + '_ {
        self.sweeper_samples.iter().copied()
    }

    /// Average cells per page.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_blocks_per_page(&self) -> f64 {
        if self.pages == 0 {
            0.0
        } else {
            self.page_blocks as f64 / f64::from(self.pages)
        }
    }

    /// Average milliseconds per page.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_ms_per_page(&self) -> f64 {
        if self.pages == 0 {
            0.0
        } else {
            self.page_ms as f64 / f64::from(self.pages)
        }
    }

    /// One line summary for the reset log.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn message(&self) -> String {
        let mut out = String::with_capacity(160);
        let _ = write!(
            out,
            "ResetTime: {:.3} s  BlockGenTime: {:.3} s  BlockUpdateTime: {:.3} s  \
             ResetPages: {}  avgBlocksPerPage: {:.3}  avgMsPerPage: {:.3}",
            self.reset_time_ms as f64 / 1000.0,
            self.generation_time_ms as f64 / 1000.0,
            self.block_update_time_ms as f64 / 1000.0,
            self.pages,
            self.avg_blocks_per_page(),
            self.avg_ms_per_page(),
        );

        if !self.sweeper_samples.is_empty() {
            out.push_str("  MineSweeper ms:");
            for ms in &self.sweeper_samples {
                let _ = write!(out, " {ms}");
            }
        }
        out
    }
}

// ============================================================================
// TESTS
// ============================================================================
