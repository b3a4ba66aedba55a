//! # Reset Jobs
//!
//! What kind of reset is running, with which behavior flags, and where the
//! cycle currently is.

use std::fmt;
use std::ops::BitOr;

/// Kind of reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResetType {
    /// Regenerate from the palette.
    Normal,
    /// Fill the whole mine with air.
    Clear,
}

/// Behavior flags of a reset job.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ResetActions(u8);

impl ResetActions {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Skip the `before: ` and `after: ` commands.
    pub const NO_COMMANDS: Self = Self(1);
    /// Start the next queued mine when this one finishes.
    pub const CHAINED_RESETS: Self = Self(1 << 1);
    /// Log statistics even when mine stats are off.
    pub const DETAILS: Self = Self(1 << 2);

    /// True if every flag in `other` is set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Both sets of flags.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// True if no flag is set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ResetActions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// A requested reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResetJob {
    /// Kind of reset.
    pub reset_type: ResetType,
    /// Behavior flags.
    pub actions: ResetActions,
}

impl ResetJob {
    /// A plain reset.
    #[must_use]
    pub const fn normal() -> Self {
        Self {
            reset_type: ResetType::Normal,
            actions: ResetActions::NONE,
        }
    }

    /// Fill the mine with air.
    #[must_use]
    pub const fn clear() -> Self {
        Self {
            reset_type: ResetType::Clear,
            actions: ResetActions::NONE,
        }
    }

    /// Adds flags.
    #[must_use]
    pub const fn with(mut self, actions: ResetActions) -> Self {
        self.actions = self.actions.union(actions);
        self
    }

    /// True if the job carries `action`.
    #[inline]
    #[must_use]
    pub const fn has(&self, action: ResetActions) -> bool {
        self.actions.contains(action)
    }
}

impl Default for ResetJob {
    fn default() -> Self {
        Self::normal()
    }
}

/// Executor phase of a mine. A new cycle may only start from `Idle`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ResetPhase {
    /// No cycle running.
    #[default]
    Idle,
    /// Players moved out, commands run, block list being built.
    Armed,
    /// Pages being applied.
    Paging,
    /// Post-apply work.
    Finalizing,
}

/// Step of the orchestrator's reset cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ResetStage {
    /// Reset asked for.
    #[default]
    Requested,
    /// Cancellable event posted.
    PreEventCheck,
    /// Players moved to safety.
    TeleportOut,
    /// `before: ` commands.
    BeforeCommands,
    /// Block list being built off the world context.
    Generate,
    /// Pages being applied.
    Apply,
    /// Second teleport for players who fell back in.
    TeleportOutSafety,
    /// `after: ` commands.
    AfterCommands,
    /// Nearby players notified.
    Broadcast,
    /// Overlay removal scheduled, stats logged.
    Cleanup,
    /// Next queued mine requested.
    ChainNext,
    /// Cycle finished or aborted.
    Done,
}

impl fmt::Display for ResetStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_flags() {
        let job = ResetJob::normal().with(ResetActions::NO_COMMANDS | ResetActions::DETAILS);
        assert!(job.has(ResetActions::NO_COMMANDS));
        assert!(job.has(ResetActions::DETAILS));
        assert!(!job.has(ResetActions::CHAINED_RESETS));
        assert!(ResetJob::clear().actions.is_empty());
        assert_eq!(ResetJob::default(), ResetJob::normal());
    }
}
