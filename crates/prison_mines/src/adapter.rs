//! # Host Adapters
//!
//! Capability traits the engine uses to reach the host: world cells,
//! players, the tick scheduler, command dispatch, the event bus,
//! persistence and the clock. They are collected in a [`MineContext`] that
//! the orchestrator is built with.
//!
//! World and player methods must only be called on the world-mutation
//! context.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::block::BlockType;
use crate::bounds::{Bounds, Location};
use crate::config::EngineSettings;
use crate::error::MineResult;
use crate::job::ResetJob;
use crate::mine::MineCounts;

/// Work handed to the scheduler.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Identifier of an online player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u64);

/// Contents of one world cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellState {
    /// Block in the cell.
    pub block: BlockType,
}

impl CellState {
    /// True for air.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.block.is_air()
    }
}

/// Voxel access.
pub trait WorldAdapter: Send + Sync {
    /// True if the world exists and is loaded.
    fn is_world_loaded(&self, world: &str) -> bool;

    /// Reads one cell.
    ///
    /// # Errors
    ///
    /// Fails for unloaded worlds or regions the host refuses to touch.
    fn resolve_cell(&self, world: &str, x: i32, y: i32, z: i32) -> MineResult<CellState>;

    /// Writes one cell.
    ///
    /// # Errors
    ///
    /// Fails for unloaded worlds or regions the host refuses to touch.
    fn set_cell(&self, world: &str, x: i32, y: i32, z: i32, block: &BlockType) -> MineResult<()>;

    /// True if the cell holds air.
    ///
    /// # Errors
    ///
    /// Same as [`WorldAdapter::resolve_cell`].
    fn is_cell_empty(&self, world: &str, x: i32, y: i32, z: i32) -> MineResult<bool> {
        Ok(self.resolve_cell(world, x, y, z)?.is_empty())
    }
}

/// Player access.
pub trait PlayerAdapter: Send + Sync {
    /// Players inside the mine column, including anyone standing on top.
    fn players_in_region(&self, bounds: &Bounds) -> Vec<PlayerId>;

    /// Players in `center`'s world within `radius` blocks of it.
    fn players_within_radius(&self, center: &Location, radius: f64) -> Vec<PlayerId>;

    /// Moves a player to a location.
    ///
    /// # Errors
    ///
    /// Fails if the player is gone or the destination is unusable.
    fn teleport_out(&self, player: PlayerId, destination: &Location) -> MineResult<()>;

    /// Moves a player to a named host destination and returns where they
    /// ended up.
    ///
    /// # Errors
    ///
    /// Fails if the player is gone or the name is unknown.
    fn teleport_named(&self, player: PlayerId, destination: &str) -> MineResult<Location>;

    /// Sends a chat message.
    fn send_message(&self, player: PlayerId, message: &str);
}

/// Host tick scheduler.
pub trait Scheduler: Send + Sync {
    /// Runs a task on the world-mutation context as soon as possible.
    fn run_on_world_context(&self, task: Task);

    /// Runs a task on the world-mutation context after `delay_ticks`.
    fn run_on_world_context_later(&self, task: Task, delay_ticks: u64);

    /// Runs a task on a worker. It must not touch the world.
    fn run_off_context(&self, task: Task);
}

/// Host command dispatch.
pub trait CommandAdapter: Send + Sync {
    /// Runs one command line as the console.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MineError::CommandFailed`] if the host rejects it.
    fn run_host_command(&self, command: &str) -> MineResult<()>;
}

/// The cancellable event raised once per reset cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MineResetEvent {
    mine: String,
    job: ResetJob,
    cancelled: bool,
}

impl MineResetEvent {
    /// Creates an uncancelled event.
    #[must_use]
    pub fn new(mine: impl Into<String>, job: ResetJob) -> Self {
        Self {
            mine: mine.into(),
            job,
            cancelled: false,
        }
    }

    /// Mine about to reset.
    #[must_use]
    pub fn mine(&self) -> &str {
        &self.mine
    }

    /// Requested job.
    #[must_use]
    pub const fn job(&self) -> ResetJob {
        self.job
    }

    /// Stops the reset.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// True if a listener cancelled the reset.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Host event bus.
pub trait ResetEventBus: Send + Sync {
    /// Delivers the event to every listener. Returns true if cancelled.
    fn post_cancellable(&self, event: &mut MineResetEvent) -> bool;
}

/// Storage for mine counts.
pub trait MinePersistence: Send + Sync {
    /// Saves a mine's counts.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MineError::Persistence`] or an I/O error.
    fn save_mine(&self, counts: &MineCounts) -> MineResult<()>;

    /// Loads a mine's counts, `None` if never saved.
    ///
    /// # Errors
    ///
    /// Returns an error if stored data exists but cannot be read.
    fn load_mine(&self, name: &str) -> MineResult<Option<MineCounts>>;
}

/// Millisecond clock.
pub trait Clock: Send + Sync {
    /// Milliseconds since an arbitrary fixed point.
    fn now_ms(&self) -> u64;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

/// Everything the orchestrator needs from the host.
#[derive(Clone)]
pub struct MineContext {
    /// Voxel access.
    pub world: Arc<dyn WorldAdapter>,
    /// Player access.
    pub players: Arc<dyn PlayerAdapter>,
    /// Tick scheduler.
    pub scheduler: Arc<dyn Scheduler>,
    /// Command dispatch.
    pub commands: Arc<dyn CommandAdapter>,
    /// Event bus.
    pub events: Arc<dyn ResetEventBus>,
    /// Count storage.
    pub persistence: Arc<dyn MinePersistence>,
    /// Clock.
    pub clock: Arc<dyn Clock>,
    /// Engine settings snapshot.
    pub settings: EngineSettings,
}
