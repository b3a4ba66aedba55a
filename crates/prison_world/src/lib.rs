//! # Prison World
//!
//! An in-memory host for the mine reset engine. Implements every adapter
//! trait of `prison_mines` so mines can be reset, mined and swept without
//! a game server.
//!
//! ## Core Components
//!
//! - `WorldRegistry` / `VoxelWorld`: Named worlds of sparse chunks
//! - `TickScheduler`: World-context queue driven by `tick()`, worker pool
//! - `PlayerRegistry`: Positions, inboxes and warps
//! - `CommandDispatcher`: Console commands (`say` built in)
//! - `EventBus`: Cancellable reset event plus observer channel
//! - `TomlMineStore`: Per-mine count files
//! - `ManualClock`: Hand-driven time for tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use prison_world::{HostParts, WorkerMode};
//!
//! let host = HostParts::in_memory(WorkerMode::Inline);
//! host.worlds.load_world("mines");
//! let ctx = host.context(settings);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod clock;
pub mod commands;
pub mod events;
pub mod players;
pub mod scheduler;
pub mod store;
pub mod world;

use std::sync::Arc;

use prison_mines::{Clock, EngineSettings, MineContext, MinePersistence, SystemClock};

pub use clock::ManualClock;
pub use commands::{CommandDispatcher, CommandHandler};
pub use events::{EventBus, ResetListener, ResetNotice};
pub use players::PlayerRegistry;
pub use scheduler::{TickScheduler, WorkerMode};
pub use store::{MemoryMineStore, TomlMineStore};
pub use world::{ChunkCoord, VoxelWorld, WorldRegistry, WorldStats, CHUNK_SIZE};

/// Every host component, shared.
#[derive(Clone)]
pub struct HostParts {
    /// Worlds.
    pub worlds: Arc<WorldRegistry>,
    /// Scheduler.
    pub scheduler: Arc<TickScheduler>,
    /// Players.
    pub players: Arc<PlayerRegistry>,
    /// Commands.
    pub commands: Arc<CommandDispatcher>,
    /// Events.
    pub events: Arc<EventBus>,
    /// Count storage.
    pub persistence: Arc<dyn MinePersistence>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
}

impl HostParts {
    /// A host with in-memory storage and the system clock.
    #[must_use]
    pub fn in_memory(mode: WorkerMode) -> Self {
        Self::with(mode, Arc::new(MemoryMineStore::default()), Arc::new(SystemClock))
    }

    /// A host with the given storage and clock.
    #[must_use]
    pub fn with(mode: WorkerMode, persistence: Arc<dyn MinePersistence>, clock: Arc<dyn Clock>) -> Self {
        Self {
            worlds: Arc::new(WorldRegistry::new()),
            scheduler: Arc::new(TickScheduler::new(mode)),
            players: Arc::new(PlayerRegistry::new()),
            commands: Arc::new(CommandDispatcher::new()),
            events: Arc::new(EventBus::default()),
            persistence,
            clock,
        }
    }

    /// The engine context backed by these parts.
    #[must_use]
    pub fn context(&self, settings: EngineSettings) -> MineContext {
        MineContext {
            world: self.worlds.clone(),
            players: self.players.clone(),
            scheduler: self.scheduler.clone(),
            commands: self.commands.clone(),
            events: self.events.clone(),
            persistence: Arc::clone(&self.persistence),
            clock: Arc::clone(&self.clock),
            settings,
        }
    }
}
