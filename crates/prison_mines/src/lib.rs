//! # Prison Mines
//!
//! The mine reset engine: regenerates a cuboid of blocks from a weighted
//! palette and writes it back to the world without stalling the host's
//! tick loop.
//!
//! ## Design Principles
//!
//! 1. **Off-context generation**: Block lists are built on a worker and
//!    never touch the world
//! 2. **Paged application**: Writes run on the world-mutation context in
//!    time-boxed pages, resubmitted between ticks
//! 3. **Counted, not scanned**: Remaining blocks are `total - breaks`; the
//!    mine sweeper catches breaks the host never reported
//! 4. **Host agnostic**: The host is reached only through the traits in
//!    [`adapter`]
//!
//! ## Core Components
//!
//! - `Bounds`: Normalized cuboid region with edge detection
//! - `BlockSpec` / `select_block`: Weighted palette with banded and
//!   min/max constraints
//! - `build_block_list`: Top-down block list generation
//! - `apply_one_page`: Time-boxed application of a block list
//! - `sweep`: Detection of unreported breaks
//! - `MineResetOrchestrator`: The reset cycle state machine
//!
//! ## Example
//!
//! ```rust,ignore
//! use prison_mines::{MineResetOrchestrator, MinesConfig, ResetJob};
//!
//! let config = MinesConfig::from_file("config/mines.toml")?;
//! let engine = MineResetOrchestrator::from_config(context, &config)?;
//!
//! // From the host's tick loop
//! engine.reset_mine("a", ResetJob::normal())?;
//! engine.poll_timers(clock.now_ms());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod adapter;
pub mod block;
pub mod bounds;
pub mod config;
pub mod error;
pub mod executor;
pub mod generator;
pub mod job;
pub mod mine;
pub mod orchestrator;
pub mod scan;
pub mod selector;
pub mod stats;
pub mod sweeper;
pub mod target;

#[cfg(test)]
mod testing;

pub use adapter::{
    CellState, Clock, CommandAdapter, MineContext, MinePersistence, MineResetEvent, PlayerAdapter,
    PlayerId, ResetEventBus, Scheduler, SystemClock, Task, WorldAdapter,
};
pub use block::{BlockCounters, BlockSpec, BlockType, Palette};
pub use bounds::{Bounds, Edge, Location};
pub use config::{EngineSettings, MineDefinition, MinesConfig, ResetPagingConfig, SkipResetConfig};
pub use error::{MineError, MineResult};
pub use executor::{apply_one_page, begin_paging, PageOutcome};
pub use generator::{build_block_list, generate, BlockList, GenerateOutcome};
pub use job::{ResetActions, ResetJob, ResetPhase, ResetStage, ResetType};
pub use mine::{Mine, MineCounts, MineHandle, MineResetState, SkipDecision};
pub use orchestrator::{MineResetOrchestrator, RefreshOutcome, ResetOutcome};
pub use scan::{refresh_air_count, ScanReport};
pub use selector::{select_block, Selection};
pub use stats::ResetStats;
pub use sweeper::{sweep, sweeper_delay_ticks, SweepReport};
pub use target::{TargetBlock, TargetBlockKey, TargetBlockRegistry};
