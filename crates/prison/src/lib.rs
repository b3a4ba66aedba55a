//! # Prison
//!
//! The mine reset engine running on the reference host.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                        PRISON SERVER                           │
//! ├────────────────────────────────────────────────────────────────┤
//! │                                                                │
//! │  ┌──────────────────┐   MineContext   ┌──────────────────────┐ │
//! │  │  prison_mines    │<────────────────│  prison_world        │ │
//! │  │                  │                 │                      │ │
//! │  │  • Generator     │                 │  • Voxel worlds      │ │
//! │  │  • Pager         │────────────────>│  • Tick scheduler    │ │
//! │  │  • Sweeper       │  adapter calls  │  • Players / warps   │ │
//! │  │  • Orchestrator  │                 │  • Commands / events │ │
//! │  └──────────────────┘                 └──────────────────────┘ │
//! │              ^                                                 │
//! │              │  tick(), break_block(), console                 │
//! │       ┌──────┴───────┐                                         │
//! │       │ PrisonRuntime│                                         │
//! │       └──────────────┘                                         │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `runtime`: Wiring, tick loop step, block breaks
//! - `console`: The `mines` operator command

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod console;
pub mod runtime;

pub use prison_mines as mines;
pub use prison_world as world;

pub use console::{ConsoleCommand, COMMAND_NAME};
pub use runtime::{PrisonRuntime, TickReport};
