//! # Prison Runtime
//!
//! The reset engine wired to the reference host.
//!
//! ```text
//! Tick N:
//! ┌──────────────────────────────────────────────────────────────┐
//! │ 1. WORLD CONTEXT                                             │
//! │    └─ Run due scheduler tasks (pages, sweeps, cleanups)      │
//! │                                                              │
//! │ 2. TIMERS                                                    │
//! │    └─ Refresh mines whose reset timer elapsed                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Generation runs on the host's worker pool and hands its result back to
//! the world context, so a tick never waits for it.

use std::sync::{Arc, Weak};
use std::time::Duration;

use prison_mines::{
    BlockType, Clock, MineError, MineResetOrchestrator, MineResult, MinesConfig, RefreshOutcome,
    ResetActions, ResetJob, ResetOutcome, Scheduler, WorldAdapter,
};
use prison_world::HostParts;
use tracing::{debug, info, warn};

use crate::console::{ConsoleCommand, COMMAND_NAME};

/// What one tick did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// World-context tasks run.
    pub tasks_run: usize,
    /// Mines whose timer was evaluated.
    pub timed: Vec<String>,
}

/// Engine plus host.
pub struct PrisonRuntime {
    host: HostParts,
    engine: Arc<MineResetOrchestrator>,
    tick: u64,
}

impl PrisonRuntime {
    /// Loads every world a mine lives in, registers the mines and the
    /// `mines` console command.
    ///
    /// # Errors
    ///
    /// Returns configuration or registration failures.
    pub fn new(host: HostParts, config: &MinesConfig) -> MineResult<Self> {
        for def in &config.mines {
            if !def.is_virtual && host.worlds.world(&def.world).is_none() {
                host.worlds.load_world(&def.world);
                debug!(world = %def.world, "world loaded for mine {}", def.name);
            }
        }

        let engine = MineResetOrchestrator::from_config(host.context(config.engine.clone()), config)?;
        register_console(&host, Arc::downgrade(&engine));
        info!(mines = config.mines.len(), "prison runtime ready");

        Ok(Self { host, engine, tick: 0 })
    }

    /// Host components.
    #[must_use]
    pub const fn host(&self) -> &HostParts {
        &self.host
    }

    /// The reset engine.
    #[must_use]
    pub const fn engine(&self) -> &Arc<MineResetOrchestrator> {
        &self.engine
    }

    /// Ticks run so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.tick
    }

    /// Schedules the startup air-count scan of every mine.
    pub fn start(&self) {
        self.engine.submit_startup_refresh_all();
    }

    /// Runs one tick.
    pub fn tick(&mut self) -> TickReport {
        self.tick += 1;
        let tasks_run = self.host.scheduler.tick();
        let timed = self.engine.poll_timers(Clock::now_ms(self.host.clock.as_ref()));
        TickReport {
            tick: self.tick,
            tasks_run,
            timed,
        }
    }

    /// Ticks until no work is queued or in flight, at most `max_ticks`.
    /// Returns the ticks run.
    pub fn run_until_idle(&mut self, max_ticks: u64) -> u64 {
        let mut ran = 0;
        while ran < max_ticks {
            self.tick();
            ran += 1;
            if self.host.scheduler.pending() == 0 && self.host.scheduler.in_flight() == 0 {
                break;
            }
            if self.host.scheduler.pending() == 0 {
                // Only workers are busy
                std::thread::sleep(Duration::from_millis(1));
            }
        }
        ran
    }

    /// A player broke the block at a cell. The cell becomes air and the
    /// mine containing it, if any, counts the break. Returns that mine.
    ///
    /// # Errors
    ///
    /// Returns a world error if the cell cannot be written.
    pub fn break_block(&self, world: &str, x: i32, y: i32, z: i32) -> MineResult<Option<String>> {
        self.host.worlds.set_cell(world, x, y, z, &BlockType::air())?;

        let Some(name) = self.mine_at(world, x, y, z) else {
            return Ok(None);
        };
        self.engine.record_block_break(&name, x, y, z)?;
        Ok(Some(name))
    }

    /// The non-virtual mine containing a cell.
    #[must_use]
    pub fn mine_at(&self, world: &str, x: i32, y: i32, z: i32) -> Option<String> {
        self.engine.mine_names().into_iter().find(|name| {
            self.engine.mine(name).is_ok_and(|handle| {
                let mine = handle.lock();
                !mine.is_virtual() && mine.bounds().world() == world && mine.bounds().contains(x, y, z)
            })
        })
    }

    /// Parses and runs one console line.
    ///
    /// # Errors
    ///
    /// Returns parse errors and engine errors.
    pub fn execute_line(&self, line: &str) -> MineResult<String> {
        execute(&self.engine, &ConsoleCommand::parse(line)?)
    }

    /// Runs a parsed console command and returns its reply.
    ///
    /// # Errors
    ///
    /// Returns engine errors such as an unknown mine.
    pub fn execute(&self, command: &ConsoleCommand) -> MineResult<String> {
        execute(&self.engine, command)
    }

    /// Saves every mine's counts.
    pub fn shutdown(&self) {
        self.engine.save_all();
        info!(ticks = self.tick, "prison runtime stopped, counts saved");
    }
}

/// Registers `mines` with the host dispatcher so mine hooks can run it.
///
/// Hooks run while their mine is locked, so the command is parsed at once
/// but executed on the next tick. The handler holds the engine weakly; the
/// engine owns the dispatcher.
fn register_console(host: &HostParts, engine: Weak<MineResetOrchestrator>) {
    let scheduler = Arc::clone(&host.scheduler);
    host.commands.register(
        COMMAND_NAME,
        Arc::new(move |args: &[&str]| {
            let command = ConsoleCommand::from_args(args).map_err(|reason| MineError::CommandFailed {
                command: format!("{COMMAND_NAME} {}", args.join(" ")),
                reason,
            })?;
            let engine = engine.clone();
            scheduler.run_on_world_context(Box::new(move || {
                let Some(engine) = engine.upgrade() else {
                    return;
                };
                match execute(&engine, &command) {
                    Ok(reply) => info!(target: "console", "{reply}"),
                    Err(e) => warn!(target: "console", ?command, error = %e, "console command failed"),
                }
            }));
            Ok(())
        }),
    );
}

fn execute(engine: &Arc<MineResetOrchestrator>, command: &ConsoleCommand) -> MineResult<String> {
    match command {
        ConsoleCommand::List => Ok(engine.mine_names().join(", ")),
        ConsoleCommand::Reset { mine, no_commands } => {
            let mut job = ResetJob::normal().with(ResetActions::DETAILS);
            if *no_commands {
                job = job.with(ResetActions::NO_COMMANDS);
            }
            Ok(describe_outcome(mine, engine.reset_mine(mine, job)?))
        }
        ConsoleCommand::ResetAll => {
            engine.reset_all_mines(ResetJob::normal());
            Ok(format!(
                "Chained reset started, {} mines waiting.",
                engine.chained_pending()
            ))
        }
        ConsoleCommand::Refresh { mine } => Ok(match engine.refresh_mine(mine)? {
            RefreshOutcome::Skipped(decision) => format!("Mine {mine} not reset: {decision:?}."),
            RefreshOutcome::Reset(outcome) => describe_outcome(mine, outcome),
        }),
        ConsoleCommand::Clear { mine } => Ok(describe_outcome(mine, engine.clear_mine(mine)?)),
        ConsoleCommand::Sweep { mine } => {
            let handle = engine.mine(mine)?;
            Ok(match engine.run_sweeper(&handle) {
                Some(report) => format!(
                    "Swept {mine}: {} checked, {} newly empty, {} ms.",
                    report.checked, report.detected, report.elapsed_ms
                ),
                None => format!("Mine {mine} is resetting, sweep skipped."),
            })
        }
        ConsoleCommand::Stats { mine } => engine.stats_message(mine),
        ConsoleCommand::Resize { mine, edge, amount } => {
            engine.resize_mine(mine, *edge, *amount)?;
            Ok(format!("Mine {mine} resized, rescanning."))
        }
        ConsoleCommand::Save => {
            engine.save_all();
            Ok("Mine counts saved.".to_string())
        }
    }
}

fn describe_outcome(mine: &str, outcome: ResetOutcome) -> String {
    match outcome {
        ResetOutcome::Started => format!("Mine {mine} is resetting."),
        ResetOutcome::Skipped => {
            warn!(mine = %mine, "reset request ignored");
            format!("Mine {mine} cannot be reset.")
        }
        ResetOutcome::Cancelled => format!("Reset of {mine} was cancelled."),
    }
}
