//! # Reset Orchestrator
//!
//! Drives a mine through one reset cycle:
//!
//! ```text
//! Requested -> PreEventCheck -> TeleportOut -> BeforeCommands -> Generate
//!   -> Apply (paged) -> TeleportOutSafety -> AfterCommands -> Broadcast
//!   -> Cleanup -> [ChainNext] -> Done
//! ```
//!
//! Generation runs off the world context. Everything that touches the world
//! or players runs on it, one page per scheduled task.
//!
//! ## Failure Policy
//!
//! Nothing escapes into the host's tick loop. A failure after the pre-event
//! is logged with the mine name, the cycle is aborted and the mine returns
//! to `Idle`. Cells already written stay written.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, error, info, warn};

use crate::adapter::{MineContext, MineResetEvent};
use crate::block::BlockType;
use crate::bounds::Edge;
use crate::config::{MineDefinition, MinesConfig};
use crate::error::{MineError, MineResult};
use crate::executor::{apply_one_page, begin_paging, PageOutcome};
use crate::generator::{build_block_list, install_block_list, prepare_generation, GenerateOutcome};
use crate::job::{ResetActions, ResetJob, ResetPhase, ResetStage};
use crate::mine::{Mine, MineHandle, SkipDecision, AFTER_PREFIX, BEFORE_PREFIX};
use crate::scan::{refresh_air_count, ScanReport};
use crate::sweeper::{sweep, sweeper_delay_ticks, SweepReport};
use crate::target::TargetBlockKey;

/// How a reset request ended at the entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetOutcome {
    /// A cycle is running.
    Started,
    /// Virtual or deleted mine.
    Skipped,
    /// A listener cancelled the pre-event.
    Cancelled,
}

/// Result of a refresh request after the skip-reset heuristic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Heuristic said skip.
    Skipped(SkipDecision),
    /// A reset was requested.
    Reset(ResetOutcome),
}

/// Coordinates reset cycles for every registered mine.
pub struct MineResetOrchestrator {
    ctx: MineContext,
    mines: RwLock<BTreeMap<String, MineHandle>>,
    /// Guards sweeper submission across all mines.
    sweeper_lock: Mutex<()>,
    /// Mines still to reset in the current chained run.
    chain: Mutex<VecDeque<String>>,
    chain_job: Mutex<ResetJob>,
    rng: Mutex<ChaCha8Rng>,
}

impl MineResetOrchestrator {
    /// Creates an orchestrator with no mines.
    #[must_use]
    pub fn new(ctx: MineContext) -> Arc<Self> {
        let rng = match ctx.settings.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Arc::new(Self {
            ctx,
            mines: RwLock::new(BTreeMap::new()),
            sweeper_lock: Mutex::new(()),
            chain: Mutex::new(VecDeque::new()),
            chain_job: Mutex::new(ResetJob::normal()),
            rng: Mutex::new(rng),
        })
    }

    /// Creates an orchestrator and registers every mine in `config`. The
    /// engine settings of `config` replace those in `ctx`.
    ///
    /// # Errors
    ///
    /// Returns the first registration failure.
    pub fn from_config(mut ctx: MineContext, config: &MinesConfig) -> MineResult<Arc<Self>> {
        config.validate()?;
        ctx.settings = config.engine.clone();
        let this = Self::new(ctx);
        for def in &config.mines {
            this.register_mine(def)?;
        }
        Ok(this)
    }

    /// Host context.
    #[must_use]
    pub const fn context(&self) -> &MineContext {
        &self.ctx
    }

    // ========================================================================
    // Registry
    // ========================================================================

    /// Adds a mine. Persisted counts are restored and the mine is enabled
    /// only if its world is loaded.
    ///
    /// # Errors
    ///
    /// Returns a validation error or [`MineError::DuplicateMine`].
    pub fn register_mine(&self, def: &MineDefinition) -> MineResult<MineHandle> {
        let mut mine = Mine::from_definition(def)?;
        mine.set_enabled(self.ctx.world.is_world_loaded(&def.world));
        mine.state_mut().last_reset_ms = self.ctx.clock.now_ms();

        match self.ctx.persistence.load_mine(&def.name) {
            Ok(Some(counts)) => mine.restore_counts(&counts),
            Ok(None) => {}
            Err(e) => warn!(mine = %def.name, error = %e, "could not load saved mine counts"),
        }

        let mut mines = self.mines.write();
        if mines.contains_key(&def.name) {
            return Err(MineError::DuplicateMine(def.name.clone()));
        }
        let handle = mine.into_handle();
        mines.insert(def.name.clone(), Arc::clone(&handle));
        info!(mine = %def.name, enabled = handle.lock().is_enabled(), "mine registered");
        Ok(handle)
    }

    /// Marks a mine deleted and drops it from the registry. A cycle still
    /// running on it stops at its next step.
    ///
    /// # Errors
    ///
    /// Returns [`MineError::UnknownMine`].
    pub fn remove_mine(&self, name: &str) -> MineResult<()> {
        let handle = self
            .mines
            .write()
            .remove(name)
            .ok_or_else(|| MineError::UnknownMine(name.to_string()))?;
        handle.lock().mark_deleted();
        info!(mine = %name, "mine removed");
        Ok(())
    }

    /// Handle of a registered mine.
    ///
    /// # Errors
    ///
    /// Returns [`MineError::UnknownMine`].
    pub fn mine(&self, name: &str) -> MineResult<MineHandle> {
        self.mines
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| MineError::UnknownMine(name.to_string()))
    }

    /// Registered mine names in order.
    #[must_use]
    pub fn mine_names(&self) -> Vec<String> {
        self.mines.read().keys().cloned().collect()
    }

    // ========================================================================
    // Reset cycle
    // ========================================================================

    /// Starts a reset cycle. Call on the world context.
    ///
    /// # Errors
    ///
    /// Returns [`MineError::UnknownMine`], [`MineError::MineDisabled`],
    /// [`MineError::ResetInProgress`], or a teleport failure that aborted
    /// the cycle before generation.
    pub fn reset_mine(self: &Arc<Self>, name: &str, job: ResetJob) -> MineResult<ResetOutcome> {
        let handle = self.mine(name)?;

        {
            let mut mine = handle.lock();
            if mine.is_virtual() || mine.is_deleted() {
                return Ok(ResetOutcome::Skipped);
            }
            let loaded = self.ctx.world.is_world_loaded(mine.bounds().world());
            mine.set_enabled(loaded);
            if !loaded {
                error!(mine = %name, "reset failed: mine is not enabled, ensure its world exists");
                return Err(MineError::MineDisabled(name.to_string()));
            }
            if mine.state().phase != ResetPhase::Idle {
                return Err(MineError::ResetInProgress(name.to_string()));
            }
            mine.state_mut().stage = ResetStage::PreEventCheck;
        }

        let mut event = MineResetEvent::new(name, job);
        if self.ctx.events.post_cancellable(&mut event) {
            handle.lock().state_mut().stage = ResetStage::Done;
            return Ok(ResetOutcome::Cancelled);
        }

        {
            let mut mine = handle.lock();
            // A listener may have started another cycle
            if mine.state().phase != ResetPhase::Idle {
                return Err(MineError::ResetInProgress(name.to_string()));
            }
            let now = self.ctx.clock.now_ms();
            let state = mine.state_mut();
            state.phase = ResetPhase::Armed;
            state.job = Some(job);
            state.cycle_started_ms = now;

            if let Err(e) = self.arm(&mut mine, job) {
                self.abort_cycle(&mut mine, &e);
                return Err(e);
            }
        }

        info!(mine = %name, job = ?job.reset_type, "mine reset started");
        self.submit_generation(handle, job);
        Ok(ResetOutcome::Started)
    }

    /// Runs the skip-reset heuristic and resets if it says so.
    ///
    /// # Errors
    ///
    /// Same as [`Self::reset_mine`].
    pub fn refresh_mine(self: &Arc<Self>, name: &str) -> MineResult<RefreshOutcome> {
        let handle = self.mine(name)?;
        let decision = {
            let mut mine = handle.lock();
            if mine.state().phase != ResetPhase::Idle {
                return Err(MineError::ResetInProgress(name.to_string()));
            }
            mine.evaluate_skip_reset()
        };

        match decision {
            SkipDecision::Reset => Ok(RefreshOutcome::Reset(self.reset_mine(name, ResetJob::normal())?)),
            other => {
                debug!(mine = %name, decision = ?other, "reset skipped");
                Ok(RefreshOutcome::Skipped(other))
            }
        }
    }

    /// Fills a mine with air through a normal cycle.
    ///
    /// # Errors
    ///
    /// Same as [`Self::reset_mine`].
    pub fn clear_mine(self: &Arc<Self>, name: &str) -> MineResult<ResetOutcome> {
        self.reset_mine(name, ResetJob::clear())
    }

    /// Resets every mine one after another, in name order.
    pub fn reset_all_mines(self: &Arc<Self>, job: ResetJob) {
        let names = self.mine_names();
        info!(mines = names.len(), "chained reset of all mines started");
        *self.chain.lock() = names.into();
        *self.chain_job.lock() = job.with(ResetActions::CHAINED_RESETS);
        self.reset_all_mines_next();
    }

    /// Starts the next mine of a chained run. Mines that cannot start are
    /// passed over.
    pub fn reset_all_mines_next(self: &Arc<Self>) {
        let job = *self.chain_job.lock();
        loop {
            let Some(name) = self.chain.lock().pop_front() else {
                debug!("chained reset finished");
                return;
            };
            match self.reset_mine(&name, job) {
                Ok(ResetOutcome::Started) => return,
                Ok(outcome) => debug!(mine = %name, ?outcome, "chained reset passed over mine"),
                Err(e) => warn!(mine = %name, error = %e, "chained reset passed over mine"),
            }
        }
    }

    /// Mines still waiting in a chained run.
    #[must_use]
    pub fn chained_pending(&self) -> usize {
        self.chain.lock().len()
    }

    /// Teleport and `before: ` commands. Runs with the mine locked.
    fn arm(&self, mine: &mut Mine, job: ResetJob) -> MineResult<()> {
        mine.state_mut().stage = ResetStage::TeleportOut;
        self.teleport_all_players_out(mine)?;

        mine.state_mut().stage = ResetStage::BeforeCommands;
        if !job.has(ResetActions::NO_COMMANDS) {
            self.run_commands(mine, BEFORE_PREFIX);
        }
        Ok(())
    }

    fn submit_generation(self: &Arc<Self>, handle: MineHandle, job: ResetJob) {
        let this = Arc::clone(self);
        self.ctx
            .scheduler
            .run_off_context(Box::new(move || this.generate_stage(&handle, job)));
    }

    /// Builds the block list off the world context. The mine is only locked
    /// to read its palette and to install the result.
    fn generate_stage(self: &Arc<Self>, handle: &MineHandle, job: ResetJob) {
        let seed = self.rng.lock().gen::<u64>();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let (bounds, mut palette) = {
            let mut mine = handle.lock();
            mine.state_mut().stage = ResetStage::Generate;
            self.flush_counts(&mut mine);
            if !prepare_generation(&mut mine) {
                self.finish_aborted(&mut mine);
                return;
            }
            (mine.bounds().clone(), mine.palette().to_vec())
        };

        let start = Instant::now();
        let list = build_block_list(&bounds, &mut palette, job.reset_type, &mut rng);
        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        {
            let mut mine = handle.lock();
            if mine.is_deleted() {
                self.finish_aborted(&mut mine);
                return;
            }
            if let GenerateOutcome::Generated { cells, .. } =
                install_block_list(&mut mine, list, &palette, elapsed_ms)
            {
                debug!(mine = %mine.name(), cells, "paging begins");
            }
            mine.state_mut().stage = ResetStage::Apply;
            begin_paging(&mut mine);
        }

        self.submit_page(Arc::clone(handle), 0);
    }

    fn submit_page(self: &Arc<Self>, handle: MineHandle, delay_ticks: u64) {
        let this = Arc::clone(self);
        let task = Box::new(move || this.page_stage(&handle));
        if delay_ticks == 0 {
            self.ctx.scheduler.run_on_world_context(task);
        } else {
            self.ctx.scheduler.run_on_world_context_later(task, delay_ticks);
        }
    }

    /// Applies one page on the world context and schedules what follows.
    fn page_stage(self: &Arc<Self>, handle: &MineHandle) {
        let paging = &self.ctx.settings.paging;
        let outcome = {
            let mut mine = handle.lock();
            if mine.is_deleted() {
                self.finish_aborted(&mut mine);
                return;
            }
            match apply_one_page(&mut mine, self.ctx.world.as_ref(), self.ctx.clock.as_ref(), paging) {
                Ok(PageOutcome::Complete { .. }) => {
                    mine.state_mut().phase = ResetPhase::Finalizing;
                    Ok(true)
                }
                Ok(PageOutcome::Continue { .. }) => Ok(false),
                Err(e) => {
                    self.abort_cycle(&mut mine, &e);
                    Err(e)
                }
            }
        };

        match outcome {
            Ok(false) => self.submit_page(Arc::clone(handle), paging.submit_delay_ticks.max(1)),
            Ok(true) => self.finalize(handle),
            Err(_) => {}
        }
    }

    /// Post-apply steps, then the next chained mine if requested.
    fn finalize(self: &Arc<Self>, handle: &MineHandle) {
        let chain_next = {
            let mut mine = handle.lock();
            match self.finalize_locked(&mut mine) {
                Ok(job) => job.has(ResetActions::CHAINED_RESETS),
                Err(e) => {
                    self.abort_cycle(&mut mine, &e);
                    false
                }
            }
        };

        if chain_next {
            self.reset_all_mines_next();
        }
    }

    fn finalize_locked(&self, mine: &mut Mine) -> MineResult<ResetJob> {
        let job = mine.state().job.unwrap_or_default();

        mine.state_mut().stage = ResetStage::TeleportOutSafety;
        self.teleport_all_players_out(mine)?;

        {
            let state = mine.state_mut();
            state.page = 0;
            state.position = 0;
            state.reset_count += 1;
        }

        mine.state_mut().stage = ResetStage::AfterCommands;
        if !job.has(ResetActions::NO_COMMANDS) {
            self.run_commands(mine, AFTER_PREFIX);
        }

        mine.state_mut().stage = ResetStage::Broadcast;
        self.broadcast_reset(mine);

        mine.state_mut().stage = ResetStage::Cleanup;
        self.schedule_overlay_cleanup(mine);

        let now = self.ctx.clock.now_ms();
        let state = mine.state_mut();
        state.stats.reset_time_ms = now.saturating_sub(state.cycle_started_ms);
        state.last_reset_ms = now;
        state.phase = ResetPhase::Idle;
        state.job = None;

        if self.ctx.settings.mine_stats || job.has(ResetActions::DETAILS) {
            info!(
                mine = %mine.name(),
                blocks = mine.total_cells(),
                "Mine reset: {}  Blocks: {}  {}",
                mine.name(),
                mine.total_cells(),
                mine.state().stats.message()
            );
        } else {
            info!(mine = %mine.name(), resets = mine.state().reset_count, "mine reset complete");
        }

        mine.state_mut().stage = if job.has(ResetActions::CHAINED_RESETS) {
            ResetStage::ChainNext
        } else {
            ResetStage::Done
        };
        Ok(job)
    }

    fn abort_cycle(&self, mine: &mut Mine, err: &MineError) {
        error!(
            mine = %mine.name(),
            stage = %mine.state().stage,
            error = %err,
            "failed to reset mine, cycle aborted"
        );
        self.finish_aborted(mine);
    }

    fn finish_aborted(&self, mine: &mut Mine) {
        let state = mine.state_mut();
        state.phase = ResetPhase::Idle;
        state.stage = ResetStage::Done;
        state.page = 0;
        state.position = 0;
        state.job = None;
    }

    // ========================================================================
    // Cycle steps
    // ========================================================================

    /// Moves every player in the mine column to the spawn, the named
    /// destination, or a temporary platform above the mine.
    fn teleport_all_players_out(&self, mine: &mut Mine) -> MineResult<usize> {
        let players = self.ctx.players.players_in_region(mine.bounds());
        if players.is_empty() {
            return Ok(0);
        }

        if let Some(spawn) = mine.spawn().cloned() {
            for player in &players {
                self.ctx.players.teleport_out(*player, &spawn)?;
            }
        } else if let Some(destination) = mine.tp_destination().map(str::to_string) {
            for player in &players {
                self.ctx.players.teleport_named(*player, &destination)?;
            }
        } else {
            let target = mine.bounds().top_center();
            let (x, y, z) = target.block_coords();
            let platform = TargetBlockKey::new(x, y - 1, z);
            let overlay = BlockType::new(&self.ctx.settings.overlay_block);
            self.ctx
                .world
                .set_cell(&target.world, platform.x, platform.y, platform.z, &overlay)?;
            let overlays = &mut mine.state_mut().overlay_blocks;
            if !overlays.contains(&platform) {
                overlays.push(platform);
            }
            for player in &players {
                self.ctx.players.teleport_out(*player, &target)?;
            }
        }

        debug!(mine = %mine.name(), players = players.len(), "players teleported out");
        Ok(players.len())
    }

    /// Runs every command with `prefix`. A rejected command is logged and
    /// the rest still run.
    fn run_commands(&self, mine: &Mine, prefix: &str) {
        for command in mine.commands_with_prefix(prefix) {
            if let Err(e) = self.ctx.commands.run_host_command(command) {
                warn!(mine = %mine.name(), command = %command, error = %e, "reset command failed");
            }
        }
    }

    fn broadcast_reset(&self, mine: &Mine) {
        let message = format!("The mine {} has been reset.", mine.name());
        let center = mine.bounds().center();
        for player in self
            .ctx
            .players
            .players_within_radius(&center, self.ctx.settings.broadcast_radius)
        {
            self.ctx.players.send_message(player, &message);
        }
    }

    fn schedule_overlay_cleanup(&self, mine: &mut Mine) {
        let blocks = std::mem::take(&mut mine.state_mut().overlay_blocks);
        if blocks.is_empty() {
            return;
        }
        let world = Arc::clone(&self.ctx.world);
        let world_name = mine.bounds().world().to_string();
        let mine_name = mine.name().to_string();
        self.ctx.scheduler.run_on_world_context_later(
            Box::new(move || {
                let air = BlockType::air();
                for key in blocks {
                    if let Err(e) = world.set_cell(&world_name, key.x, key.y, key.z, &air) {
                        warn!(mine = %mine_name, error = %e, "could not remove teleport platform");
                    }
                }
            }),
            self.ctx.settings.overlay_cleanup_delay_ticks,
        );
    }

    /// Saves mined counts if any are pending. Failures are logged and the
    /// counts stay dirty for the next attempt.
    fn flush_counts(&self, mine: &mut Mine) {
        if !mine.has_unsaved_counts() {
            return;
        }
        match self.ctx.persistence.save_mine(&mine.counts()) {
            Ok(()) => mine.mark_counts_saved(),
            Err(e) => warn!(mine = %mine.name(), error = %e, "could not save mine counts"),
        }
    }

    // ========================================================================
    // Break accounting
    // ========================================================================

    /// Records a player's break. Call from the host's break event on the
    /// world context. Returns true if the break was counted.
    ///
    /// # Errors
    ///
    /// Returns [`MineError::UnknownMine`].
    pub fn record_block_break(self: &Arc<Self>, name: &str, x: i32, y: i32, z: i32) -> MineResult<bool> {
        let handle = self.mine(name)?;
        let counted = handle.lock().record_break(TargetBlockKey::new(x, y, z));
        if counted {
            self.submit_mine_sweeper_task(&handle);
            self.check_depletion(name, &handle);
        }
        Ok(counted)
    }

    /// Schedules a sweep unless one is already pending or the sweeper is
    /// off. Returns true if a task was scheduled.
    pub fn submit_mine_sweeper_task(self: &Arc<Self>, handle: &MineHandle) -> bool {
        {
            let mine = handle.lock();
            if !mine.is_sweeper_enabled() || mine.state().sweeper_submitted {
                return false;
            }
        }

        let delay = {
            let _guard = self.sweeper_lock.lock();
            let mut mine = handle.lock();
            if mine.state().sweeper_submitted {
                return false;
            }
            mine.state_mut().sweeper_submitted = true;
            sweeper_delay_ticks(
                mine.total_cells(),
                mine.remaining_block_count(),
                self.ctx.settings.ticks_per_second,
            )
        };

        let this = Arc::clone(self);
        let handle = Arc::clone(handle);
        self.ctx.scheduler.run_on_world_context_later(
            Box::new(move || {
                this.run_sweeper(&handle);
            }),
            delay,
        );
        true
    }

    /// Runs a sweep now, then checks for depletion. Skipped while a reset
    /// cycle is running.
    pub fn run_sweeper(self: &Arc<Self>, handle: &MineHandle) -> Option<SweepReport> {
        let (report, name) = {
            let _guard = self.sweeper_lock.lock();
            let mut mine = handle.lock();
            if mine.state().phase != ResetPhase::Idle || mine.is_deleted() {
                mine.state_mut().sweeper_submitted = false;
                return None;
            }
            let report = sweep(&mut mine, self.ctx.world.as_ref(), self.ctx.clock.as_ref());
            (report, mine.name().to_string())
        };

        self.check_depletion(&name, handle);
        Some(report)
    }

    /// Resets the mine if it is empty or at its reset threshold.
    fn check_depletion(self: &Arc<Self>, name: &str, handle: &MineHandle) {
        let depleted = {
            let mine = handle.lock();
            mine.state().phase == ResetPhase::Idle && mine.is_depleted()
        };
        if depleted {
            info!(mine = %name, "mine depleted, resetting");
            if let Err(e) = self.reset_mine(name, ResetJob::normal()) {
                warn!(mine = %name, error = %e, "depletion reset not started");
            }
        }
    }

    // ========================================================================
    // Timers and maintenance
    // ========================================================================

    /// Refreshes every idle mine whose reset timer has elapsed. Call once
    /// per tick. Returns the mines that were evaluated.
    pub fn poll_timers(self: &Arc<Self>, now_ms: u64) -> Vec<String> {
        let due: Vec<String> = self
            .mines
            .read()
            .iter()
            .filter_map(|(name, handle)| {
                let mut mine = handle.lock();
                let secs = mine.reset_time_secs();
                if secs == 0 || mine.is_virtual() || mine.state().phase != ResetPhase::Idle {
                    return None;
                }
                let state = mine.state_mut();
                if now_ms.saturating_sub(state.last_reset_ms) < secs * 1000 {
                    return None;
                }
                state.last_reset_ms = now_ms;
                Some(name.clone())
            })
            .collect();

        for name in &due {
            if let Err(e) = self.refresh_mine(name) {
                warn!(mine = %name, error = %e, "timed reset not started");
            }
        }
        due
    }

    /// Schedules the air-count scan of a mine on the world context.
    ///
    /// # Errors
    ///
    /// Returns [`MineError::UnknownMine`].
    pub fn submit_startup_refresh(self: &Arc<Self>, name: &str) -> MineResult<()> {
        let handle = self.mine(name)?;
        let this = Arc::clone(self);
        self.ctx.scheduler.run_on_world_context(Box::new(move || {
            this.refresh_air_count_now(&handle);
        }));
        Ok(())
    }

    /// Schedules the air-count scan of every non-virtual mine.
    pub fn submit_startup_refresh_all(self: &Arc<Self>) {
        for name in self.mine_names() {
            let is_virtual = self.mine(&name).map_or(true, |h| h.lock().is_virtual());
            if !is_virtual {
                if let Err(e) = self.submit_startup_refresh(&name) {
                    warn!(mine = %name, error = %e, "startup refresh not scheduled");
                }
            }
        }
    }

    /// Runs the air-count scan now. Skipped while a reset cycle is running.
    pub fn refresh_air_count_now(&self, handle: &MineHandle) -> Option<ScanReport> {
        let mut mine = handle.lock();
        if mine.state().phase != ResetPhase::Idle {
            return None;
        }
        let loaded = self.ctx.world.is_world_loaded(mine.bounds().world());
        mine.set_enabled(loaded);
        refresh_air_count(&mut mine, self.ctx.world.as_ref(), self.ctx.clock.as_ref())
    }

    /// Moves one edge of an idle mine and rescans it.
    ///
    /// # Errors
    ///
    /// Returns [`MineError::UnknownMine`], [`MineError::ResetInProgress`]
    /// or [`MineError::InvalidBounds`].
    pub fn resize_mine(self: &Arc<Self>, name: &str, edge: Edge, amount: i32) -> MineResult<()> {
        let handle = self.mine(name)?;
        {
            let mut mine = handle.lock();
            if mine.state().phase != ResetPhase::Idle {
                return Err(MineError::ResetInProgress(name.to_string()));
            }
            mine.resize(edge, amount)?;
            info!(mine = %name, ?edge, amount, cells = mine.total_cells(), "mine resized");
        }
        self.submit_startup_refresh(name)
    }

    /// Statistics line of a mine.
    ///
    /// # Errors
    ///
    /// Returns [`MineError::UnknownMine`].
    pub fn stats_message(&self, name: &str) -> MineResult<String> {
        Ok(self.mine(name)?.lock().state().stats.message())
    }

    /// Saves the counts of every mine with unsaved breaks.
    pub fn save_all(&self) {
        let handles: Vec<MineHandle> = self.mines.read().values().cloned().collect();
        for handle in handles {
            self.flush_counts(&mut handle.lock());
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
