//! In-memory host doubles for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::adapter::{
    CellState, Clock, CommandAdapter, MineContext, MinePersistence, MineResetEvent, PlayerAdapter,
    PlayerId, ResetEventBus, Scheduler, Task, WorldAdapter,
};
use crate::block::BlockType;
use crate::bounds::{Bounds, Location};
use crate::config::EngineSettings;
use crate::error::{MineError, MineResult};
use crate::mine::MineCounts;
use crate::target::TargetBlockKey;

#[derive(Default)]
pub struct TestClock(AtomicU64);

impl TestClock {
    pub fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct TestWorld {
    clock: Arc<TestClock>,
    write_cost_ms: u64,
    cells: Mutex<HashMap<TargetBlockKey, BlockType>>,
    writes: Mutex<Vec<TargetBlockKey>>,
    failing: Mutex<HashSet<TargetBlockKey>>,
    loaded: AtomicBool,
}

impl TestWorld {
    pub fn new(clock: Arc<TestClock>) -> Self {
        Self::with_write_cost(clock, 0)
    }

    pub fn with_write_cost(clock: Arc<TestClock>, write_cost_ms: u64) -> Self {
        Self {
            clock,
            write_cost_ms,
            cells: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            loaded: AtomicBool::new(true),
        }
    }

    pub fn set_loaded(&self, loaded: bool) {
        self.loaded.store(loaded, Ordering::SeqCst);
    }

    pub fn fail_at(&self, x: i32, y: i32, z: i32) {
        self.failing.lock().insert(TargetBlockKey::new(x, y, z));
    }

    /// Writes a cell without logging it, as a player would.
    pub fn put(&self, x: i32, y: i32, z: i32, block: &str) {
        self.cells
            .lock()
            .insert(TargetBlockKey::new(x, y, z), BlockType::new(block));
    }

    pub fn block_at(&self, x: i32, y: i32, z: i32) -> BlockType {
        self.cells
            .lock()
            .get(&TargetBlockKey::new(x, y, z))
            .cloned()
            .unwrap_or_else(BlockType::air)
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    pub fn writes_since(&self, index: usize) -> Vec<TargetBlockKey> {
        self.writes.lock().get(index..).unwrap_or(&[]).to_vec()
    }

    pub fn distinct_cells_written(&self) -> usize {
        self.writes.lock().iter().collect::<HashSet<_>>().len()
    }

    fn check(&self, world: &str, key: TargetBlockKey) -> MineResult<()> {
        if !self.loaded.load(Ordering::SeqCst) {
            return Err(MineError::WorldNotLoaded(world.to_string()));
        }
        if self.failing.lock().contains(&key) {
            return Err(MineError::WorldAccess {
                world: world.to_string(),
                x: key.x,
                y: key.y,
                z: key.z,
                reason: "entity in unloaded chunk".to_string(),
            });
        }
        Ok(())
    }
}

impl WorldAdapter for TestWorld {
    fn is_world_loaded(&self, _world: &str) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    fn resolve_cell(&self, world: &str, x: i32, y: i32, z: i32) -> MineResult<CellState> {
        self.check(world, TargetBlockKey::new(x, y, z))?;
        Ok(CellState {
            block: self.block_at(x, y, z),
        })
    }

    fn set_cell(&self, world: &str, x: i32, y: i32, z: i32, block: &BlockType) -> MineResult<()> {
        let key = TargetBlockKey::new(x, y, z);
        self.check(world, key)?;
        self.cells.lock().insert(key, block.clone());
        self.writes.lock().push(key);
        self.clock.advance(self.write_cost_ms);
        Ok(())
    }
}

/// World-context queue driven by explicit ticks. Off-context work runs
/// inline on the caller.
#[derive(Default)]
pub struct TestScheduler {
    tick: AtomicU64,
    seq: AtomicU64,
    queue: Mutex<Vec<(u64, u64, Task)>>,
}

impl TestScheduler {
    pub fn tick(&self) -> usize {
        let now = self.tick.fetch_add(1, Ordering::SeqCst) + 1;
        let mut due = {
            let mut queue = self.queue.lock();
            let (ready, waiting): (Vec<_>, Vec<_>) = queue.drain(..).partition(|(at, _, _)| *at <= now);
            *queue = waiting;
            ready
        };
        due.sort_by_key(|(at, seq, _)| (*at, *seq));
        let ran = due.len();
        for (_, _, task) in due {
            task();
        }
        ran
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn run_until_idle(&self, max_ticks: u64) -> u64 {
        let mut ticks = 0;
        while self.pending() > 0 && ticks < max_ticks {
            self.tick();
            ticks += 1;
        }
        ticks
    }

    fn push(&self, task: Task, delay: u64) {
        let at = self.tick.load(Ordering::SeqCst) + delay.max(1);
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        self.queue.lock().push((at, seq, task));
    }
}

impl Scheduler for TestScheduler {
    fn run_on_world_context(&self, task: Task) {
        self.push(task, 1);
    }

    fn run_on_world_context_later(&self, task: Task, delay_ticks: u64) {
        self.push(task, delay_ticks);
    }

    fn run_off_context(&self, task: Task) {
        task();
    }
}

#[derive(Default)]
pub struct TestPlayers {
    pub locations: Mutex<HashMap<PlayerId, Location>>,
    pub messages: Mutex<Vec<(PlayerId, String)>>,
    pub teleports: Mutex<Vec<(PlayerId, Location)>>,
}

impl PlayerAdapter for TestPlayers {
    fn players_in_region(&self, bounds: &Bounds) -> Vec<PlayerId> {
        self.locations
            .lock()
            .iter()
            .filter(|(_, loc)| bounds.within_include_top_bottom(loc))
            .map(|(id, _)| *id)
            .collect()
    }

    fn players_within_radius(&self, center: &Location, radius: f64) -> Vec<PlayerId> {
        self.locations
            .lock()
            .iter()
            .filter(|(_, loc)| {
                loc.world == center.world
                    && ((loc.x - center.x).powi(2) + (loc.y - center.y).powi(2) + (loc.z - center.z).powi(2))
                        .sqrt()
                        <= radius
            })
            .map(|(id, _)| *id)
            .collect()
    }

    fn teleport_out(&self, player: PlayerId, destination: &Location) -> MineResult<()> {
        self.locations.lock().insert(player, destination.clone());
        self.teleports.lock().push((player, destination.clone()));
        Ok(())
    }

    fn teleport_named(&self, player: PlayerId, destination: &str) -> MineResult<Location> {
        let loc = Location::new(destination, 0.0, 64.0, 0.0);
        self.teleport_out(player, &loc)?;
        Ok(loc)
    }

    fn send_message(&self, player: PlayerId, message: &str) {
        self.messages.lock().push((player, message.to_string()));
    }
}

#[derive(Default)]
pub struct TestCommands {
    pub log: Mutex<Vec<String>>,
}

impl CommandAdapter for TestCommands {
    fn run_host_command(&self, command: &str) -> MineResult<()> {
        self.log.lock().push(command.to_string());
        if command.starts_with("fail") {
            return Err(MineError::CommandFailed {
                command: command.to_string(),
                reason: "rejected".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct TestEvents {
    pub cancel: AtomicBool,
    pub posted: Mutex<Vec<String>>,
}

impl ResetEventBus for TestEvents {
    fn post_cancellable(&self, event: &mut MineResetEvent) -> bool {
        self.posted.lock().push(event.mine().to_string());
        if self.cancel.load(Ordering::SeqCst) {
            event.cancel();
        }
        event.is_cancelled()
    }
}

#[derive(Default)]
pub struct TestStore {
    pub saved: Mutex<HashMap<String, MineCounts>>,
}

impl MinePersistence for TestStore {
    fn save_mine(&self, counts: &MineCounts) -> MineResult<()> {
        self.saved.lock().insert(counts.name.clone(), counts.clone());
        Ok(())
    }

    fn load_mine(&self, name: &str) -> MineResult<Option<MineCounts>> {
        Ok(self.saved.lock().get(name).cloned())
    }
}

/// A full set of doubles plus the context built from them.
pub struct TestHost {
    pub clock: Arc<TestClock>,
    pub world: Arc<TestWorld>,
    pub scheduler: Arc<TestScheduler>,
    pub players: Arc<TestPlayers>,
    pub commands: Arc<TestCommands>,
    pub events: Arc<TestEvents>,
    pub store: Arc<TestStore>,
}

impl TestHost {
    pub fn new() -> Self {
        let clock = Arc::new(TestClock::default());
        Self {
            world: Arc::new(TestWorld::new(Arc::clone(&clock))),
            clock,
            scheduler: Arc::new(TestScheduler::default()),
            players: Arc::new(TestPlayers::default()),
            commands: Arc::new(TestCommands::default()),
            events: Arc::new(TestEvents::default()),
            store: Arc::new(TestStore::default()),
        }
    }

    pub fn context(&self, settings: EngineSettings) -> MineContext {
        MineContext {
            world: self.world.clone(),
            players: self.players.clone(),
            scheduler: self.scheduler.clone(),
            commands: self.commands.clone(),
            events: self.events.clone(),
            persistence: self.store.clone(),
            clock: self.clock.clone(),
            settings,
        }
    }
}
