//! # Tick Scheduler
//!
//! The host's two execution contexts:
//!
//! ```text
//!   any thread ──> [world queue] ──> tick() on the main loop (world context)
//!   any thread ──> [job channel] ──> worker pool (off context)
//! ```
//!
//! World-context tasks are only ever run inside [`TickScheduler::tick`],
//! so whoever drives the tick loop owns the world. Tasks scheduled for the
//! same tick run in submission order.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use prison_mines::{Scheduler, Task};
use tracing::{debug, warn};

/// How off-context tasks run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerMode {
    /// On the submitting thread, immediately. Deterministic; for tests.
    Inline,
    /// On a pool of this many threads.
    Pool(usize),
}

impl Default for WorkerMode {
    fn default() -> Self {
        Self::Pool(2)
    }
}

struct ScheduledTask {
    due_tick: u64,
    seq: u64,
    task: Task,
}

/// Counters shared with the worker threads.
#[derive(Default)]
struct Counters {
    /// Off-context tasks submitted and not yet finished.
    in_flight: AtomicUsize,
    /// Off-context tasks finished.
    completed: AtomicU64,
}

/// World-context queue plus worker pool.
pub struct TickScheduler {
    tick: AtomicU64,
    seq: AtomicU64,
    world_tx: Sender<ScheduledTask>,
    world_rx: Receiver<ScheduledTask>,
    /// Tasks drained from the channel but not yet due.
    waiting: Mutex<Vec<ScheduledTask>>,
    /// World tasks submitted and not yet run.
    queued: AtomicUsize,
    mode: WorkerMode,
    job_tx: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl TickScheduler {
    /// Creates a scheduler and starts its workers.
    #[must_use]
    pub fn new(mode: WorkerMode) -> Self {
        let (world_tx, world_rx) = unbounded();
        let counters = Arc::new(Counters::default());

        let (job_tx, workers) = match mode {
            WorkerMode::Inline => (None, Vec::new()),
            WorkerMode::Pool(threads) => {
                let (tx, rx) = unbounded::<Task>();
                let workers = (0..threads.max(1))
                    .map(|i| {
                        let rx = rx.clone();
                        let counters = Arc::clone(&counters);
                        thread::spawn(move || Self::worker_loop(i, &rx, &counters))
                    })
                    .collect();
                (Some(tx), workers)
            }
        };

        Self {
            tick: AtomicU64::new(0),
            seq: AtomicU64::new(0),
            world_tx,
            world_rx,
            waiting: Mutex::new(Vec::new()),
            queued: AtomicUsize::new(0),
            mode,
            job_tx,
            workers,
            counters,
        }
    }

    /// Worker thread main loop. Exits when the job channel closes.
    fn worker_loop(id: usize, rx: &Receiver<Task>, counters: &Counters) {
        debug!(worker = id, "worker started");
        while let Ok(task) = rx.recv() {
            task();
            counters.completed.fetch_add(1, Ordering::SeqCst);
            counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        debug!(worker = id, "worker stopped");
    }

    /// Worker mode.
    #[must_use]
    pub const fn mode(&self) -> WorkerMode {
        self.mode
    }

    /// Ticks run so far.
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.tick.load(Ordering::SeqCst)
    }

    /// World tasks not yet run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Off-context tasks not yet finished.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    /// Advances one tick and runs every world task due by then. Returns
    /// the number of tasks run. Call from the world context only.
    pub fn tick(&self) -> usize {
        let now = self.tick.fetch_add(1, Ordering::SeqCst) + 1;

        let mut due = {
            let mut waiting = self.waiting.lock();
            waiting.extend(self.world_rx.try_iter());
            let (due, later): (Vec<_>, Vec<_>) =
                waiting.drain(..).partition(|t| t.due_tick <= now);
            *waiting = later;
            due
        };
        due.sort_by_key(|t| (t.due_tick, t.seq));

        let ran = due.len();
        for scheduled in due {
            (scheduled.task)();
            self.queued.fetch_sub(1, Ordering::SeqCst);
        }
        ran
    }

    /// Ticks until no world task is pending and no worker is busy, or
    /// `max_ticks` is reached. Waits briefly for workers when nothing is
    /// due. Returns the ticks run.
    pub fn run_until_idle(&self, max_ticks: u64) -> u64 {
        let mut ticks = 0;
        while (self.pending() > 0 || self.in_flight() > 0) && ticks < max_ticks {
            if self.pending() == 0 {
                thread::sleep(Duration::from_millis(1));
                continue;
            }
            self.tick();
            ticks += 1;
        }
        ticks
    }

    fn schedule(&self, task: Task, delay_ticks: u64) {
        let scheduled = ScheduledTask {
            due_tick: self.current_tick() + delay_ticks.max(1),
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
            task,
        };
        self.queued.fetch_add(1, Ordering::SeqCst);
        if self.world_tx.send(scheduled).is_err() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            warn!("world queue closed, task dropped");
        }
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new(WorkerMode::default())
    }
}

impl Scheduler for TickScheduler {
    fn run_on_world_context(&self, task: Task) {
        self.schedule(task, 1);
    }

    fn run_on_world_context_later(&self, task: Task, delay_ticks: u64) {
        self.schedule(task, delay_ticks);
    }

    fn run_off_context(&self, task: Task) {
        let Some(tx) = &self.job_tx else {
            task();
            return;
        };
        self.counters.in_flight.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = tx.send(task) {
            self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
            warn!("worker pool closed, running task inline");
            (e.into_inner())();
        }
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        // Closing the channel stops the workers once the queue is drained
        self.job_tx = None;
        let current = thread::current().id();
        for handle in self.workers.drain(..) {
            // A worker can hold the last reference through a task it ran
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
