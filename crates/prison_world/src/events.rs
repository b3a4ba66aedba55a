//! # Reset Event Bus
//!
//! Delivers the cancellable reset event to registered listeners on the
//! world context, then publishes a notice to observers.
//!
//! ```text
//!   orchestrator ──> listeners (may cancel, in order)
//!                └─> [bounded channel] ──> observers (read-only)
//! ```
//!
//! Every listener sees the event, including after an earlier one cancelled
//! it. Observers that fall behind lose notices rather than block the tick.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use prison_mines::{MineResetEvent, ResetEventBus, ResetJob};
use tracing::{debug, warn};

/// Listener callback.
pub type ResetListener = Box<dyn Fn(&mut MineResetEvent) + Send + Sync>;

/// What observers receive for every posted event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResetNotice {
    /// Mine the event was for.
    pub mine: String,
    /// Requested job.
    pub job: ResetJob,
    /// True if a listener cancelled the reset.
    pub cancelled: bool,
}

/// Listener registry plus an observer channel.
pub struct EventBus {
    listeners: RwLock<Vec<ResetListener>>,
    /// Sender end - held by the bus.
    sender: Sender<ResetNotice>,
    /// Receiver end - cloned out to observers.
    receiver: Receiver<ResetNotice>,
    dropped: Mutex<u64>,
}

impl EventBus {
    /// Creates a bus whose observer channel holds `capacity` notices.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            listeners: RwLock::new(Vec::new()),
            sender,
            receiver,
            dropped: Mutex::new(0),
        }
    }

    /// Adds a listener. Listeners run in registration order.
    pub fn listen(&self, listener: ResetListener) {
        self.listeners.write().push(listener);
    }

    /// A receiver of reset notices. All receivers share one queue.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<ResetNotice> {
        self.receiver.clone()
    }

    /// Notices dropped because the channel was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        *self.dropped.lock()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ResetEventBus for EventBus {
    fn post_cancellable(&self, event: &mut MineResetEvent) -> bool {
        for listener in self.listeners.read().iter() {
            listener(&mut *event);
        }

        let notice = ResetNotice {
            mine: event.mine().to_string(),
            job: event.job(),
            cancelled: event.is_cancelled(),
        };
        match self.sender.try_send(notice) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                *self.dropped.lock() += 1;
                warn!(mine = %event.mine(), "reset notice dropped, observers are behind");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }

        if event.is_cancelled() {
            debug!(mine = %event.mine(), "reset cancelled by listener");
        }
        event.is_cancelled()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_no_listeners_not_cancelled() {
        let bus = EventBus::default();
        let mut event = MineResetEvent::new("a", ResetJob::normal());
        assert!(!bus.post_cancellable(&mut event));
        let notice = bus.subscribe().try_recv().unwrap();
        assert_eq!(notice.mine, "a");
        assert!(!notice.cancelled);
    }

    #[test]
    fn test_cancel_reaches_every_listener() {
        let bus = EventBus::default();
        let seen = Arc::new(AtomicUsize::new(0));

        bus.listen(Box::new(|event: &mut MineResetEvent| {
            if event.mine() == "protected" {
                event.cancel();
            }
        }));
        let counter = Arc::clone(&seen);
        bus.listen(Box::new(move |event: &mut MineResetEvent| {
            if event.is_cancelled() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));

        assert!(bus.post_cancellable(&mut MineResetEvent::new("protected", ResetJob::normal())));
        assert!(!bus.post_cancellable(&mut MineResetEvent::new("open", ResetJob::clear())));
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        let notices: Vec<ResetNotice> = bus.subscribe().try_iter().collect();
        assert_eq!(notices.len(), 2);
        assert!(notices[0].cancelled);
        assert_eq!(notices[1].job, ResetJob::clear());
    }

    #[test]
    fn test_full_channel_drops_notices() {
        let bus = EventBus::new(1);
        for _ in 0..3 {
            bus.post_cancellable(&mut MineResetEvent::new("a", ResetJob::normal()));
        }
        assert_eq!(bus.dropped(), 2);
        assert_eq!(bus.subscribe().try_iter().count(), 1);
    }
}
