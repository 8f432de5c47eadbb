//! # Event bus for broadcasting lifecycle events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`]: schedulers, process workers, the
//! supervisor and the shutdown coordinator publish; the supervisor's listener
//! is the single consumer and forwards everything to the
//! [`SubscriberSet`](crate::SubscriberSet).
//!
//! ```text
//! Publishers:                          Consumer:
//!   PeriodicScheduler ──┐
//!   process worker    ──┼──► Bus ───► supervisor listener ───► SubscriberSet
//!   Supervisor        ──┤
//!   ShutdownCoordinator─┘
//! ```
//!
//! ## Rules
//! - `publish()` never blocks and never fails; with no receiver the event is dropped.
//! - One ring buffer is shared by all receivers; a lagging receiver skips the oldest items.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for lifecycle events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus; capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
