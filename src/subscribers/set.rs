//! # Non-blocking event fan-out to multiple subscribers.
//!
//! ```text
//! emit(event)
//!     ├──► [queue 1] ──► worker 1 ──► subscriber1.on_event()
//!     │    (bounded)         └──────► panic → SubscriberPanicked
//!     └──► [queue N] ──► worker N ──► subscriberN.on_event()
//! ```
//!
//! ## Rules
//! - `emit()` returns immediately (uses `try_send`)
//! - Overflow drops the event for that subscriber only and publishes `SubscriberOverflow`
//! - Per-subscriber FIFO, no ordering across subscribers
//! - [`SubscriberSet::flush`] waits until every event emitted before it was handled
//! - [`SubscriberSet::shutdown`] drains every queue before returning
//! - A panic while handling a `SubscriberOverflow`/`SubscriberPanicked` report is
//!   logged, never published, so reports cannot feed on themselves
//!
//! `AssertUnwindSafe` is used around `on_event`: a subscriber that panics while
//! holding a lock may leave its own state inconsistent.

use std::any::Any;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

enum Delivery {
    Event(Arc<Event>),
    /// Acknowledged once everything queued ahead of it was handled.
    Flush(oneshot::Sender<()>),
}

struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Delivery>,
}

/// Fan-out coordinator with one bounded queue and worker per subscriber.
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker task per subscriber.
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let (channels, workers) = subs
            .into_iter()
            .map(|sub| {
                let (sender, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let channel = SubscriberChannel {
                    name: sub.name(),
                    sender,
                };
                (channel, tokio::spawn(deliver(sub, rx, bus.clone())))
            })
            .unzip();

        Self {
            channels,
            workers,
            bus,
        }
    }

    /// Number of subscribers in the set.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// True when no subscriber is registered.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Emits an event to all subscribers without waiting for them.
    ///
    /// Overflow events are never re-published when they overflow themselves.
    pub fn emit(&self, event: Event) {
        let is_overflow_evt = matches!(event.kind, EventKind::SubscriberOverflow);
        let event = Arc::new(event);

        for channel in &self.channels {
            let reason = match channel.sender.try_send(Delivery::Event(Arc::clone(&event))) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if !is_overflow_evt {
                self.bus
                    .publish(Event::subscriber_overflow(channel.name, reason));
            }
        }
    }

    /// Waits until every subscriber has handled the events emitted so far.
    pub async fn flush(&self) {
        let mut acks = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let (tx, rx) = oneshot::channel();
            if channel.sender.send(Delivery::Flush(tx)).await.is_ok() {
                acks.push(rx);
            }
        }
        for ack in acks {
            let _ = ack.await;
        }
    }

    /// Closes every queue and waits for the workers to drain them.
    pub async fn shutdown(self) {
        drop(self.channels);
        for h in self.workers {
            let _ = h.await;
        }
    }
}

/// Feeds one subscriber from its queue until the queue is closed and empty.
async fn deliver(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Delivery>, bus: Bus) {
    while let Some(item) = rx.recv().await {
        let ev = match item {
            Delivery::Event(ev) => ev,
            Delivery::Flush(ack) => {
                let _ = ack.send(());
                continue;
            }
        };
        let handled = std::panic::AssertUnwindSafe(sub.on_event(&ev))
            .catch_unwind()
            .await;
        let Err(payload) = handled else {
            continue;
        };
        let message = panic_message(&*payload);
        if matches!(
            ev.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        ) {
            tracing::error!(
                subscriber = sub.name(),
                panic = %message,
                "subscriber panicked on a subscriber report"
            );
        } else {
            bus.publish(Event::subscriber_panicked(sub.name(), message));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
