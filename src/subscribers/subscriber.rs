//! # Subscribe: hook into worker lifecycle events.
//!
//! The supervisor hands every bus event to each registered [`Subscribe`]
//! implementation. [`LogWriter`](crate::LogWriter) is the one the binary
//! installs; tests plug in a recorder that keeps every event for assertions.
//!
//! A subscriber only ever sees events through its own queue, so a slow alert
//! hook cannot hold up logging:
//! ```text
//! Bus ─► listener ─► SubscriberSet ─┬─► [queue] ─► LogWriter::on_event
//!                                   └─► [queue] ─► RestartAlert::on_event
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! use async_trait::async_trait;
//! use tradevisor::{Event, EventKind, Subscribe};
//!
//! /// Counts crashes of the long-running workers.
//! #[derive(Default)]
//! struct RestartAlert {
//!     crashes: AtomicU32,
//! }
//!
//! #[async_trait]
//! impl Subscribe for RestartAlert {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::WorkerExited {
//!             self.crashes.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "restart-alert"
//!     }
//!
//!     // Only a handful of events per run matter here.
//!     fn queue_capacity(&self) -> usize {
//!         64
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Queue length used unless a subscriber asks for another.
const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Receives lifecycle events from the supervisor.
///
/// Delivery is in publish order. When the queue is full the event is dropped
/// for this subscriber and a `SubscriberOverflow` report goes out instead; a
/// panic in [`on_event`](Self::on_event) becomes a `SubscriberPanicked` report.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event.
    async fn on_event(&self, event: &Event);

    /// Label used in overflow and panic reports.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Length of this subscriber's queue (0 is treated as 1).
    fn queue_capacity(&self) -> usize {
        DEFAULT_QUEUE_CAPACITY
    }
}
