//! Lifecycle events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Supervisor`, `ShutdownCoordinator`, `PeriodicScheduler`,
//!   `runner::run_once`, process workers, `SubscriberSet` workers (overflow/panic).
//! - **Consumer**: the supervisor's listener, which fans out to `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
