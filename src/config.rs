//! # Runtime configuration.
//!
//! [`Config`] holds the supervisor-wide settings: the shutdown grace period
//! and the event bus capacity. Worker definitions are passed to
//! [`Supervisor::run`](crate::Supervisor::run) separately.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use tradevisor::Config;
//!
//! let mut cfg = Config::default();
//! cfg.grace = Duration::from_secs(3);
//!
//! assert_eq!(cfg.bus_capacity, 1024);
//! ```

use std::time::Duration;

/// Supervisor-wide settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// How long stopping workers may take before they are killed.
    pub grace: Duration,
    /// Capacity of the event bus channel; 0 is treated as 1.
    pub bus_capacity: usize,
}

impl Default for Config {
    /// - `grace = 10s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(10),
            bus_capacity: 1024,
        }
    }
}
