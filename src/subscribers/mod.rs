//! # Event subscribers.
//!
//! ```text
//! Bus ──► supervisor listener ──► SubscriberSet ──► Subscribe::on_event(&Event)
//!                                                      ├──► LogWriter (tracing)
//!                                                      └──► custom (alerts, tests, ...)
//! ```

mod log;
mod set;
mod subscriber;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
