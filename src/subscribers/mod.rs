//! # Event subscribers for the appvisor runtime.
//!
//! ```text
//! Bus ──► App listener ──► SubscriberSet ──┬──► LogWriter (tracing)
//!                                          ├──► Metrics
//!                                          └──► Custom ...
//! ```
//!
//! - [`Subscribe`]: the extension trait.
//! - [`SubscriberSet`]: per-subscriber queues and workers with panic isolation.
//! - [`LogWriter`] (feature `logging`): maps events onto `tracing` levels.

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
