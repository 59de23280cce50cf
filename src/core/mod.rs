//! Runtime core: orchestration and lifecycle.
//!
//! This module contains the lifecycle orchestrator. The public API from this module
//! is [`App`] (built by [`AppBuilder`]), the [`Graceful`] controller contract with its
//! default [`SignalGraceful`], the [`JobPool`] handle types and [`AppConfig`].
//!
//! Internal modules:
//! - [`app`]: the staged bootstrap sequencer;
//! - [`builder`]: assembles an [`App`] from config, subscribers and overrides;
//! - [`registry`]: conditional loading, aggregate expansion, priority order;
//! - [`pool`]: bounded-concurrency background job pool;
//! - [`graceful`]: reload/shutdown handlers with per-handler timeouts;
//! - [`shutdown`]: cross-platform OS signal handling;
//! - [`status`]: monotonic lifecycle status.

mod app;
mod builder;
mod config;
mod graceful;
mod pool;
mod registry;
mod shutdown;
mod status;

use std::sync::{Mutex, MutexGuard};

pub use app::{App, AppInfo};
pub use builder::AppBuilder;
pub use config::AppConfig;
pub use graceful::{Graceful, Handler, SignalGraceful};
pub use pool::{JobHandle, JobPool};
pub use registry::{MAX_AGGREGATE_DEPTH, Registry};
pub use shutdown::Signal;
pub use status::Status;

/// Locks `m`, recovering the guard if a panicking holder poisoned it.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
