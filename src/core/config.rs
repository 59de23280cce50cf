//! # Global runtime configuration.
//!
//! Provides [`AppConfig`] centralized settings for the application runtime.
//!
//! ## Sentinel values
//! - `async_workers = 0` → clamped to a single worker
//! - `handler_timeout = 0s` → no per-handler deadline; each reload/shutdown sequence is
//!   bounded by `shutdown_timeout` instead (unbounded only if that is `0s` as well)
//! - `shutdown_timeout = 0s` → shutdown does not wait for outstanding work

use std::time::Duration;

/// Global configuration for the application runtime.
///
/// ## Field semantics
/// - `name` / `version`: bound into the resolver as [`AppInfo`](crate::AppInfo)
/// - `async_workers`: size of the background job pool (`0` = 1 worker)
/// - `handler_timeout`: per graceful handler deadline (`0s` = whole sequence bounded by `shutdown_timeout`)
/// - `shutdown_timeout`: overall join deadline after the handlers ran (`0s` = no wait)
/// - `os_signals`: whether the default graceful controller listens to OS signals
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Application name, used in logs and [`AppInfo`](crate::AppInfo).
    pub name: String,

    /// Application version, bound as a process-wide constant.
    pub version: String,

    /// Number of background job workers.
    ///
    /// At most this many jobs submitted through [`App::async_run`](crate::App::async_run)
    /// execute concurrently.
    pub async_workers: usize,

    /// Deadline for each individual reload/shutdown handler.
    ///
    /// A handler that runs longer is abandoned (it may keep running in the
    /// background) and the next handler starts.
    ///
    /// With `0s` handlers get no individual deadline and the default controller
    /// caps the whole sequence by [`shutdown_timeout`](Self::shutdown_timeout).
    /// Setting both to `0s` gives up the bounded shutdown guarantee.
    pub handler_timeout: Duration,

    /// Deadline for joining daemons, services and the job pool once all
    /// shutdown handlers returned.
    pub shutdown_timeout: Duration,

    /// Listen to SIGINT/SIGTERM/SIGQUIT (shutdown) and SIGHUP (reload).
    ///
    /// Disable in tests or when another layer owns signal handling; programmatic
    /// triggers keep working either way.
    pub os_signals: bool,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,
}

impl AppConfig {
    /// Returns the job pool size, never below 1.
    #[inline]
    pub fn workers(&self) -> usize {
        self.async_workers.max(1)
    }

    /// Returns the per-handler timeout as an `Option`.
    ///
    /// - `None` → wait for each handler until it completes
    /// - `Some(d)` → abandon a handler after `d`
    #[inline]
    pub fn handler_timeout(&self) -> Option<Duration> {
        if self.handler_timeout == Duration::ZERO {
            None
        } else {
            Some(self.handler_timeout)
        }
    }

    /// Returns the overall shutdown join deadline.
    #[inline]
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for AppConfig {
    /// Default configuration:
    ///
    /// - `name = "app"`, `version = "0.0.0"`
    /// - `async_workers = 4`
    /// - `handler_timeout = 5s`
    /// - `shutdown_timeout = 30s`
    /// - `os_signals = true`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            name: "app".to_string(),
            version: "0.0.0".to_string(),
            async_workers: 4,
            handler_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(30),
            os_signals: true,
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        let cfg = AppConfig {
            async_workers: 0,
            handler_timeout: Duration::ZERO,
            bus_capacity: 0,
            ..AppConfig::default()
        };
        assert_eq!(cfg.workers(), 1);
        assert_eq!(cfg.handler_timeout(), None);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.workers(), 4);
        assert_eq!(cfg.handler_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(cfg.shutdown_timeout(), Duration::from_secs(30));
        assert!(cfg.os_signals);
    }
}
