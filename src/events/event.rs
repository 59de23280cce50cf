//! # Lifecycle events emitted by the runtime.
//!
//! The [`EventKind`] enum classifies event types across four groups:
//! - **Stage events**: bootstrap progress (stage entered, ready, startup failed)
//! - **Component events**: registry decisions and runtime failures of daemons/services/hooks
//! - **Job events**: background job failures, panics and dropped submissions
//! - **Graceful events**: reload/shutdown triggers, handler timeouts and panics, final join
//!
//! The [`Event`] struct carries optional metadata such as the component name,
//! the stage, a reason and a timeout.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use appvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::HandlerTimedOut)
//!     .with_component("stop:http")
//!     .with_timeout(Duration::from_secs(5));
//!
//! assert_eq!(ev.kind, EventKind::HandlerTimedOut);
//! assert_eq!(ev.component.as_deref(), Some("stop:http"));
//! assert_eq!(ev.timeout_ms, Some(5000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets `component` (subscriber name) and `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets `component` (subscriber name) and `reason` (`full` / `closed`).
    SubscriberOverflow,

    // === Stage events ===
    /// The sequencer entered a bootstrap stage.
    ///
    /// Sets `stage`.
    StageEntered,

    /// Every provider and service started; status flipped to `Started`.
    AppReady,

    /// Startup aborted; the error is returned to the caller as well.
    ///
    /// Sets `stage` and `reason`.
    StartupFailed,

    // === Component events ===
    /// A conditional component returned `false` from `should_load`.
    ///
    /// Sets `component`.
    ComponentSkipped,

    /// The same component type was registered more than once (allowed, suspicious).
    ///
    /// Sets `component`.
    DuplicateComponent,

    /// A daemon provider returned.
    ///
    /// Sets `component`; `reason` when it panicked.
    DaemonExited,

    /// A service's `start` failed or panicked.
    ///
    /// Sets `component` and `reason`.
    ServiceFailed,

    /// An on-ready hook failed or panicked.
    ///
    /// Sets `reason`.
    ReadyHookFailed,

    // === Job events ===
    /// A background job returned an error.
    ///
    /// Sets `reason`.
    JobFailed,

    /// A background job panicked; its worker keeps running.
    ///
    /// Sets `reason`.
    JobPanicked,

    /// A job was submitted after the pool closed and was dropped.
    JobDropped,

    // === Graceful events ===
    /// Reload requested (signal or programmatic trigger).
    ReloadRequested,

    /// Shutdown requested (signal or programmatic trigger).
    ShutdownRequested,

    /// A graceful handler exceeded its timeout and was abandoned.
    ///
    /// Sets `component` (handler name) and `timeout_ms`.
    HandlerTimedOut,

    /// A graceful handler panicked; treated as complete.
    ///
    /// Sets `component` (handler name) and `reason`.
    HandlerPanicked,

    /// Daemons, services and jobs all stopped within the shutdown timeout.
    AllStoppedWithin,

    /// The shutdown timeout elapsed before outstanding work stopped.
    ///
    /// Sets `timeout_ms`.
    GraceExceeded,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Provider, service, handler or subscriber name, if applicable.
    pub component: Option<Arc<str>>,
    /// Bootstrap stage, if applicable.
    pub stage: Option<&'static str>,
    /// Human-readable reason (errors, panics, overflow details).
    pub reason: Option<Arc<str>>,
    /// Timeout involved, in milliseconds (compact).
    pub timeout_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            component: None,
            stage: None,
            reason: None,
            timeout_ms: None,
        }
    }

    /// Attaches a component name.
    #[inline]
    pub fn with_component(mut self, name: impl Into<Arc<str>>) -> Self {
        self.component = Some(name.into());
        self
    }

    /// Attaches a bootstrap stage.
    #[inline]
    pub fn with_stage(mut self, stage: &'static str) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_component(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_component(subscriber)
            .with_reason(info)
    }

    /// Creates a stage-entered event.
    #[inline]
    pub fn stage(stage: &'static str) -> Self {
        Event::new(EventKind::StageEntered).with_stage(stage)
    }

    /// Returns true for subscriber bookkeeping events (never re-published on overflow).
    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::JobFailed);
        let b = Event::new(EventKind::JobFailed);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_timeout_saturates() {
        let ev = Event::new(EventKind::GraceExceeded).with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }
}
