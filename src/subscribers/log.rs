//! # LogWriter: forwards lifecycle events to `tracing`
//!
//! Installed by default by [`AppBuilder`](crate::AppBuilder) (feature `logging`).
//! Level mapping:
//!
//! | Level   | Events                                                                     |
//! |---------|----------------------------------------------------------------------------|
//! | `error` | job/handler/subscriber panics, job, service and ready hook failures, grace exceeded, startup failure |
//! | `warn`  | handler timeouts, dropped jobs, duplicate components, subscriber overflow |
//! | `info`  | ready, reload/shutdown requests, all stopped                                |
//! | `debug` | stage transitions, skipped components, daemon exits                         |

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let component = e.component.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::StageEntered => {
                debug!(stage = e.stage.unwrap_or("-"), "entering stage");
            }
            EventKind::AppReady => info!("application ready"),
            EventKind::StartupFailed => {
                error!(stage = e.stage.unwrap_or("-"), %reason, "startup failed");
            }
            EventKind::ComponentSkipped => {
                debug!(%component, "should_load returned false, skipping");
            }
            EventKind::DuplicateComponent => {
                warn!(%component, "component registered more than once");
            }
            EventKind::DaemonExited => match &e.reason {
                Some(reason) => error!(%component, %reason, "daemon exited abnormally"),
                None => debug!(%component, "daemon exited"),
            },
            EventKind::ServiceFailed => error!(%component, %reason, "service failed"),
            EventKind::ReadyHookFailed => error!(%reason, "on-ready hook failed"),
            EventKind::JobFailed => error!(%reason, "async job failed"),
            EventKind::JobPanicked => error!(%reason, "async job panicked"),
            EventKind::JobDropped => warn!("async job submitted after shutdown, dropped"),
            EventKind::ReloadRequested => info!("reload requested"),
            EventKind::ShutdownRequested => info!("shutdown requested"),
            EventKind::HandlerTimedOut => {
                warn!(handler = %component, timeout_ms = ?e.timeout_ms, "graceful handler timed out");
            }
            EventKind::HandlerPanicked => {
                error!(handler = %component, %reason, "graceful handler panicked");
            }
            EventKind::AllStoppedWithin => info!("all background work stopped"),
            EventKind::GraceExceeded => {
                error!(timeout_ms = ?e.timeout_ms, "shutdown timeout exceeded, exiting anyway");
            }
            EventKind::SubscriberOverflow => {
                warn!(subscriber = %component, %reason, "subscriber dropped an event");
            }
            EventKind::SubscriberPanicked => {
                error!(subscriber = %component, %reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
