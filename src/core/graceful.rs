//! # Graceful reload/shutdown controller.
//!
//! ```text
//! start():
//!   loop {
//!     select! {
//!       trigger (reload()/shutdown()) ─┐
//!       OS signal (optional) ──────────┴─► Signal
//!     }
//!     Reload   ─► ReloadRequested   ─► spawn(run reload handlers)   ─► keep waiting
//!     Shutdown ─► ShutdownRequested ─► run shutdown handlers        ─► return Ok
//!   }
//!
//! run handlers(snapshot):
//!   for h in snapshot.rev():             (last registered runs first)
//!     spawn(h) ─► race timeout
//!                   ├─ done     ─► next
//!                   ├─ panic    ─► HandlerPanicked, next
//!                   └─ timeout  ─► HandlerTimedOut, handler abandoned, next
//! ```
//!
//! ## Rules
//! - Handlers run one at a time; sequences never overlap (one lock).
//! - A slow handler delays the sequence by at most one handler timeout.
//! - With a sequence timeout, every handler gets at most what is left of it;
//!   handlers still queued once it is spent are abandoned right away.
//! - The handler list is snapshotted when a sequence begins; later registrations
//!   take part in the next sequence only.
//! - Triggers sent before [`Graceful::start`] are queued, not lost.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::time::Instant;
use tracing::debug;

use super::config::AppConfig;
use super::lock;
use super::shutdown::{Signal, Signals};
use crate::error::{GracefulError, panic_message};
use crate::events::{Bus, Event, EventKind};

type HandlerFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Named reload or shutdown callback.
#[derive(Clone)]
pub struct Handler {
    name: Arc<str>,
    f: HandlerFn,
}

impl Handler {
    /// Creates a handler from a closure producing the handler's future.
    pub fn new<F, Fut>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            name: name.into(),
            f: Arc::new(move || Box::pin(f())),
        }
    }

    /// Handler name (for logs/events).
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("name", &self.name).finish()
    }
}

/// # Reload/shutdown controller contract.
///
/// The application registers handlers while starting, then blocks on
/// [`start`](Graceful::start) until the shutdown sequence finished.
#[async_trait]
pub trait Graceful: Send + Sync + 'static {
    /// Registers a reload handler.
    fn add_reload_handler(&self, handler: Handler);

    /// Registers a shutdown handler.
    fn add_shutdown_handler(&self, handler: Handler);

    /// Requests a reload sequence. Never blocks.
    fn reload(&self);

    /// Requests the shutdown sequence. Never blocks.
    fn shutdown(&self);

    /// Waits for triggers and runs the matching sequences; returns after shutdown.
    async fn start(&self) -> Result<(), GracefulError>;
}

struct Inner {
    handler_timeout: Option<Duration>,
    bus: Bus,
    reload_handlers: Mutex<Vec<Handler>>,
    shutdown_handlers: Mutex<Vec<Handler>>,
    sequence: AsyncMutex<()>,
}

/// Default [`Graceful`] implementation driven by explicit triggers and, optionally,
/// OS signals (`SIGINT`/`SIGTERM`/`SIGQUIT` shut down, `SIGHUP` reloads).
pub struct SignalGraceful {
    inner: Arc<Inner>,
    os_signals: bool,
    sequence_timeout: Option<Duration>,
    tx: mpsc::UnboundedSender<Signal>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Signal>>>,
}

impl SignalGraceful {
    /// Creates a controller.
    ///
    /// `handler_timeout` of `None` lets every handler run to completion.
    pub fn new(handler_timeout: Option<Duration>, os_signals: bool, bus: Bus) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                handler_timeout,
                bus,
                reload_handlers: Mutex::new(Vec::new()),
                shutdown_handlers: Mutex::new(Vec::new()),
                sequence: AsyncMutex::new(()),
            }),
            os_signals,
            sequence_timeout: None,
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Bounds each whole reload/shutdown sequence by `limit`.
    pub fn with_sequence_timeout(mut self, limit: Duration) -> Self {
        self.sequence_timeout = Some(limit);
        self
    }

    /// Creates a controller using the timeouts and signal settings of `cfg`.
    ///
    /// Without a per-handler timeout the sequences are bounded by
    /// `shutdown_timeout` instead, unless that is `0s` too.
    pub fn from_config(cfg: &AppConfig, bus: Bus) -> Self {
        let graceful = Self::new(cfg.handler_timeout(), cfg.os_signals, bus);
        match cfg.handler_timeout() {
            None if cfg.shutdown_timeout() > Duration::ZERO => {
                graceful.with_sequence_timeout(cfg.shutdown_timeout())
            }
            _ => graceful,
        }
    }

    fn take_receiver(&self) -> Option<mpsc::UnboundedReceiver<Signal>> {
        lock(&self.rx).take()
    }
}

#[async_trait]
impl Graceful for SignalGraceful {
    fn add_reload_handler(&self, handler: Handler) {
        lock(&self.inner.reload_handlers).push(handler);
    }

    fn add_shutdown_handler(&self, handler: Handler) {
        lock(&self.inner.shutdown_handlers).push(handler);
    }

    fn reload(&self) {
        let _ = self.tx.send(Signal::Reload);
    }

    fn shutdown(&self) {
        let _ = self.tx.send(Signal::Shutdown);
    }

    async fn start(&self) -> Result<(), GracefulError> {
        let mut rx = self.take_receiver().ok_or(GracefulError::AlreadyRunning)?;
        let mut signals = if self.os_signals {
            Some(Signals::install()?)
        } else {
            None
        };

        loop {
            let signal = tokio::select! {
                Some(signal) = rx.recv() => signal,
                signal = os_signal(&mut signals) => signal,
            };

            match signal {
                Signal::Reload => {
                    self.inner.bus.publish(Event::new(EventKind::ReloadRequested));
                    let inner = Arc::clone(&self.inner);
                    let budget = self.sequence_timeout;
                    tokio::spawn(async move {
                        let handlers = lock(&inner.reload_handlers).clone();
                        inner.run_sequence(handlers, budget).await;
                    });
                }
                Signal::Shutdown => {
                    self.inner.bus.publish(Event::new(EventKind::ShutdownRequested));
                    let handlers = lock(&self.inner.shutdown_handlers).clone();
                    self.inner.run_sequence(handlers, self.sequence_timeout).await;
                    return Ok(());
                }
            }
        }
    }
}

impl Inner {
    async fn run_sequence(&self, handlers: Vec<Handler>, budget: Option<Duration>) {
        let _guard = self.sequence.lock().await;
        let deadline = budget.map(|budget| Instant::now() + budget);
        for handler in handlers.iter().rev() {
            let left = deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()));
            let limit = match (self.handler_timeout, left) {
                (Some(per_handler), Some(left)) => Some(per_handler.min(left)),
                (per_handler, left) => per_handler.or(left),
            };
            self.run_handler(handler, limit).await;
        }
    }

    async fn run_handler(&self, handler: &Handler, limit: Option<Duration>) {
        debug!(handler = %handler.name, "running graceful handler");
        let task = tokio::spawn((handler.f)());
        let joined = match limit {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_elapsed) => {
                    self.bus.publish(
                        Event::new(EventKind::HandlerTimedOut)
                            .with_component(Arc::clone(&handler.name))
                            .with_timeout(limit),
                    );
                    return;
                }
            },
            None => task.await,
        };

        if let Err(err) = joined
            && err.is_panic()
        {
            self.bus.publish(
                Event::new(EventKind::HandlerPanicked)
                    .with_component(Arc::clone(&handler.name))
                    .with_reason(panic_message(err.into_panic().as_ref())),
            );
        }
    }
}

async fn os_signal(signals: &mut Option<Signals>) -> Signal {
    match signals {
        Some(signals) => signals.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn controller(timeout: Duration, bus: Bus) -> Arc<SignalGraceful> {
        Arc::new(SignalGraceful::new(Some(timeout), false, bus))
    }

    fn recording(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Handler {
        let log = Arc::clone(log);
        Handler::new(name, move || {
            let log = Arc::clone(&log);
            async move { log.lock().unwrap().push(name) }
        })
    }

    #[tokio::test]
    async fn test_shutdown_handlers_run_in_reverse_order() {
        let g = controller(Duration::from_secs(1), Bus::new(16));
        let log = Arc::new(Mutex::new(Vec::new()));
        for name in ["h1", "h2", "h3"] {
            g.add_shutdown_handler(recording(name, &log));
        }

        g.shutdown();
        g.start().await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["h3", "h2", "h1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_handler_is_abandoned_after_timeout() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let g = controller(Duration::from_secs(5), bus);
        let log = Arc::new(Mutex::new(Vec::new()));

        g.add_shutdown_handler(recording("a", &log));
        g.add_shutdown_handler(Handler::new("b", || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }));

        let started = Instant::now();
        g.shutdown();
        g.start().await.unwrap();
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_secs(5));
        assert!(elapsed < Duration::from_secs(6));
        assert_eq!(*log.lock().unwrap(), vec!["a"]);

        let mut timed_out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::HandlerTimedOut {
                timed_out.push((ev.component.clone(), ev.timeout_ms));
            }
        }
        assert_eq!(timed_out, vec![(Some(Arc::from("b")), Some(5000))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_handlers_capped_by_sequence_timeout() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let cfg = AppConfig {
            handler_timeout: Duration::ZERO,
            shutdown_timeout: Duration::from_secs(3),
            os_signals: false,
            ..AppConfig::default()
        };
        let g = SignalGraceful::from_config(&cfg, bus);
        g.add_shutdown_handler(Handler::new("quick", || async {}));
        g.add_shutdown_handler(Handler::new("stuck", || std::future::pending::<()>()));

        let started = Instant::now();
        g.shutdown();
        g.start().await.unwrap();
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_secs(4));

        let timed_out: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|ev| ev.kind == EventKind::HandlerTimedOut)
            .filter_map(|ev| ev.component)
            .collect();
        assert_eq!(timed_out.first().map(|name| &**name), Some("stuck"));
    }

    #[tokio::test]
    async fn test_panicking_handler_does_not_stop_sequence() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let g = controller(Duration::from_secs(1), bus);
        let log = Arc::new(Mutex::new(Vec::new()));

        g.add_shutdown_handler(recording("after", &log));
        g.add_shutdown_handler(Handler::new("bad", || async { panic!("handler exploded") }));

        g.shutdown();
        g.start().await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["after"]);

        let panicked: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|ev| ev.kind == EventKind::HandlerPanicked)
            .collect();
        assert_eq!(panicked.len(), 1);
        assert_eq!(panicked[0].reason.as_deref(), Some("handler exploded"));
    }

    #[tokio::test]
    async fn test_reload_runs_and_keeps_waiting() {
        let g = controller(Duration::from_secs(1), Bus::new(16));
        let reloads = Arc::new(AtomicUsize::new(0));
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<()>();
        {
            let reloads = Arc::clone(&reloads);
            g.add_reload_handler(Handler::new("reload", move || {
                let reloads = Arc::clone(&reloads);
                let done_tx = done_tx.clone();
                async move {
                    reloads.fetch_add(1, Ordering::SeqCst);
                    let _ = done_tx.send(());
                }
            }));
        }

        let runner = {
            let g = Arc::clone(&g);
            tokio::spawn(async move { g.start().await })
        };

        g.reload();
        done_rx.recv().await.unwrap();
        g.reload();
        done_rx.recv().await.unwrap();
        assert!(!runner.is_finished());

        g.shutdown();
        runner.await.unwrap().unwrap();
        assert_eq!(reloads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let g = controller(Duration::from_secs(1), Bus::new(16));
        g.shutdown();
        g.start().await.unwrap();

        let err = g.start().await.unwrap_err();
        assert_eq!(err.as_label(), "graceful_already_running");
    }
}
