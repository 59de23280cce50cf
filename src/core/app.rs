//! # Staged bootstrap sequencer.
//!
//! [`App`] owns the registry, the status and the job pool, and drives every
//! component through a strictly ordered set of stages:
//!
//! ```text
//! run()
//!  ├─ init           user init hooks (no component access)
//!  ├─ bind           AppInfo, flags, graceful, JobHandle, CancellationToken,
//!  │                 queued singleton/prototype constructors, pre-bind hooks
//!  │                 status → Initialized
//!  ├─ register       filter providers/services, Provider::register in priority order
//!  ├─ pool           job pool started, buffered jobs drained
//!  ├─ init_services  Service::init in priority order
//!  ├─ boot           Boot::boot in priority order
//!  ├─ daemons        Daemon::daemon on tracked tasks (cancellation token)
//!  ├─ services       Service::start on tracked tasks
//!  ├─ ready          status → Started, on-ready hooks fire concurrently
//!  ├─ run            stop/reload handlers registered, Graceful::start blocks
//!  └─ shutdown       join daemons + services + pool within shutdown_timeout
//! ```
//!
//! ## Failure semantics
//! - Any error before `ready` aborts startup: launched work is cancelled and joined
//!   (bounded), `StartupFailed` is published and the error returned.
//! - A panic anywhere in the sequence is caught, logged with a backtrace and
//!   returned as [`AppError::Panicked`].
//! - Once started, failures of daemons, services, hooks and jobs are published as
//!   events and never returned.
//! - An overall shutdown timeout miss publishes `GraceExceeded`; `run` still
//!   returns `Ok(())`.

use std::backtrace::Backtrace;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime};

use futures::FutureExt;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

use super::config::AppConfig;
use super::graceful::{Graceful, Handler};
use super::lock;
use super::pool::JobPool;
use super::registry::Registry;
use super::status::{Status, StatusCell};
use crate::components::{ProviderEntry, ProviderRef, ServiceEntry, ServiceRef};
use crate::container::{Binder, BinderExt, FlagContext, Resolver};
use crate::error::{AppError, ConfigError, panic_message};
use crate::events::{Bus, Event, EventKind};
use crate::jobs::Job;
use crate::subscribers::{Subscribe, SubscriberSet};

const STAGE_INIT: &str = "init";
const STAGE_BIND: &str = "bind";
const STAGE_REGISTER: &str = "register";
const STAGE_POOL: &str = "pool";
const STAGE_INIT_SERVICES: &str = "init_services";
const STAGE_BOOT: &str = "boot";
const STAGE_DAEMONS: &str = "daemons";
const STAGE_SERVICES: &str = "services";
const STAGE_READY: &str = "ready";
const STAGE_RUN: &str = "run";
const STAGE_SHUTDOWN: &str = "shutdown";

type InitHook = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;
type PreBindHook = Box<dyn FnOnce(&dyn Binder) -> anyhow::Result<()> + Send>;
type QueuedBinding = Box<dyn FnOnce(&dyn Binder) + Send>;

/// Process-wide constants bound during the bind stage.
#[derive(Clone, Debug)]
pub struct AppInfo {
    /// [`AppConfig::name`].
    pub name: String,
    /// [`AppConfig::version`].
    pub version: String,
    /// Wall-clock time the bind stage ran.
    pub started_at: SystemTime,
}

/// Everything registered before `run`; consumed when `run` starts.
struct Setup {
    registry: Registry,
    init_hooks: Vec<InitHook>,
    pre_bind_hooks: Vec<PreBindHook>,
    ready_hooks: Vec<Job>,
}

#[derive(Default)]
struct Bindings {
    queued: Vec<QueuedBinding>,
    bound: bool,
}

struct Listener {
    rx: broadcast::Receiver<Event>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

pub(crate) struct AppParts {
    pub(crate) cfg: AppConfig,
    pub(crate) bus: Bus,
    pub(crate) subscribers: Vec<Arc<dyn Subscribe>>,
    pub(crate) resolver: Arc<dyn Resolver>,
    pub(crate) graceful: Arc<dyn Graceful>,
    pub(crate) flags: Arc<dyn FlagContext>,
}

struct Inner {
    cfg: AppConfig,
    bus: Bus,
    resolver: Arc<dyn Resolver>,
    graceful: Arc<dyn Graceful>,
    flags: Arc<dyn FlagContext>,
    pool: Arc<JobPool>,
    token: CancellationToken,
    status: StatusCell,
    stage: Mutex<&'static str>,
    setup: Mutex<Option<Setup>>,
    bindings: Mutex<Bindings>,
    listener: Mutex<Option<Listener>>,
    /// Daemons and services.
    work: TaskTracker,
    ready: TaskTracker,
}

/// # Application lifecycle orchestrator.
///
/// Built with [`AppBuilder`](crate::AppBuilder). Cheap to clone: clones share the
/// same registry, status and controllers.
///
/// Registration methods (`provider`, `service`, hooks) are accepted until [`run`](App::run)
/// is called. `singleton`/`prototype` are accepted until the application started.
#[derive(Clone)]
pub struct App {
    inner: Arc<Inner>,
}

impl App {
    /// Creates an application with default subscribers, resolver and controller.
    pub fn new(cfg: AppConfig) -> Self {
        crate::AppBuilder::new(cfg).build()
    }

    pub(crate) fn from_parts(parts: AppParts) -> Self {
        let AppParts {
            cfg,
            bus,
            subscribers,
            resolver,
            graceful,
            flags,
        } = parts;

        let listener = Listener {
            rx: bus.subscribe(),
            subscribers,
        };
        let pool = JobPool::new(cfg.workers(), bus.clone());
        let setup = Setup {
            registry: Registry::new(bus.clone()),
            init_hooks: Vec::new(),
            pre_bind_hooks: Vec::new(),
            ready_hooks: Vec::new(),
        };

        Self {
            inner: Arc::new(Inner {
                cfg,
                bus,
                resolver,
                graceful,
                flags,
                pool,
                token: CancellationToken::new(),
                status: StatusCell::default(),
                stage: Mutex::new(STAGE_INIT),
                setup: Mutex::new(Some(setup)),
                bindings: Mutex::new(Bindings::default()),
                listener: Mutex::new(Some(listener)),
                work: TaskTracker::new(),
                ready: TaskTracker::new(),
            }),
        }
    }

    /// Current lifecycle status.
    pub fn status(&self) -> Status {
        self.inner.status.get()
    }

    /// Configuration the application was built with.
    pub fn config(&self) -> &AppConfig {
        &self.inner.cfg
    }

    /// The resolver components are wired through.
    pub fn resolver(&self) -> Arc<dyn Resolver> {
        Arc::clone(&self.inner.resolver)
    }

    /// Process-wide cancellation token, cancelled when shutdown begins.
    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// Registers a provider. Its aggregate tree is validated immediately.
    pub fn provider(&self, provider: ProviderRef) -> Result<(), ConfigError> {
        self.with_setup("provider", |setup| setup.registry.add_provider(provider))?
    }

    /// Registers a service.
    pub fn service(&self, service: ServiceRef) -> Result<(), ConfigError> {
        self.with_setup("service", |setup| setup.registry.add_service(service))
    }

    /// Registers a lazily constructed shared instance of `T`.
    ///
    /// Queued until the bind stage, bound immediately afterwards, rejected once the
    /// application started.
    pub fn singleton<T, F>(&self, factory: F) -> Result<(), ConfigError>
    where
        T: std::any::Any + Send + Sync,
        F: Fn(&dyn Resolver) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.bind_or_queue("singleton", Box::new(move |b: &dyn Binder| b.singleton(factory)))
    }

    /// Registers a constructor producing a fresh `T` on every resolution.
    ///
    /// Same timing rules as [`singleton`](App::singleton).
    pub fn prototype<T, F>(&self, factory: F) -> Result<(), ConfigError>
    where
        T: std::any::Any + Send + Sync,
        F: Fn(&dyn Resolver) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.bind_or_queue("prototype", Box::new(move |b: &dyn Binder| b.prototype(factory)))
    }

    /// Submits a background job.
    ///
    /// Before the pool stage the job is buffered; afterwards it is queued for the
    /// next free worker. After shutdown it is dropped with a `JobDropped` event.
    pub fn async_run<F, Fut>(&self, f: F)
    where
        F: FnOnce(Arc<dyn Resolver>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.inner.pool.submit(Job::new(f));
    }

    /// Adds a hook run first in the init stage, before anything is bound.
    pub fn on_init<F>(&self, hook: F) -> Result<(), ConfigError>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.with_setup("on_init", |setup| setup.init_hooks.push(Box::new(hook)))
    }

    /// Adds a hook with direct binder access, run at the end of the bind stage
    /// before any component is resolved. Bindings made here replace defaults.
    pub fn pre_bind<F>(&self, hook: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&dyn Binder) -> anyhow::Result<()> + Send + 'static,
    {
        self.with_setup("pre_bind", |setup| setup.pre_bind_hooks.push(Box::new(hook)))
    }

    /// Adds a hook fired once every provider and service started.
    ///
    /// Hooks run concurrently; errors and panics are published, never returned.
    pub fn on_ready<F, Fut>(&self, hook: F) -> Result<(), ConfigError>
    where
        F: FnOnce(Arc<dyn Resolver>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.with_setup("on_ready", |setup| setup.ready_hooks.push(Job::new(hook)))
    }

    /// Requests the shutdown sequence.
    pub fn shutdown(&self) {
        self.inner.graceful.shutdown();
    }

    /// Requests a reload sequence.
    pub fn reload(&self) {
        self.inner.graceful.reload();
    }

    /// Runs the whole lifecycle; returns after shutdown completed.
    ///
    /// Only configuration and startup errors are returned. Calling `run` a second
    /// time returns [`AppError::AlreadyStarted`].
    pub async fn run(&self) -> Result<(), AppError> {
        let setup = lock(&self.inner.setup)
            .take()
            .ok_or(AppError::AlreadyStarted)?;

        let started = Instant::now();
        let listener = self.spawn_listener();

        let outcome = AssertUnwindSafe(self.lifecycle(setup)).catch_unwind().await;
        let result = match outcome {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                let stage = self.stage();
                let backtrace = Backtrace::force_capture();
                error!(%message, stage, %backtrace, "application panicked");
                Err(AppError::Panicked {
                    message,
                    stage,
                    after: started.elapsed(),
                })
            }
        };

        if let Err(err) = &result {
            self.teardown().await;
            self.inner.bus.publish(
                Event::new(EventKind::StartupFailed)
                    .with_stage(self.stage())
                    .with_reason(err.to_string()),
            );
        }

        if let Some((stop, handle)) = listener {
            stop.cancel();
            let _ = handle.await;
        }
        result
    }

    async fn lifecycle(&self, setup: Setup) -> Result<(), AppError> {
        let Setup {
            registry,
            init_hooks,
            pre_bind_hooks,
            ready_hooks,
        } = setup;
        let resolver = &self.inner.resolver;

        self.enter(STAGE_INIT);
        for hook in init_hooks {
            hook().map_err(AppError::Init)?;
        }

        self.enter(STAGE_BIND);
        self.bind(pre_bind_hooks)?;
        self.inner.status.advance(Status::Initialized);

        self.enter(STAGE_REGISTER);
        let providers = registry.filter_providers(&**resolver)?;
        for entry in &providers {
            entry
                .provider()
                .register(resolver.as_binder())
                .map_err(|source| AppError::Register {
                    provider: entry.name().to_string(),
                    source,
                })?;
        }
        let services = registry.filter_services(&**resolver)?;
        debug!(
            providers = providers.len(),
            services = services.len(),
            "components registered"
        );

        self.enter(STAGE_POOL);
        let drained = self.inner.pool.start(Arc::clone(resolver));
        debug!(drained, "buffered jobs handed to the pool");

        self.enter(STAGE_INIT_SERVICES);
        for entry in &services {
            entry
                .service()
                .init(Arc::clone(resolver))
                .await
                .map_err(|source| AppError::InitService {
                    service: entry.name().to_string(),
                    source,
                })?;
        }

        self.enter(STAGE_BOOT);
        for entry in &providers {
            if let Some(boot) = entry.provider().as_boot() {
                boot.boot(Arc::clone(resolver))
                    .await
                    .map_err(|source| AppError::Boot {
                        provider: entry.name().to_string(),
                        source,
                    })?;
            }
        }

        self.enter(STAGE_DAEMONS);
        for entry in &providers {
            self.spawn_daemon(entry);
        }

        self.enter(STAGE_SERVICES);
        for entry in &services {
            self.spawn_service(entry);
        }

        self.enter(STAGE_READY);
        self.inner.status.advance(Status::Started);
        self.inner.bus.publish(Event::new(EventKind::AppReady));
        self.fire_ready_hooks(ready_hooks);

        self.enter(STAGE_RUN);
        self.register_handlers(&services);
        self.inner.graceful.start().await?;

        self.enter(STAGE_SHUTDOWN);
        self.drain_work().await;
        Ok(())
    }

    fn bind(&self, pre_bind_hooks: Vec<PreBindHook>) -> Result<(), AppError> {
        let resolver = &self.inner.resolver;
        resolver.bind_value(AppInfo {
            name: self.inner.cfg.name.clone(),
            version: self.inner.cfg.version.clone(),
            started_at: SystemTime::now(),
        });
        resolver.bind_value(Arc::clone(&self.inner.flags));
        resolver.bind_value(Arc::clone(&self.inner.graceful));
        resolver.bind_value(self.inner.pool.handle());
        resolver.bind_value(self.inner.token.clone());

        {
            let mut bindings = lock(&self.inner.bindings);
            for queued in bindings.queued.drain(..) {
                queued(resolver.as_binder());
            }
            bindings.bound = true;
        }

        for hook in pre_bind_hooks {
            hook(resolver.as_binder()).map_err(AppError::Bind)?;
        }
        Ok(())
    }

    fn spawn_daemon(&self, entry: &ProviderEntry) {
        if entry.provider().as_daemon().is_none() {
            return;
        }
        let provider = Arc::clone(entry.provider());
        let name = entry.name_arc();
        let resolver = Arc::clone(&self.inner.resolver);
        let token = self.inner.token.clone();
        let bus = self.inner.bus.clone();

        self.inner.work.spawn(async move {
            let Some(daemon) = provider.as_daemon() else {
                return;
            };
            let outcome = AssertUnwindSafe(daemon.daemon(token, resolver))
                .catch_unwind()
                .await;
            let ev = Event::new(EventKind::DaemonExited).with_component(name);
            let ev = match outcome {
                Ok(Ok(())) => ev,
                Ok(Err(err)) => ev.with_reason(format!("{err:#}")),
                Err(panic) => ev.with_reason(panic_message(panic.as_ref())),
            };
            bus.publish(ev);
        });
    }

    fn spawn_service(&self, entry: &ServiceEntry) {
        let service = Arc::clone(entry.service());
        let name = entry.name_arc();
        let bus = self.inner.bus.clone();

        self.inner.work.spawn(async move {
            let reason = match AssertUnwindSafe(service.start()).catch_unwind().await {
                Ok(Ok(())) => return,
                Ok(Err(err)) => format!("{err:#}"),
                Err(panic) => panic_message(panic.as_ref()),
            };
            bus.publish(
                Event::new(EventKind::ServiceFailed)
                    .with_component(name)
                    .with_reason(reason),
            );
        });
    }

    fn fire_ready_hooks(&self, hooks: Vec<Job>) {
        for hook in hooks {
            let resolver = Arc::clone(&self.inner.resolver);
            let bus = self.inner.bus.clone();
            self.inner.ready.spawn(async move {
                let fut = async move { hook.call(resolver).await };
                let reason = match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(Ok(())) => return,
                    Ok(Err(err)) => format!("{err:#}"),
                    Err(panic) => panic_message(panic.as_ref()),
                };
                bus.publish(Event::new(EventKind::ReadyHookFailed).with_reason(reason));
            });
        }
        self.inner.ready.close();

        let ready = self.inner.ready.clone();
        self.inner
            .graceful
            .add_shutdown_handler(Handler::new("join:ready-hooks", move || {
                let ready = ready.clone();
                async move { ready.wait().await }
            }));
    }

    /// Stop handlers follow start order, so the controller's reversal stops services
    /// in the mirror order. The cancel handler is added last and therefore runs first.
    fn register_handlers(&self, services: &[ServiceEntry]) {
        let graceful = &self.inner.graceful;
        for entry in services {
            let service = Arc::clone(entry.service());
            graceful.add_shutdown_handler(Handler::new(
                format!("stop:{}", entry.name()),
                move || {
                    let service = Arc::clone(&service);
                    async move { service.stop().await }
                },
            ));

            let service = Arc::clone(entry.service());
            graceful.add_reload_handler(Handler::new(
                format!("reload:{}", entry.name()),
                move || {
                    let service = Arc::clone(&service);
                    async move { service.reload().await }
                },
            ));
        }

        let token = self.inner.token.clone();
        graceful.add_shutdown_handler(Handler::new("cancel", move || {
            let token = token.clone();
            async move { token.cancel() }
        }));
    }

    /// Cancels, closes and joins daemons, services and the pool within the
    /// overall shutdown timeout.
    async fn drain_work(&self) {
        self.inner.token.cancel();
        self.inner.pool.close();
        self.inner.work.close();

        let limit = self.inner.cfg.shutdown_timeout();
        let join = async {
            tokio::join!(self.inner.work.wait(), self.inner.pool.wait());
        };
        match tokio::time::timeout(limit, join).await {
            Ok(()) => self.inner.bus.publish(Event::new(EventKind::AllStoppedWithin)),
            Err(_elapsed) => self
                .inner
                .bus
                .publish(Event::new(EventKind::GraceExceeded).with_timeout(limit)),
        }
    }

    async fn teardown(&self) {
        debug!(stage = self.stage(), "tearing down after failed startup");
        self.drain_work().await;
    }

    fn spawn_listener(&self) -> Option<(CancellationToken, JoinHandle<()>)> {
        let Listener {
            mut rx,
            subscribers,
        } = lock(&self.inner.listener).take()?;
        let bus = self.inner.bus.clone();
        let stop = CancellationToken::new();
        let stopped = stop.clone();

        let handle = tokio::spawn(async move {
            let set = SubscriberSet::new(subscribers, bus);
            loop {
                tokio::select! {
                    biased;
                    ev = rx.recv() => match ev {
                        Ok(ev) => set.emit(ev),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "event listener lagged behind the bus");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = stopped.cancelled() => {
                        loop {
                            match rx.try_recv() {
                                Ok(ev) => set.emit(ev),
                                Err(TryRecvError::Lagged(_)) => continue,
                                Err(_) => break,
                            }
                        }
                        break;
                    }
                }
            }
            set.shutdown().await;
        });
        Some((stop, handle))
    }

    fn with_setup<R>(
        &self,
        method: &'static str,
        f: impl FnOnce(&mut Setup) -> R,
    ) -> Result<R, ConfigError> {
        match lock(&self.inner.setup).as_mut() {
            Some(setup) => Ok(f(setup)),
            None => Err(ConfigError::AlreadyStarted { method }),
        }
    }

    fn bind_or_queue(&self, method: &'static str, bind: QueuedBinding) -> Result<(), ConfigError> {
        if self.status() == Status::Started {
            return Err(ConfigError::AlreadyStarted { method });
        }
        let mut bindings = lock(&self.inner.bindings);
        if bindings.bound {
            bind(self.inner.resolver.as_binder());
        } else {
            bindings.queued.push(bind);
        }
        Ok(())
    }

    fn enter(&self, stage: &'static str) {
        *lock(&self.inner.stage) = stage;
        debug!(stage, app = %self.inner.cfg.name, "entering stage");
        self.inner.bus.publish(Event::stage(stage));
    }

    fn stage(&self) -> &'static str {
        *lock(&self.inner.stage)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::AppBuilder;
    use crate::components::{Boot, Provider, Service};
    use crate::container::ResolverExt;

    fn cfg() -> AppConfig {
        AppConfig {
            os_signals: false,
            handler_timeout: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(1),
            ..AppConfig::default()
        }
    }

    fn app() -> App {
        AppBuilder::new(cfg()).with_subscribers(Vec::new()).build()
    }

    struct Counter(AtomicUsize);

    struct Greeter;

    #[async_trait]
    impl Boot for Greeter {
        async fn boot(&self, resolver: Arc<dyn Resolver>) -> anyhow::Result<()> {
            resolver.resolve::<Counter>()?.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl Provider for Greeter {
        fn register(&self, binder: &dyn Binder) -> anyhow::Result<()> {
            binder.bind_value(Counter(AtomicUsize::new(0)));
            Ok(())
        }
        fn as_boot(&self) -> Option<&dyn Boot> {
            Some(self)
        }
    }

    #[tokio::test]
    async fn test_status_progresses_and_run_returns_after_shutdown() {
        let app = app();
        app.provider(Arc::new(Greeter)).unwrap();
        assert_eq!(app.status(), Status::Unknown);

        let probe = app.clone();
        app.on_ready(move |resolver| async move {
            assert_eq!(probe.status(), Status::Started);
            assert_eq!(resolver.resolve::<Counter>()?.0.load(Ordering::SeqCst), 1);
            probe.shutdown();
            Ok(())
        })
        .unwrap();

        app.run().await.unwrap();
        assert_eq!(app.status(), Status::Started);
        assert!(app.token().is_cancelled());
    }

    #[tokio::test]
    async fn test_second_run_and_late_registration_rejected() {
        let app = app();
        app.shutdown();
        app.run().await.unwrap();

        assert_eq!(app.run().await.unwrap_err().as_label(), "app_already_started");
        let err = app.provider(Arc::new(Greeter)).unwrap_err();
        assert_eq!(err, ConfigError::AlreadyStarted { method: "provider" });
        let err = app.singleton(|_| Ok(1_u8)).unwrap_err();
        assert_eq!(err, ConfigError::AlreadyStarted { method: "singleton" });
    }

    #[tokio::test]
    async fn test_pre_bind_overrides_queued_singleton() {
        let app = app();
        app.singleton(|_| Ok(String::from("default"))).unwrap();
        app.pre_bind(|binder| {
            binder.bind_value(String::from("override"));
            Ok(())
        })
        .unwrap();
        app.shutdown();
        app.run().await.unwrap();

        let value = app.resolver().resolve::<String>().unwrap();
        assert_eq!(value.as_str(), "override");
        let info = app.resolver().resolve::<AppInfo>().unwrap();
        assert_eq!(info.name, "app");
    }

    struct Stubborn;

    #[async_trait]
    impl Service for Stubborn {
        async fn init(&self, _resolver: Arc<dyn Resolver>) -> anyhow::Result<()> {
            Ok(())
        }
        async fn start(&self) -> anyhow::Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
        async fn stop(&self) {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_service_bounded_by_shutdown_timeout() {
        let app = app();
        app.service(Arc::new(Stubborn)).unwrap();
        app.on_ready(|resolver| async move {
            resolver.resolve_cloned::<Arc<dyn Graceful>>()?.shutdown();
            Ok(())
        })
        .unwrap();

        let started = tokio::time::Instant::now();
        app.run().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    struct Refusing;

    #[async_trait]
    impl Boot for Refusing {
        async fn boot(&self, _resolver: Arc<dyn Resolver>) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    impl Provider for Refusing {
        fn register(&self, _binder: &dyn Binder) -> anyhow::Result<()> {
            Ok(())
        }
        fn as_boot(&self) -> Option<&dyn Boot> {
            Some(self)
        }
    }

    #[tokio::test]
    async fn test_failed_boot_tears_down_launched_work() {
        let app = app();
        let mut rx = app.inner.bus.subscribe();
        app.provider(Arc::new(Refusing)).unwrap();

        let joined = Arc::new(AtomicUsize::new(0));
        {
            let joined = Arc::clone(&joined);
            app.async_run(move |resolver| async move {
                resolver.resolve_cloned::<CancellationToken>()?.cancelled().await;
                joined.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        assert_eq!(app.run().await.unwrap_err().as_label(), "app_boot");
        assert!(app.token().is_cancelled());
        assert_eq!(joined.load(Ordering::SeqCst), 1);

        let late = Arc::new(AtomicUsize::new(0));
        {
            let late = Arc::clone(&late);
            app.async_run(move |_| async move {
                late.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        tokio::task::yield_now().await;
        assert_eq!(late.load(Ordering::SeqCst), 0);

        let kinds: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|ev| ev.kind)
            .collect();
        let stopped = kinds
            .iter()
            .position(|k| *k == EventKind::AllStoppedWithin)
            .unwrap();
        let failed = kinds
            .iter()
            .position(|k| *k == EventKind::StartupFailed)
            .unwrap();
        assert!(stopped < failed);
        assert_eq!(kinds.last(), Some(&EventKind::JobDropped));
    }

    #[tokio::test]
    async fn test_panic_in_init_hook_becomes_error() {
        let app = app();
        app.on_init(|| panic!("init exploded")).unwrap();

        match app.run().await.unwrap_err() {
            AppError::Panicked { message, stage, .. } => {
                assert_eq!(message, "init exploded");
                assert_eq!(stage, "init");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
