//! # appvisor
//!
//! **Appvisor** is an in-process application lifecycle orchestrator for Rust.
//!
//! It registers pluggable components (providers and services), brings them up in a
//! deterministic, priority-respecting order, runs background work on a bounded
//! pool, and tears everything down on shutdown or signal with per-handler timeouts.
//! It contains no domain logic itself: components are wired through an opaque
//! [`Resolver`]/[`Binder`] capability.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   Provider   Provider   Service   Service        async_run(job)
//!       │          │         │         │                │
//!       ▼          ▼         ▼         ▼                ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  App (staged bootstrap sequencer)                                 │
//! │  - Registry   (should_load, aggregate expansion, priority order)  │
//! │  - JobPool    (buffer → FIFO queue → N workers)                   │
//! │  - Graceful   (reload/shutdown handlers, reverse order, timeouts) │
//! │  - Resolver   (bindings shared by every component)                │
//! └──────┬─────────────────────┬─────────────────────┬────────────────┘
//!        │ publishes           │ publishes           │ publishes
//!        ▼                     ▼                     ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                   Bus (broadcast channel)                         │
//! │              (capacity: AppConfig::bus_capacity)                  │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                         ┌──────────────────┐
//!                         │   App listener   │
//!                         └────────┬─────────┘
//!                                  ▼
//!                            SubscriberSet
//!                         (per-sub queues)
//!                        ┌─────────┼─────────┐
//!                        ▼         ▼         ▼
//!                   LogWriter   metrics   custom
//! ```
//!
//! ### Lifecycle
//! ```text
//! init ─► bind ─► register ─► pool ─► init_services ─► boot ─► daemons ─► services
//!      ─► ready (status = Started, on-ready hooks) ─► run (Graceful::start blocks)
//!      ─► shutdown (join daemons + services + pool within shutdown_timeout)
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                         |
//! |-------------------|--------------------------------------------------------------|--------------------------------------------|
//! | **Components**    | Providers with optional boot/daemon/aggregate, services.     | [`Provider`], [`Service`], [`Boot`], [`Daemon`], [`Aggregate`] |
//! | **Lifecycle**     | Staged startup, status, graceful shutdown.                   | [`App`], [`AppBuilder`], [`Status`]        |
//! | **Jobs**          | Bounded background work, buffered before start.              | [`Job`], [`JobHandle`]                     |
//! | **Graceful**      | Reload/shutdown handlers with per-handler timeouts.          | [`Graceful`], [`SignalGraceful`], [`Handler`] |
//! | **Bindings**      | Typed binder/resolver capability with a default container.  | [`Binder`], [`Resolver`], [`Container`]    |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, alerts).       | [`Subscribe`], [`Event`]                   |
//! | **Errors**        | Typed configuration and startup errors.                      | [`ConfigError`], [`AppError`]              |
//! | **Configuration** | Centralized runtime settings and startup flags.              | [`AppConfig`], [`FlagContext`]             |
//!
//! ## Optional features
//! - `logging` (default): exports the built-in [`LogWriter`] and installs it in every
//!   [`AppBuilder`].
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use appvisor::{App, AppConfig, Binder, BinderExt, Graceful, Provider, Resolver, ResolverExt};
//!
//! struct Greeting(&'static str);
//!
//! struct GreetingProvider;
//!
//! impl Provider for GreetingProvider {
//!     fn register(&self, binder: &dyn Binder) -> anyhow::Result<()> {
//!         binder.bind_value(Greeting("hello"));
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = AppConfig::default();
//!     cfg.os_signals = false;
//!     cfg.handler_timeout = Duration::from_secs(2);
//!
//!     let app = App::new(cfg);
//!     app.provider(Arc::new(GreetingProvider))?;
//!     app.on_ready(|resolver: Arc<dyn Resolver>| async move {
//!         println!("{}", resolver.resolve::<Greeting>()?.0);
//!         // stop right away
//!         resolver.resolve_cloned::<Arc<dyn Graceful>>()?.shutdown();
//!         Ok(())
//!     })?;
//!
//!     app.run().await?;
//!     Ok(())
//! }
//! ```
mod components;
mod container;
mod core;
mod error;
mod events;
mod jobs;
mod subscribers;

// ---- Public re-exports ----

pub use components::{
    Aggregate, Boot, DEFAULT_PRIORITY, Daemon, Provider, ProviderEntry, ProviderRef, Service,
    ServiceEntry, ServiceRef,
};
pub use container::{
    AnyArc, AnyFactory, Binder, BinderExt, Container, FlagContext, Lifetime, MapFlags, Resolver,
    ResolverExt, TypeKey,
};
pub use crate::core::{
    App, AppBuilder, AppConfig, AppInfo, Graceful, Handler, JobHandle, JobPool, MAX_AGGREGATE_DEPTH,
    Registry, Signal, SignalGraceful, Status,
};
pub use error::{AppError, ConfigError, ContainerError, GracefulError};
pub use events::{Bus, Event, EventKind};
pub use jobs::{Job, JobFuture};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber.
// Enable with: `--features logging` (on by default)
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;

// Re-exported so components can accept the process-wide token without a direct dependency.
pub use tokio_util::sync::CancellationToken;
