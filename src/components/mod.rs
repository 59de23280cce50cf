//! # Component contracts.
//!
//! Two kinds of components are registered with an [`App`](crate::App):
//!
//! - [`Provider`]: configures bindings during registration and optionally boots,
//!   runs a daemon, or aggregates child providers.
//! - [`Service`]: a long-running unit with an explicit init/start/stop/reload lifecycle.
//!
//! Optional provider capabilities are small traits ([`Boot`], [`Daemon`], [`Aggregate`]).
//! A provider opts in by implementing the trait and returning `Some(self)` from the
//! matching accessor (`as_boot`, `as_daemon`, `as_aggregate`); the runtime checks the
//! accessor instead of probing the type.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use appvisor::{Binder, BinderExt, Boot, Provider, Resolver, ResolverExt};
//!
//! struct Settings { listen: String }
//!
//! struct HttpProvider;
//!
//! #[async_trait::async_trait]
//! impl Boot for HttpProvider {
//!     async fn boot(&self, resolver: Arc<dyn Resolver>) -> anyhow::Result<()> {
//!         let settings = resolver.resolve::<Settings>()?;
//!         assert_eq!(settings.listen, "127.0.0.1:8080");
//!         Ok(())
//!     }
//! }
//!
//! impl Provider for HttpProvider {
//!     fn register(&self, binder: &dyn Binder) -> anyhow::Result<()> {
//!         binder.bind_value(Settings { listen: "127.0.0.1:8080".into() });
//!         Ok(())
//!     }
//!     fn priority(&self) -> i32 { 10 }
//!     fn as_boot(&self) -> Option<&dyn Boot> { Some(self) }
//! }
//! ```

mod entry;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::container::{Binder, Resolver};

pub use entry::{ProviderEntry, ServiceEntry};

/// Priority of components that do not declare one: loaded last.
pub const DEFAULT_PRIORITY: i32 = 1000;

/// Shared provider handle.
pub type ProviderRef = Arc<dyn Provider>;

/// Shared service handle.
pub type ServiceRef = Arc<dyn Service>;

/// # Registrable unit that configures bindings.
///
/// Only [`register`](Provider::register) is required. Everything else has a default:
/// priority [`DEFAULT_PRIORITY`], always loaded, no optional capability.
pub trait Provider: Send + Sync + 'static {
    /// Stable display name, used for logging and duplicate detection.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Registers bindings. Runs once, synchronously, in priority order; later
    /// providers may rely on bindings made by earlier ones.
    fn register(&self, binder: &dyn Binder) -> anyhow::Result<()>;

    /// Load order; lower loads earlier. Ties keep registration order.
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Decides whether the provider is loaded at all.
    ///
    /// `Ok(false)` skips it silently; `Err(_)` is a misconfigured conditional and
    /// aborts startup.
    fn should_load(&self, _resolver: &dyn Resolver) -> anyhow::Result<bool> {
        Ok(true)
    }

    /// Boot capability.
    fn as_boot(&self) -> Option<&dyn Boot> {
        None
    }

    /// Daemon capability.
    fn as_daemon(&self) -> Option<&dyn Daemon> {
        None
    }

    /// Aggregate capability.
    fn as_aggregate(&self) -> Option<&dyn Aggregate> {
        None
    }
}

/// Runs after every provider registered, with full resolver access.
#[async_trait]
pub trait Boot: Send + Sync {
    /// Boots the provider. An error aborts startup.
    async fn boot(&self, resolver: Arc<dyn Resolver>) -> anyhow::Result<()>;
}

/// Long-running background behavior tied to the process cancellation token.
#[async_trait]
pub trait Daemon: Send + Sync {
    /// Runs until `token` is cancelled. The runtime never aborts a daemon; one that
    /// ignores the token is only bounded by the shutdown timeout.
    async fn daemon(&self, token: CancellationToken, resolver: Arc<dyn Resolver>)
    -> anyhow::Result<()>;
}

/// Declares child providers that load alongside (and before) this one.
pub trait Aggregate: Send + Sync {
    /// Child providers, in load order.
    fn aggregates(&self) -> Vec<ProviderRef>;
}

/// # Long-running unit with an explicit lifecycle.
///
/// `init` runs during startup (errors abort), `start` runs on its own task once every
/// provider booted, `stop` runs as a shutdown handler and `reload` as a reload handler.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Stable display name.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Load order; lower starts earlier and stops later.
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Same semantics as [`Provider::should_load`].
    fn should_load(&self, _resolver: &dyn Resolver) -> anyhow::Result<bool> {
        Ok(true)
    }

    /// Prepares the service. An error aborts startup.
    async fn init(&self, resolver: Arc<dyn Resolver>) -> anyhow::Result<()>;

    /// Starts the service. May block; it runs on its own task.
    async fn start(&self) -> anyhow::Result<()>;

    /// Stops the service.
    async fn stop(&self);

    /// Reloads the service configuration.
    async fn reload(&self) {}
}
