use std::sync::Arc;

use super::app::{App, AppParts};
use super::config::AppConfig;
use super::graceful::{Graceful, SignalGraceful};
use crate::container::{Container, FlagContext, MapFlags, Resolver};
use crate::events::Bus;
use crate::subscribers::Subscribe;

/// Builder for constructing an [`App`] with optional overrides.
pub struct AppBuilder {
    cfg: AppConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    resolver: Option<Arc<dyn Resolver>>,
    graceful: Option<Arc<dyn Graceful>>,
    flags: Option<Arc<dyn FlagContext>>,
}

impl AppBuilder {
    /// Creates a new builder with the given configuration.
    ///
    /// With the `logging` feature the subscriber list starts with a
    /// [`LogWriter`](crate::LogWriter).
    pub fn new(cfg: AppConfig) -> Self {
        Self {
            cfg,
            subscribers: default_subscribers(),
            resolver: None,
            graceful: None,
            flags: None,
        }
    }

    /// Sets event subscribers for observability, replacing the defaults.
    ///
    /// Subscribers receive lifecycle events (stages, failures, timeouts)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Uses an external resolver instead of the built-in [`Container`].
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Uses a custom graceful controller instead of [`SignalGraceful`].
    pub fn with_graceful(mut self, graceful: Arc<dyn Graceful>) -> Self {
        self.graceful = Some(graceful);
        self
    }

    /// Sets the flag context bound during the bind stage (defaults to empty [`MapFlags`]).
    pub fn with_flags(mut self, flags: Arc<dyn FlagContext>) -> Self {
        self.flags = Some(flags);
        self
    }

    /// Builds the application. Nothing runs until [`App::run`].
    pub fn build(self) -> App {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let graceful = self
            .graceful
            .unwrap_or_else(|| {
                Arc::new(SignalGraceful::from_config(&self.cfg, bus.clone())) as Arc<dyn Graceful>
            });
        let resolver = self.resolver.unwrap_or_else(Container::shared);
        let flags = self
            .flags
            .unwrap_or_else(|| Arc::new(MapFlags::new()) as Arc<dyn FlagContext>);

        App::from_parts(AppParts {
            cfg: self.cfg,
            bus,
            subscribers: self.subscribers,
            resolver,
            graceful,
            flags,
        })
    }
}

#[cfg(feature = "logging")]
fn default_subscribers() -> Vec<Arc<dyn Subscribe>> {
    vec![Arc::new(crate::subscribers::LogWriter::new())]
}

#[cfg(not(feature = "logging"))]
fn default_subscribers() -> Vec<Arc<dyn Subscribe>> {
    Vec::new()
}
