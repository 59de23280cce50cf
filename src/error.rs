//! Error types used by the appvisor runtime.
//!
//! This module defines the error enums that may cross the runtime's public boundary:
//!
//! - [`ConfigError`]: configuration mistakes caught at registration time, before any side effect.
//! - [`AppError`]: startup failures; any of these aborts the whole lifecycle.
//! - [`ContainerError`]: failures of the binder/resolver capability.
//! - [`GracefulError`]: failures of the graceful controller itself.
//!
//! Everything discovered after the application reached `Started` (job errors, handler
//! timeouts, panics inside hooks) is **not** represented here: it is published as an
//! [`Event`](crate::Event) and logged, never propagated.
//!
//! All enums provide `as_label` for logs/metrics.

use std::time::Duration;

use thiserror::Error;

/// # Configuration errors raised at registration time.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A provider transitively aggregates itself.
    #[error("aggregate cycle detected: {}", path.join(" -> "))]
    AggregateCycle {
        /// Provider names from the outermost aggregate down to the repeated one.
        path: Vec<String>,
    },

    /// A registration method was called after the application started.
    #[error("cannot call {method} after the application started")]
    AlreadyStarted {
        /// Name of the rejected operation.
        method: &'static str,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use appvisor::ConfigError;
    ///
    /// let err = ConfigError::AlreadyStarted { method: "singleton" };
    /// assert_eq!(err.as_label(), "config_already_started");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::AggregateCycle { .. } => "config_aggregate_cycle",
            ConfigError::AlreadyStarted { .. } => "config_already_started",
        }
    }
}

/// # Errors produced by the binder/resolver capability.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ContainerError {
    /// Nothing was bound for the requested type.
    #[error("no binding for {type_name}")]
    NotBound {
        /// Requested type.
        type_name: &'static str,
    },

    /// A binding exists but produced a value of another type.
    #[error("binding for {type_name} produced a value of another type")]
    TypeMismatch {
        /// Requested type.
        type_name: &'static str,
    },

    /// The constructor registered for a type failed.
    #[error("constructor for {type_name} failed: {source}")]
    Factory {
        /// Requested type.
        type_name: &'static str,
        /// Underlying constructor error.
        #[source]
        source: anyhow::Error,
    },

    /// A lock guarding the bindings was poisoned by a panicking constructor.
    #[error("binding table lock poisoned")]
    Poisoned,
}

impl ContainerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ContainerError::NotBound { .. } => "container_not_bound",
            ContainerError::TypeMismatch { .. } => "container_type_mismatch",
            ContainerError::Factory { .. } => "container_factory",
            ContainerError::Poisoned => "container_poisoned",
        }
    }
}

/// # Errors produced by the graceful controller.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum GracefulError {
    /// [`Graceful::start`](crate::Graceful::start) was called twice.
    #[error("graceful controller already running")]
    AlreadyRunning,

    /// OS signal listeners could not be installed.
    #[error("failed to install signal handlers: {0}")]
    Signal(#[from] std::io::Error),
}

impl GracefulError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            GracefulError::AlreadyRunning => "graceful_already_running",
            GracefulError::Signal(_) => "graceful_signal",
        }
    }
}

/// # Startup errors.
///
/// Any of these aborts startup; launched background work is torn down before the
/// error is returned from [`App::run`](crate::App::run).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error detected while starting.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The user init hook failed.
    #[error("init hook failed: {0}")]
    Init(#[source] anyhow::Error),

    /// Binding constants, constructors or the pre-bind hook failed.
    #[error("bind stage failed: {0}")]
    Bind(#[source] anyhow::Error),

    /// A conditional component reported an error from `should_load`.
    #[error("should_load of {component} failed: {source}")]
    Filter {
        /// Component display name.
        component: String,
        /// Error returned by the component.
        #[source]
        source: anyhow::Error,
    },

    /// A provider failed to register its bindings.
    #[error("provider {provider} failed to register: {source}")]
    Register {
        /// Provider display name.
        provider: String,
        /// Error returned by the provider.
        #[source]
        source: anyhow::Error,
    },

    /// A service failed to initialize.
    #[error("service {service} failed to init: {source}")]
    InitService {
        /// Service display name.
        service: String,
        /// Error returned by the service.
        #[source]
        source: anyhow::Error,
    },

    /// A provider failed to boot.
    #[error("provider {provider} failed to boot: {source}")]
    Boot {
        /// Provider display name.
        provider: String,
        /// Error returned by the provider.
        #[source]
        source: anyhow::Error,
    },

    /// The graceful controller failed to start.
    #[error(transparent)]
    Graceful(#[from] GracefulError),

    /// [`App::run`](crate::App::run) was called on an application that already ran.
    #[error("application already started")]
    AlreadyStarted,

    /// The lifecycle panicked; the panic was caught and converted.
    #[error("application panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
        /// Stage that was running when the panic happened.
        stage: &'static str,
        /// Time since `run` was called.
        after: Duration,
    },
}

impl AppError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use appvisor::AppError;
    ///
    /// assert_eq!(AppError::AlreadyStarted.as_label(), "app_already_started");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            AppError::Config(_) => "app_config",
            AppError::Init(_) => "app_init",
            AppError::Bind(_) => "app_bind",
            AppError::Filter { .. } => "app_filter",
            AppError::Register { .. } => "app_register",
            AppError::InitService { .. } => "app_init_service",
            AppError::Boot { .. } => "app_boot",
            AppError::Graceful(_) => "app_graceful",
            AppError::AlreadyStarted => "app_already_started",
            AppError::Panicked { .. } => "app_panicked",
        }
    }
}

/// Renders a panic payload caught by `catch_unwind` or a `JoinError`.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
