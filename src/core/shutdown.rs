//! # Cross-platform OS signal handling.
//!
//! Provides [`Signals`], a listener set that maps termination and reload signals
//! onto [`Signal`].
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C in terminal) → [`Signal::Shutdown`]
//! - `SIGTERM` (default kill signal, used by systemd/Kubernetes) → [`Signal::Shutdown`]
//! - `SIGQUIT` (quit signal) → [`Signal::Shutdown`]
//! - `SIGHUP` (conventional "reload configuration") → [`Signal::Reload`]
//!
//! **Windows platforms:**
//! - `Ctrl-C` via [`tokio::signal::ctrl_c`] → [`Signal::Shutdown`]

/// What a received signal asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Run the shutdown sequence.
    Shutdown,
    /// Run the reload sequence.
    Reload,
}

/// Listens for OS signals.
///
/// Listeners are installed once in [`Signals::install`] and reused by every
/// [`recv`](Signals::recv), so no signal is missed between two waits.
#[cfg(unix)]
pub struct Signals {
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
    sigquit: tokio::signal::unix::Signal,
    sighup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    /// Installs the signal listeners. Fails if registration fails.
    pub fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
            sigquit: signal(SignalKind::quit())?,
            sighup: signal(SignalKind::hangup())?,
        })
    }

    /// Waits for the next signal.
    pub async fn recv(&mut self) -> Signal {
        tokio::select! {
            _ = self.sigint.recv()  => Signal::Shutdown,
            _ = self.sigterm.recv() => Signal::Shutdown,
            _ = self.sigquit.recv() => Signal::Shutdown,
            _ = self.sighup.recv()  => Signal::Reload,
        }
    }
}

/// Listens for OS signals.
#[cfg(not(unix))]
pub struct Signals;

#[cfg(not(unix))]
impl Signals {
    /// Installs the signal listeners.
    pub fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    /// Waits for the next signal.
    pub async fn recv(&mut self) -> Signal {
        match tokio::signal::ctrl_c().await {
            Ok(()) => Signal::Shutdown,
            // listener could not be installed: never fire
            Err(_) => std::future::pending().await,
        }
    }
}
