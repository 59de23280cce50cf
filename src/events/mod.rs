//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: the sequencer (`App`), the registry, job pool workers,
//!   the graceful controller and `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the `App` listener, which fans events out to the
//!   [`SubscriberSet`](crate::SubscriberSet).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
