//! # Event bus for lifecycle events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`] so that every part of the runtime (registry,
//! job pool workers, graceful controller, sequencer) can report what happened without
//! knowing who listens.
//!
//! ```text
//! Registry ───────┐
//! Job workers ────┼──► Bus ──► App listener ──► SubscriberSet ──► LogWriter / custom
//! Graceful ───────┤
//! Sequencer ──────┘
//! ```
//!
//! ## Rules
//! - `publish()` never blocks and never fails; without receivers the event is dropped.
//! - One ring buffer of `capacity` events is shared by all receivers.
//! - A receiver that falls behind observes `RecvError::Lagged(n)` and skips `n` events.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for lifecycle events.
///
/// Cheap to clone; all clones publish into the same channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus; `capacity` is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver observing events sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = Bus::new(4);
        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::ShutdownRequested));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::ShutdownRequested);
    }

    #[test]
    fn test_publish_without_receivers_is_silent() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::ReloadRequested));
    }
}
