//! # Non-blocking event fan-out to multiple subscribers.
//!
//! ```text
//! emit(event)
//!     │
//!     ├──► [queue 1] ──► worker 1 ──► subscriber1.on_event()
//!     │    (bounded)         └──────► panic → SubscriberPanicked
//!     └──► [queue N] ──► worker N ──► subscriberN.on_event()
//! ```
//!
//! ## Rules
//! - **Non-blocking**: `emit()` uses `try_send` and returns immediately
//! - **Overflow**: the event is dropped for that subscriber only, `SubscriberOverflow` is published
//! - **Isolation**: a slow or panicking subscriber does not affect the others
//! - **Per-subscriber FIFO**: each subscriber sees events in publication order
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if a subscriber panics while holding a lock.

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::error::panic_message;
use crate::events::{Bus, Event};
use crate::subscribers::Subscribe;

struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Fan-out coordinator for multiple event subscribers.
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker task per subscriber.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));
            let worker_bus = bus.clone();

            let handle = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = sub.on_event(ev.as_ref());
                    if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        worker_bus.publish(Event::subscriber_panicked(
                            sub.name(),
                            panic_message(panic.as_ref()),
                        ));
                    }
                }
            });
            channels.push(SubscriberChannel { name, sender: tx });
            workers.push(handle);
        }
        Self {
            channels,
            workers,
            bus,
        }
    }

    /// Returns the number of subscribers in the set.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns true when no subscriber is registered.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Emits an event to all subscribers.
    ///
    /// Subscriber bookkeeping events that overflow are not re-published, which
    /// would otherwise feed back into the full queue forever.
    pub fn emit(&self, event: Event) {
        let loop_guard = event.is_subscriber_event();
        let event = Arc::new(event);

        for channel in &self.channels {
            let reason = match channel.sender.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if !loop_guard {
                self.bus
                    .publish(Event::subscriber_overflow(channel.name, reason));
            }
        }
    }

    /// Closes every queue and waits until each worker drained its backlog.
    pub async fn shutdown(self) {
        drop(self.channels);
        for h in self.workers {
            let _ = h.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::events::EventKind;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.0.lock().unwrap().push(event.kind);
        }
    }

    struct Exploding;

    #[async_trait]
    impl Subscribe for Exploding {
        async fn on_event(&self, _event: &Event) {
            panic!("subscriber exploded");
        }
        fn name(&self) -> &'static str {
            "exploding"
        }
    }

    #[tokio::test]
    async fn test_delivers_in_order_and_drains_on_shutdown() {
        let bus = Bus::new(16);
        let rec = Arc::new(Recorder::default());
        let set = SubscriberSet::new(vec![rec.clone()], bus);

        set.emit(Event::new(EventKind::ReloadRequested));
        set.emit(Event::new(EventKind::ShutdownRequested));
        set.shutdown().await;

        assert_eq!(
            *rec.0.lock().unwrap(),
            vec![EventKind::ReloadRequested, EventKind::ShutdownRequested]
        );
    }

    #[tokio::test]
    async fn test_panicking_subscriber_is_isolated() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let rec = Arc::new(Recorder::default());
        let set = SubscriberSet::new(vec![Arc::new(Exploding), rec.clone()], bus);

        set.emit(Event::new(EventKind::AppReady));
        set.shutdown().await;

        assert_eq!(*rec.0.lock().unwrap(), vec![EventKind::AppReady]);
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::SubscriberPanicked);
        assert_eq!(ev.component.as_deref(), Some("exploding"));
        assert_eq!(ev.reason.as_deref(), Some("subscriber exploded"));
    }
}
