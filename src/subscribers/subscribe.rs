//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for observing the runtime. Each subscriber is
//! driven by a dedicated worker loop fed by a bounded queue owned by the
//! [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow; they block neither the publisher nor other subscribers.
//! - If a subscriber's queue overflows, events for that subscriber are **dropped**.
//!
//! ## Example
//! ```rust
//! use appvisor::{Event, EventKind, Subscribe};
//!
//! struct Alerts;
//!
//! #[async_trait::async_trait]
//! impl Subscribe for Alerts {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::GraceExceeded {
//!             // page someone...
//!         }
//!     }
//!     fn name(&self) -> &'static str { "alerts" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event for this subscriber.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
