//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for plugging event handlers into the
//! [`EventBus`](crate::EventBus). A subscriber declares its [`Interest`]:
//! - [`Interest::Exact`]: routed to the one publisher of that event type;
//! - [`Interest::Predicate`]: attached to every publisher, filtered by
//!   [`Subscribe::matches`] (cross-cutting listeners such as audit or logging).
//!
//! ## Contract
//! - Without an executor, `on_event` runs **inline** on the publisher's dispatch
//!   loop: ordered with other inline subscribers, but a slow handler delays
//!   every later event of that type.
//! - With an executor ([`Subscribe::executor`]) each event is spawned onto that
//!   runtime: the loop is not blocked, ordering across events is not kept.
//! - A panicking handler is caught and logged; the loop and other subscribers
//!   keep running.
//!
//! ## Example (skeleton)
//! ```rust
//! use async_trait::async_trait;
//! use beatvisor::{Event, EventType, Interest, Subscribe};
//!
//! struct PushNotifier;
//!
//! #[async_trait]
//! impl Subscribe for PushNotifier {
//!     async fn on_event(&self, _ev: &Event) {
//!         // notify watchers...
//!     }
//!     fn interest(&self) -> Interest {
//!         Interest::Exact(EventType::ServiceChanged)
//!     }
//!     fn name(&self) -> &'static str { "push" }
//! }
//! ```

use async_trait::async_trait;
use tokio::runtime::Handle;

use crate::events::{Event, EventType};

/// What a subscriber wants to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    /// Events of exactly this type.
    Exact(EventType),
    /// Any event for which [`Subscribe::matches`] returns `true`.
    Predicate,
}

/// Contract for event subscribers.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event for this subscriber.
    ///
    /// # Parameters
    /// - `event`: Reference to the event (does not transfer ownership)
    async fn on_event(&self, event: &Event);

    /// Routing declaration; decides which publishers this subscriber joins.
    fn interest(&self) -> Interest;

    /// Whether this subscriber accepts `event`.
    ///
    /// Default: exact subscribers compare the event type, predicate
    /// subscribers accept everything (override to filter).
    fn matches(&self, event: &Event) -> bool {
        match self.interest() {
            Interest::Exact(event_type) => event.event_type() == event_type,
            Interest::Predicate => true,
        }
    }

    /// Runtime to dispatch on instead of the publisher's loop.
    fn executor(&self) -> Option<Handle> {
        None
    }

    /// Skip events older than the highest sequence already dispatched.
    fn ignore_stale_events(&self) -> bool {
        false
    }

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
