//! # Event subscribers for the event bus.
//!
//! This module provides the [`Subscribe`] trait, its routing declaration
//! [`Interest`], and ready-made implementations.
//!
//! ## Architecture
//! ```text
//! EventBus::publish(ev) ──► Publisher(ev.type) ──► dispatch loop
//!                                                      │
//!                          matches(ev)? stale? ────────┤
//!                                                      ├──► inline:   sub.on_event(&ev).await
//!                                                      └──► executor: handle.spawn(sub.on_event)
//! ```
//!
//! ## Subscriber kinds
//! - **Exact**: one event type, attached to that type's publisher.
//! - **Predicate**: attached to every publisher, filtered by `matches`.
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use beatvisor::{Event, EventKind, EventType, Interest, Subscribe};
//! use async_trait::async_trait;
//!
//! struct ExpiryCounter;
//!
//! #[async_trait]
//! impl Subscribe for ExpiryCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if let EventKind::ClientDeregisterService { .. } = event.kind {
//!             // increment removal counter
//!         }
//!     }
//!     fn interest(&self) -> Interest {
//!         Interest::Exact(EventType::ClientDeregisterService)
//!     }
//! }
//! ```

mod subscribe;
mod subscriber_fn;

#[cfg(feature = "logging")]
mod embedded;

pub use subscribe::{Interest, Subscribe};
pub use subscriber_fn::FnSubscriber;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
