//! Registry events: types, per-type publishers and the bus.
//!
//! ## Contents
//! - [`EventType`], [`EventKind`], [`Event`]: routing tag, payload and sequencing
//! - [`Publisher`], [`PublisherState`]: bounded queue plus dispatch loop for one type
//! - [`EventBus`]: publisher registry, subscriber routing and shutdown
//!
//! ## Quick reference
//! - **Producers**: `HealthCheckEngine` (beats, checkers, client lifecycle),
//!   embedders publishing `Custom` events.
//! - **Consumers**: anything implementing [`Subscribe`](crate::Subscribe).

mod bus;
mod event;
mod publisher;

pub use bus::EventBus;
pub use event::{Event, EventKind, EventType};
pub use publisher::{MAX_PUBLISHER_CAPACITY, Publisher, PublisherState};
