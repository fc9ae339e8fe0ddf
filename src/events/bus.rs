//! # Event bus: one publisher per event type.
//!
//! [`EventBus`] routes each [`Event`] to the [`Publisher`] registered for its
//! [`EventType`]. There is no global lock: the publisher map is sharded and each
//! publisher's queue is its own coordination point.
//!
//! ## Architecture
//! ```text
//!                  ┌─────────────── EventBus ───────────────┐
//! publish(ev) ───► │ publishers: DashMap<EventType, Publisher>│
//!                  └──┬──────────────┬──────────────┬───────┘
//!                     ▼              ▼              ▼
//!              ServiceChanged   ClientChanged   ClientDeregister...
//!               (queue+loop)     (queue+loop)     (queue+loop)
//!                     │              │              │
//!               exact subs      exact subs      exact subs
//!                     └──── predicate subscribers (on all) ────┘
//! ```
//!
//! ## Rules
//! - `register_publisher` is idempotent: the first registration wins.
//! - `register_subscriber` creates a publisher with the default capacity if the
//!   subscriber's type has none yet.
//! - `publish` for a type that never had a publisher fails with
//!   [`BusError::NoPublisher`]; nothing is created implicitly.
//! - `shutdown` stops every loop once; queued events are discarded.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::runtime::Handle;
use tracing::{debug, info};

use super::event::{Event, EventType};
use super::publisher::Publisher;
use crate::core::Config;
use crate::error::BusError;
use crate::subscribers::{Interest, Subscribe};

/// Typed, multi-channel event bus.
pub struct EventBus {
    publishers: DashMap<EventType, Publisher>,
    predicates: RwLock<Vec<Arc<dyn Subscribe>>>,
    default_capacity: usize,
    overflow_wait: Duration,
    closed: AtomicBool,
}

impl EventBus {
    /// Creates a bus with default sizing (see [`Config`]).
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    /// Creates a bus using `ring_buffer_size` and `overflow_wait_ms` from `config`.
    pub fn with_config(config: &Config) -> Self {
        Self {
            publishers: DashMap::new(),
            predicates: RwLock::new(Vec::new()),
            default_capacity: config.ring_buffer_size_clamped(),
            overflow_wait: config.overflow_wait(),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the publisher for `event_type`, creating and starting it if absent.
    ///
    /// Idempotent: a second call returns the existing publisher and ignores
    /// `buffer_size`. Creating a publisher outside a Tokio runtime fails with
    /// [`BusError::NoRuntime`].
    pub fn register_publisher(
        &self,
        event_type: EventType,
        buffer_size: usize,
    ) -> Result<Publisher, BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }
        if let Some(existing) = self.publishers.get(&event_type) {
            return Ok(existing.value().clone());
        }
        let runtime = Handle::try_current().map_err(|_| BusError::NoRuntime { event_type })?;
        let publisher = self
            .publishers
            .entry(event_type)
            .or_insert_with(|| {
                let publisher = Publisher::new(event_type, buffer_size, self.overflow_wait);
                for sub in self.predicates.read().iter() {
                    publisher.add_subscriber(Arc::clone(sub));
                }
                publisher.start(&runtime);
                info!(event_type = %event_type, capacity = publisher.capacity(), "publisher registered");
                publisher
            })
            .value()
            .clone();
        Ok(publisher)
    }

    /// Attaches a subscriber according to its [`Interest`].
    ///
    /// - `Exact(t)`: joins the publisher of `t` (created with the default
    ///   capacity if absent). Dispatch starts once the loop sees it.
    /// - `Predicate`: joins every current and future publisher.
    pub fn register_subscriber(&self, subscriber: Arc<dyn Subscribe>) -> Result<(), BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }
        match subscriber.interest() {
            Interest::Exact(event_type) => {
                let publisher = self.register_publisher(event_type, self.default_capacity)?;
                if publisher.add_subscriber(Arc::clone(&subscriber)) {
                    debug!(subscriber = subscriber.name(), event_type = %event_type, "subscriber registered");
                }
            }
            Interest::Predicate => {
                {
                    let mut predicates = self.predicates.write();
                    if predicates
                        .iter()
                        .any(|s| std::ptr::addr_eq(Arc::as_ptr(s), Arc::as_ptr(&subscriber)))
                    {
                        return Ok(());
                    }
                    predicates.push(Arc::clone(&subscriber));
                }
                for entry in self.publishers.iter() {
                    entry.value().add_subscriber(Arc::clone(&subscriber));
                }
                debug!(subscriber = subscriber.name(), "predicate subscriber registered");
            }
        }
        Ok(())
    }

    /// Detaches a subscriber; returns `true` if it was attached anywhere.
    pub fn deregister_subscriber(&self, subscriber: &Arc<dyn Subscribe>) -> bool {
        let mut removed = false;
        if subscriber.interest() == Interest::Predicate {
            self.predicates
                .write()
                .retain(|s| !std::ptr::addr_eq(Arc::as_ptr(s), Arc::as_ptr(subscriber)));
        }
        for entry in self.publishers.iter() {
            removed |= entry.value().remove_subscriber(subscriber);
        }
        if removed {
            debug!(subscriber = subscriber.name(), "subscriber deregistered");
        }
        removed
    }

    /// Routes `event` to its publisher.
    ///
    /// # Errors
    /// - [`BusError::Closed`] after [`shutdown`](Self::shutdown);
    /// - [`BusError::NoPublisher`] if the type was never registered;
    /// - [`BusError::PublisherShutdown`] if its publisher was deregistered concurrently.
    pub async fn publish(&self, event: Event) -> Result<(), BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }
        let event_type = event.event_type();
        let publisher = self
            .publishers
            .get(&event_type)
            .map(|p| p.value().clone())
            .ok_or(BusError::NoPublisher { event_type })?;
        publisher.publish(event).await
    }

    /// Removes and stops the publisher of `event_type`.
    pub fn deregister_publisher(&self, event_type: EventType) -> Option<Publisher> {
        let (_, publisher) = self.publishers.remove(&event_type)?;
        publisher.shutdown();
        info!(event_type = %event_type, "publisher deregistered");
        Some(publisher)
    }

    /// Publisher currently serving `event_type`, if any.
    pub fn publisher(&self, event_type: EventType) -> Option<Publisher> {
        self.publishers.get(&event_type).map(|p| p.value().clone())
    }

    /// Types that currently have a publisher.
    pub fn event_types(&self) -> Vec<EventType> {
        self.publishers.iter().map(|e| *e.key()).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stops every publisher loop. Subsequent calls are no-ops.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for entry in self.publishers.iter() {
            entry.value().shutdown();
        }
        info!(publishers = self.publishers.len(), "event bus shut down");
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    use crate::events::{MAX_PUBLISHER_CAPACITY, PublisherState};
    use crate::naming::Service;
    use crate::subscribers::FnSubscriber;

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_publish_without_publisher_fails() {
        let bus = EventBus::new();
        let err = bus.publish(Event::client_changed("c1")).await.unwrap_err();
        assert_eq!(
            err,
            BusError::NoPublisher {
                event_type: EventType::ClientChanged
            }
        );
        // Failing publish must not create one.
        assert!(bus.publisher(EventType::ClientChanged).is_none());
    }

    #[test]
    fn test_register_outside_runtime_fails() {
        let bus = EventBus::new();
        assert_eq!(
            bus.register_publisher(EventType::ServiceChanged, 8)
                .unwrap_err()
                .as_label(),
            "bus_no_runtime"
        );
        let sub = FnSubscriber::exact("push", EventType::ClientChanged, |_: &Event| {}).arc();
        assert!(bus.register_subscriber(sub).is_err());
        assert!(bus.event_types().is_empty());
    }

    #[tokio::test]
    async fn test_huge_buffer_size_is_clamped() {
        let bus = EventBus::new();
        let publisher = bus
            .register_publisher(EventType::Custom("big"), usize::MAX)
            .expect("register");
        assert_eq!(publisher.capacity(), MAX_PUBLISHER_CAPACITY);
        bus.publish(Event::custom("big")).await.expect("publish");
    }

    #[tokio::test]
    async fn test_register_publisher_is_idempotent() {
        let bus = EventBus::new();
        let first = bus
            .register_publisher(EventType::ServiceChanged, 8)
            .expect("register");
        let second = bus
            .register_publisher(EventType::ServiceChanged, 1024)
            .expect("register");
        assert!(first.same_as(&second));
        assert_eq!(second.capacity(), 8);
        assert_eq!(bus.event_types(), vec![EventType::ServiceChanged]);
    }

    #[tokio::test]
    async fn test_subscriber_creates_placeholder_publisher() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.register_subscriber(
            FnSubscriber::exact("disconnects", EventType::ClientDisconnect, move |ev: &Event| {
                sink.lock().push(ev.client_id().map(str::to_string));
            })
            .arc(),
        )
        .expect("subscribe");

        let publisher = bus
            .publisher(EventType::ClientDisconnect)
            .expect("placeholder publisher");
        assert_eq!(publisher.subscriber_count(), 1);

        bus.publish(Event::client_disconnect("c7")).await.expect("publish");
        wait_until(|| seen.lock().len() == 1).await;
        assert_eq!(seen.lock()[0].as_deref(), Some("c7"));
    }

    #[tokio::test]
    async fn test_predicate_subscriber_spans_publishers() {
        let bus = EventBus::new();
        bus.register_publisher(EventType::ServiceChanged, 16)
            .expect("register");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let audit: Arc<dyn Subscribe> = FnSubscriber::predicate(
            "client-audit",
            |ev: &Event| ev.client_id().is_some() || ev.service().is_some(),
            move |ev: &Event| sink.lock().push(ev.event_type()),
        )
        .arc();
        bus.register_subscriber(Arc::clone(&audit)).expect("subscribe");

        // Created after the predicate subscriber: still attached.
        bus.register_publisher(EventType::ClientChanged, 16)
            .expect("register");

        let svc = Service::new("public", "g", "orders", true);
        bus.publish(Event::service_changed(svc)).await.expect("publish");
        bus.publish(Event::client_changed("c1")).await.expect("publish");

        wait_until(|| seen.lock().len() == 2).await;
        let mut types = seen.lock().clone();
        types.sort_by_key(|t| t.as_label());
        assert_eq!(types, vec![EventType::ClientChanged, EventType::ServiceChanged]);

        assert!(bus.deregister_subscriber(&audit));
        assert_eq!(
            bus.publisher(EventType::ClientChanged)
                .expect("publisher")
                .subscriber_count(),
            0
        );
    }

    #[tokio::test]
    async fn test_deregister_publisher_stops_routing() {
        let bus = EventBus::new();
        let publisher = bus
            .register_publisher(EventType::Custom("audit"), 4)
            .expect("register");
        let removed = bus
            .deregister_publisher(EventType::Custom("audit"))
            .expect("removed");
        assert!(removed.same_as(&publisher));
        assert_eq!(publisher.state(), PublisherState::Shutdown);
        assert!(matches!(
            bus.publish(Event::custom("audit")).await,
            Err(BusError::NoPublisher { .. })
        ));
    }

    #[tokio::test]
    async fn test_shutdown_closes_bus() {
        let bus = EventBus::new();
        let publisher = bus
            .register_publisher(EventType::ClientChanged, 4)
            .expect("register");
        bus.shutdown();
        bus.shutdown();

        assert!(bus.is_closed());
        assert_eq!(publisher.state(), PublisherState::Shutdown);
        assert_eq!(
            bus.publish(Event::client_changed("c1")).await.unwrap_err(),
            BusError::Closed
        );
        assert!(bus.register_publisher(EventType::ServiceChanged, 4).is_err());
    }
}
