//! # Registry events routed through the [`EventBus`](crate::EventBus).
//!
//! [`EventKind`] carries the payload of each event; [`EventType`] is the
//! payload-free tag used to route an event to its
//! [`Publisher`](crate::Publisher) and to match exact subscribers.
//!
//! ## Categories
//! - **Service events**: `ServiceChanged`
//! - **Client events**: `ClientChanged`, `ClientDeregisterService`, `ClientDisconnect`
//! - **Custom events**: `Custom { topic, .. }` for embedders with their own topics
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Publishers use it to filter stale events for subscribers that
//! opt into [`ignore_stale_events`](crate::Subscribe::ignore_stale_events).
//!
//! ## Example
//! ```rust
//! use beatvisor::{Event, EventType, Service};
//!
//! let svc = Service::new("public", "DEFAULT_GROUP", "orders", true);
//! let ev = Event::service_changed(svc);
//! assert_eq!(ev.event_type(), EventType::ServiceChanged);
//!
//! let later = Event::client_changed("10.0.0.1:8080#true");
//! assert!(later.seq > ev.seq);
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::naming::Service;

/// Global sequence counter for event ordering.
///
/// Starts at 1 so that a fresh publisher's high-water mark (0) never marks the
/// first event stale.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Routing tag of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// A service's instance list or health changed.
    ServiceChanged,
    /// A client's published data changed.
    ClientChanged,
    /// A client stopped publishing one service.
    ClientDeregisterService,
    /// A client left the registry.
    ClientDisconnect,
    /// Embedder-defined topic.
    Custom(&'static str),
}

impl EventType {
    /// Built-in types the liveness engine publishes.
    pub const BUILTIN: [EventType; 4] = [
        EventType::ServiceChanged,
        EventType::ClientChanged,
        EventType::ClientDeregisterService,
        EventType::ClientDisconnect,
    ];

    /// Returns a short stable label for logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventType::ServiceChanged => "service_changed",
            EventType::ClientChanged => "client_changed",
            EventType::ClientDeregisterService => "client_deregister_service",
            EventType::ClientDisconnect => "client_disconnect",
            EventType::Custom(topic) => *topic,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Payload of an event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Sets:
    /// - `service`: the service whose view changed
    ServiceChanged { service: Service },

    /// Sets:
    /// - `client_id`: the client whose published data changed
    ClientChanged { client_id: Arc<str> },

    /// Sets:
    /// - `service`: the service no longer published
    /// - `client_id`: the client that published it
    ClientDeregisterService { service: Service, client_id: Arc<str> },

    /// Sets:
    /// - `client_id`: the client that left
    ClientDisconnect { client_id: Arc<str> },

    /// Sets:
    /// - `topic`: routing topic (matches [`EventType::Custom`])
    /// - `payload`: optional free-form payload
    Custom {
        topic: &'static str,
        payload: Option<Arc<str>>,
    },
}

/// Immutable event with its sequence number.
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Payload.
    pub kind: EventKind,
}

impl Event {
    /// Creates an event with the next sequence number and the current time.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
        }
    }

    /// Routing tag derived from the payload.
    pub fn event_type(&self) -> EventType {
        match &self.kind {
            EventKind::ServiceChanged { .. } => EventType::ServiceChanged,
            EventKind::ClientChanged { .. } => EventType::ClientChanged,
            EventKind::ClientDeregisterService { .. } => EventType::ClientDeregisterService,
            EventKind::ClientDisconnect { .. } => EventType::ClientDisconnect,
            EventKind::Custom { topic, .. } => EventType::Custom(*topic),
        }
    }

    #[inline]
    pub fn service_changed(service: Service) -> Self {
        Self::new(EventKind::ServiceChanged { service })
    }

    #[inline]
    pub fn client_changed(client_id: impl Into<Arc<str>>) -> Self {
        Self::new(EventKind::ClientChanged {
            client_id: client_id.into(),
        })
    }

    #[inline]
    pub fn client_deregister_service(service: Service, client_id: impl Into<Arc<str>>) -> Self {
        Self::new(EventKind::ClientDeregisterService {
            service,
            client_id: client_id.into(),
        })
    }

    #[inline]
    pub fn client_disconnect(client_id: impl Into<Arc<str>>) -> Self {
        Self::new(EventKind::ClientDisconnect {
            client_id: client_id.into(),
        })
    }

    #[inline]
    pub fn custom(topic: &'static str) -> Self {
        Self::new(EventKind::Custom {
            topic,
            payload: None,
        })
    }

    /// Attaches a payload to a custom event; other kinds are returned unchanged.
    #[inline]
    pub fn with_payload(mut self, payload: impl Into<Arc<str>>) -> Self {
        if let EventKind::Custom { payload: slot, .. } = &mut self.kind {
            *slot = Some(payload.into());
        }
        self
    }

    /// Service referenced by the event, if any.
    pub fn service(&self) -> Option<&Service> {
        match &self.kind {
            EventKind::ServiceChanged { service }
            | EventKind::ClientDeregisterService { service, .. } => Some(service),
            _ => None,
        }
    }

    /// Client referenced by the event, if any.
    pub fn client_id(&self) -> Option<&str> {
        match &self.kind {
            EventKind::ClientChanged { client_id }
            | EventKind::ClientDeregisterService { client_id, .. }
            | EventKind::ClientDisconnect { client_id } => Some(&**client_id),
            _ => None,
        }
    }
}
