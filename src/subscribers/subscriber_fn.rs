//! # Function-backed subscriber (`FnSubscriber`)
//!
//! [`FnSubscriber`] wraps a closure `F: Fn(&Event)` and a matching rule, so
//! simple listeners need no dedicated type.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use beatvisor::{Event, EventType, FnSubscriber, Interest, Subscribe};
//!
//! let exact = FnSubscriber::exact("svc-watch", EventType::ServiceChanged, |_ev: &Event| {});
//! assert_eq!(exact.interest(), Interest::Exact(EventType::ServiceChanged));
//!
//! let audit = FnSubscriber::predicate(
//!     "client-audit",
//!     |ev: &Event| ev.client_id().is_some(),
//!     |_ev: &Event| {},
//! );
//! assert!(audit.matches(&Event::client_changed("c1")));
//! assert!(!audit.matches(&Event::custom("other")));
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio::runtime::Handle;

use crate::events::{Event, EventType};
use crate::subscribers::{Interest, Subscribe};

type Predicate = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

enum Matcher {
    Exact(EventType),
    Predicate(Predicate),
}

/// Closure-backed subscriber.
pub struct FnSubscriber<F> {
    name: &'static str,
    matcher: Matcher,
    executor: Option<Handle>,
    ignore_stale: bool,
    f: F,
}

impl<F> FnSubscriber<F>
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    /// Subscriber for exactly one event type.
    pub fn exact(name: &'static str, event_type: EventType, f: F) -> Self {
        Self {
            name,
            matcher: Matcher::Exact(event_type),
            executor: None,
            ignore_stale: false,
            f,
        }
    }

    /// Subscriber for every event `pred` accepts, across all publishers.
    pub fn predicate<P>(name: &'static str, pred: P, f: F) -> Self
    where
        P: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        Self {
            name,
            matcher: Matcher::Predicate(Arc::new(pred)),
            executor: None,
            ignore_stale: false,
            f,
        }
    }

    /// Dispatch on `handle` instead of inline on the publisher loop.
    pub fn with_executor(mut self, handle: Handle) -> Self {
        self.executor = Some(handle);
        self
    }

    /// Drop events older than the publisher's highest dispatched sequence.
    pub fn ignoring_stale(mut self) -> Self {
        self.ignore_stale = true;
        self
    }

    /// Wraps the subscriber into a shared handle.
    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl<F> Subscribe for FnSubscriber<F>
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    async fn on_event(&self, event: &Event) {
        (self.f)(event);
    }

    fn interest(&self) -> Interest {
        match &self.matcher {
            Matcher::Exact(event_type) => Interest::Exact(*event_type),
            Matcher::Predicate(_) => Interest::Predicate,
        }
    }

    fn matches(&self, event: &Event) -> bool {
        match &self.matcher {
            Matcher::Exact(event_type) => event.event_type() == *event_type,
            Matcher::Predicate(pred) => pred(event),
        }
    }

    fn executor(&self) -> Option<Handle> {
        self.executor.clone()
    }

    fn ignore_stale_events(&self) -> bool {
        self.ignore_stale
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
