//! # Per-event-type publisher.
//!
//! A [`Publisher`] owns the bounded queue, the subscriber set and the single
//! dispatch loop of one [`EventType`].
//!
//! ## Architecture
//! ```text
//! publish(ev) ──try_send──► [bounded mpsc] ──► dispatch loop (one tokio task)
//!      │                                           │
//!      │ queue full + subscribers present          ├─ no subscriber: park, buffer up
//!      └──► receive_event() on the caller          │   to `capacity` events locally
//!                                                  └─ subscribers: receive_event()
//!                                                        ├─► inline sub.on_event().await
//!                                                        └─► executor.spawn(sub.on_event())
//! ```
//!
//! ## States
//! `Created → WaitingForSubscriber ⇄ Running → Shutdown`
//!
//! ## Rules
//! - **FIFO per type**: inline subscribers see queued events in publish order.
//! - **Overflow**: with subscribers present, a full queue delivers on the
//!   caller's task (no loss, ordering broken for that event, `warn!`). Without
//!   subscribers the caller waits up to `overflow_wait` for room, then drops.
//! - **Stale filter**: subscribers with `ignore_stale_events()` skip events whose
//!   `seq` is below the highest sequence already dispatched.
//! - **Isolation**: a panicking subscriber is logged; the loop keeps going.
//! - **Shutdown**: the loop stops, queued events are discarded.

use std::collections::VecDeque;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::error::{BusError, panic_message};
use crate::events::{Event, EventType};
use crate::subscribers::Subscribe;

/// Largest queue capacity a publisher accepts; larger requests are clamped.
pub const MAX_PUBLISHER_CAPACITY: usize = usize::MAX >> 3;

/// Lifecycle state of a [`Publisher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PublisherState {
    /// Constructed, dispatch loop not spawned yet.
    Created = 0,
    /// Loop is parked until at least one subscriber registers.
    WaitingForSubscriber = 1,
    /// Loop is delivering events.
    Running = 2,
    /// Loop stopped; publishing fails.
    Shutdown = 3,
}

impl PublisherState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => PublisherState::Created,
            1 => PublisherState::WaitingForSubscriber,
            2 => PublisherState::Running,
            _ => PublisherState::Shutdown,
        }
    }
}

struct Shared {
    event_type: EventType,
    capacity: usize,
    overflow_wait: Duration,
    tx: mpsc::Sender<Arc<Event>>,
    rx: Mutex<Option<mpsc::Receiver<Arc<Event>>>>,
    subscribers: RwLock<Vec<Arc<dyn Subscribe>>>,
    subscriber_count: watch::Sender<usize>,
    highest_seq: AtomicU64,
    parked: AtomicUsize,
    state: AtomicU8,
    token: CancellationToken,
}

/// Dispatch unit for one event type. Cheap to clone.
#[derive(Clone)]
pub struct Publisher {
    shared: Arc<Shared>,
}

impl Publisher {
    /// Creates a publisher in the `Created` state.
    ///
    /// - Capacity is clamped to `1..=MAX_PUBLISHER_CAPACITY`.
    /// - Call [`start`](Self::start) to spawn the dispatch loop.
    pub(crate) fn new(event_type: EventType, capacity: usize, overflow_wait: Duration) -> Self {
        let capacity = capacity.clamp(1, MAX_PUBLISHER_CAPACITY);
        let (tx, rx) = mpsc::channel::<Arc<Event>>(capacity);
        let (subscriber_count, _) = watch::channel(0usize);

        Self {
            shared: Arc::new(Shared {
                event_type,
                capacity,
                overflow_wait,
                tx,
                rx: Mutex::new(Some(rx)),
                subscribers: RwLock::new(Vec::new()),
                subscriber_count,
                highest_seq: AtomicU64::new(0),
                parked: AtomicUsize::new(0),
                state: AtomicU8::new(PublisherState::Created as u8),
                token: CancellationToken::new(),
            }),
        }
    }

    /// Spawns the dispatch loop on `runtime` (once).
    pub(crate) fn start(&self, runtime: &Handle) {
        let Some(rx) = self.shared.rx.lock().take() else {
            return;
        };
        let shared = Arc::clone(&self.shared);
        runtime.spawn(dispatch_loop(shared, rx));
        debug!(event_type = %self.shared.event_type, capacity = self.shared.capacity, "publisher started");
    }

    pub fn event_type(&self) -> EventType {
        self.shared.event_type
    }

    /// Whether both handles refer to the same publisher.
    pub fn same_as(&self, other: &Publisher) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn state(&self) -> PublisherState {
        PublisherState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Highest sequence number dispatched so far (0 if none).
    pub fn highest_sequence(&self) -> u64 {
        self.shared.highest_seq.load(Ordering::Acquire)
    }

    /// Number of events not dispatched yet: queued plus parked while the
    /// publisher waits for its first subscriber.
    pub fn current_event_size(&self) -> usize {
        let queued = self.shared.tx.max_capacity() - self.shared.tx.capacity();
        queued + self.shared.parked.load(Ordering::Acquire)
    }

    pub fn subscriber_count(&self) -> usize {
        *self.shared.subscriber_count.borrow()
    }

    /// Adds a subscriber; returns `false` if it was already attached.
    pub(crate) fn add_subscriber(&self, subscriber: Arc<dyn Subscribe>) -> bool {
        let mut subs = self.shared.subscribers.write();
        if subs.iter().any(|s| same_subscriber(s, &subscriber)) {
            return false;
        }
        subs.push(subscriber);
        self.shared.subscriber_count.send_replace(subs.len());
        true
    }

    /// Removes a subscriber; returns `false` if it was not attached.
    pub(crate) fn remove_subscriber(&self, subscriber: &Arc<dyn Subscribe>) -> bool {
        let mut subs = self.shared.subscribers.write();
        let before = subs.len();
        subs.retain(|s| !same_subscriber(s, subscriber));
        let removed = subs.len() != before;
        if removed {
            self.shared.subscriber_count.send_replace(subs.len());
        }
        removed
    }

    /// Enqueues an event for dispatch.
    ///
    /// Never blocks while the queue has room. On a full queue:
    /// - subscribers present → delivered on the caller's task, `Ok(())`;
    /// - no subscriber yet → waits up to `overflow_wait` for room, then drops
    ///   the event with a warning (`Ok(())`, overflow is not an error).
    pub(crate) async fn publish(&self, event: Event) -> Result<(), BusError> {
        let event_type = self.shared.event_type;
        if self.state() == PublisherState::Shutdown {
            return Err(BusError::PublisherShutdown { event_type });
        }

        match self.shared.tx.try_send(Arc::new(event)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(event)) => self.publish_on_overflow(event).await,
            Err(TrySendError::Closed(_)) => Err(BusError::PublisherShutdown { event_type }),
        }
    }

    async fn publish_on_overflow(&self, event: Arc<Event>) -> Result<(), BusError> {
        let event_type = self.shared.event_type;
        if self.subscriber_count() > 0 {
            warn!(
                event_type = %event_type,
                capacity = self.shared.capacity,
                seq = event.seq,
                "publisher queue full, dispatching on caller"
            );
            self.shared.receive_event(event).await;
            return Ok(());
        }

        match self
            .shared
            .tx
            .send_timeout(event, self.shared.overflow_wait)
            .await
        {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(event)) => {
                warn!(
                    event_type = %event_type,
                    capacity = self.shared.capacity,
                    seq = event.seq,
                    "publisher queue full and no subscriber, event dropped"
                );
                Ok(())
            }
            Err(SendTimeoutError::Closed(_)) => Err(BusError::PublisherShutdown { event_type }),
        }
    }

    /// Stops the dispatch loop; queued events are discarded.
    pub(crate) fn shutdown(&self) {
        self.shared
            .state
            .store(PublisherState::Shutdown as u8, Ordering::Release);
        self.shared.token.cancel();
        debug!(event_type = %self.shared.event_type, "publisher shut down");
    }
}

impl fmt::Debug for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("event_type", &self.shared.event_type)
            .field("capacity", &self.shared.capacity)
            .field("state", &self.state())
            .field("subscribers", &self.subscriber_count())
            .field("highest_seq", &self.highest_sequence())
            .finish()
    }
}

impl Shared {
    /// Moves to `next` unless the publisher is already shut down.
    fn set_state(&self, next: PublisherState) {
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                (cur != PublisherState::Shutdown as u8).then_some(next as u8)
            });
    }

    /// Fans one event out to every matching, non-stale subscriber.
    async fn receive_event(&self, event: Arc<Event>) {
        let highest = self.highest_seq.load(Ordering::Acquire);
        let subscribers: Vec<Arc<dyn Subscribe>> = self.subscribers.read().clone();

        if subscribers.is_empty() {
            warn!(event_type = %self.event_type, seq = event.seq, "no subscriber, event dropped");
        }

        for subscriber in subscribers {
            if !subscriber.matches(&event) {
                continue;
            }
            if subscriber.ignore_stale_events() && event.seq < highest {
                trace!(
                    subscriber = subscriber.name(),
                    seq = event.seq,
                    highest,
                    "stale event skipped"
                );
                continue;
            }
            notify_subscriber(subscriber, Arc::clone(&event)).await;
        }

        self.highest_seq.fetch_max(event.seq, Ordering::AcqRel);
    }
}

/// Single consumer of one publisher's queue.
async fn dispatch_loop(shared: Arc<Shared>, mut rx: mpsc::Receiver<Arc<Event>>) {
    let mut subscribers = shared.subscriber_count.subscribe();
    let mut backlog: VecDeque<Arc<Event>> = VecDeque::new();
    let token = shared.token.clone();

    loop {
        if *subscribers.borrow_and_update() > 0 {
            shared.set_state(PublisherState::Running);
            if let Some(event) = backlog.pop_front() {
                shared.parked.store(backlog.len(), Ordering::Release);
                shared.receive_event(event).await;
                continue;
            }
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                received = rx.recv() => match received {
                    Some(event) if *subscribers.borrow() > 0 => shared.receive_event(event).await,
                    Some(event) => {
                        backlog.push_back(event);
                        shared.parked.store(backlog.len(), Ordering::Release);
                    }
                    None => break,
                },
            }
        } else {
            shared.set_state(PublisherState::WaitingForSubscriber);
            let has_room = backlog.len() < shared.capacity;
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                changed = subscribers.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                received = rx.recv(), if has_room => match received {
                    Some(event) => {
                        backlog.push_back(event);
                        shared.parked.store(backlog.len(), Ordering::Release);
                    }
                    None => break,
                },
            }
        }
    }

    shared
        .state
        .store(PublisherState::Shutdown as u8, Ordering::Release);
    shared.parked.store(0, Ordering::Release);
    let discarded = backlog.len() + rx.len();
    if discarded > 0 {
        debug!(event_type = %shared.event_type, discarded, "dispatch loop stopped, queued events discarded");
    }
}

async fn notify_subscriber(subscriber: Arc<dyn Subscribe>, event: Arc<Event>) {
    match subscriber.executor() {
        Some(handle) => {
            handle.spawn(invoke(subscriber, event));
        }
        None => invoke(subscriber, event).await,
    }
}

async fn invoke(subscriber: Arc<dyn Subscribe>, event: Arc<Event>) {
    let fut = subscriber.on_event(event.as_ref());
    if let Err(panic_err) = AssertUnwindSafe(fut).catch_unwind().await {
        error!(
            subscriber = subscriber.name(),
            event_type = %event.event_type(),
            seq = event.seq,
            panic = %panic_message(panic_err.as_ref()),
            "subscriber panicked while handling event"
        );
    }
}

fn same_subscriber(a: &Arc<dyn Subscribe>, b: &Arc<dyn Subscribe>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::subscribers::FnSubscriber;

    const TOPIC: EventType = EventType::Custom("publisher-test");

    fn publisher(capacity: usize) -> Publisher {
        let p = Publisher::new(TOPIC, capacity, Duration::from_millis(500));
        p.start(&Handle::current());
        p
    }

    fn recording(seen: Arc<Mutex<Vec<u64>>>) -> Arc<dyn Subscribe> {
        FnSubscriber::exact("recorder", TOPIC, move |ev: &Event| seen.lock().push(ev.seq)).arc()
    }

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
    async fn test_buffers_until_first_subscriber_in_order() {
        let p = publisher(2);
        let events: Vec<Event> = (0..3).map(|_| Event::custom("publisher-test")).collect();
        let expected: Vec<u64> = events.iter().map(|e| e.seq).collect();
        for ev in events {
            p.publish(ev).await.expect("publish");
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        assert!(p.add_subscriber(recording(Arc::clone(&seen))));

        wait_until(|| seen.lock().len() == 3).await;
        assert_eq!(*seen.lock(), expected);
    }

    #[tokio::test]
    async fn test_pending_count_includes_parked_events() {
        let p = publisher(2);
        for _ in 0..3 {
            p.publish(Event::custom("publisher-test"))
                .await
                .expect("publish");
        }

        wait_until(|| p.shared.parked.load(Ordering::Acquire) == 2).await;
        assert_eq!(p.current_event_size(), 3);

        let seen = Arc::new(Mutex::new(Vec::new()));
        p.add_subscriber(recording(Arc::clone(&seen)));
        wait_until(|| seen.lock().len() == 3).await;
        assert_eq!(p.current_event_size(), 0);
    }

    #[tokio::test]
    async fn test_oversized_capacity_is_clamped() {
        let p = publisher(usize::MAX);
        assert_eq!(p.capacity(), MAX_PUBLISHER_CAPACITY);
        assert_eq!(Publisher::new(TOPIC, 0, Duration::ZERO).capacity(), 1);

        let seen = Arc::new(Mutex::new(Vec::new()));
        p.add_subscriber(recording(Arc::clone(&seen)));
        p.publish(Event::custom("publisher-test"))
            .await
            .expect("publish");
        wait_until(|| seen.lock().len() == 1).await;
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let p = Publisher::new(TOPIC, 4, Duration::from_millis(100));
        assert_eq!(p.state(), PublisherState::Created);

        p.start(&Handle::current());
        wait_until(|| p.state() == PublisherState::WaitingForSubscriber).await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        p.add_subscriber(recording(seen));
        wait_until(|| p.state() == PublisherState::Running).await;

        p.shutdown();
        assert_eq!(p.state(), PublisherState::Shutdown);
        let err = p.publish(Event::custom("publisher-test")).await.unwrap_err();
        assert!(matches!(err, BusError::PublisherShutdown { .. }));
    }

    #[tokio::test]
    async fn test_inline_subscribers_see_publish_order() {
        let p = publisher(64);
        let seen = Arc::new(Mutex::new(Vec::new()));
        p.add_subscriber(recording(Arc::clone(&seen)));

        let mut expected = Vec::new();
        for _ in 0..20 {
            let ev = Event::custom("publisher-test");
            expected.push(ev.seq);
            p.publish(ev).await.expect("publish");
        }

        wait_until(|| seen.lock().len() == 20).await;
        assert_eq!(*seen.lock(), expected);
    }

    #[tokio::test]
    async fn test_each_matching_subscriber_invoked_once_per_event() {
        let p = publisher(16);
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        let (a2, b2) = (Arc::clone(&a), Arc::clone(&b));
        p.add_subscriber(
            FnSubscriber::exact("a", TOPIC, move |_: &Event| {
                a2.fetch_add(1, Ordering::SeqCst);
            })
            .arc(),
        );
        p.add_subscriber(
            FnSubscriber::exact("b", TOPIC, move |_: &Event| {
                b2.fetch_add(1, Ordering::SeqCst);
            })
            .arc(),
        );

        for _ in 0..5 {
            p.publish(Event::custom("publisher-test")).await.expect("publish");
        }

        wait_until(|| a.load(Ordering::SeqCst) == 5 && b.load(Ordering::SeqCst) == 5).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(a.load(Ordering::SeqCst), 5);
        assert_eq!(b.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_duplicate_subscriber_is_ignored() {
        let p = publisher(4);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sub = recording(seen);
        assert!(p.add_subscriber(Arc::clone(&sub)));
        assert!(!p.add_subscriber(Arc::clone(&sub)));
        assert_eq!(p.subscriber_count(), 1);

        assert!(p.remove_subscriber(&sub));
        assert!(!p.remove_subscriber(&sub));
        assert_eq!(p.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_panicking_subscriber_is_isolated() {
        let p = publisher(8);
        p.add_subscriber(
            FnSubscriber::exact("boom", TOPIC, |_: &Event| panic!("subscriber failure")).arc(),
        );
        let seen = Arc::new(Mutex::new(Vec::new()));
        p.add_subscriber(recording(Arc::clone(&seen)));

        p.publish(Event::custom("publisher-test")).await.expect("publish");
        p.publish(Event::custom("publisher-test")).await.expect("publish");

        wait_until(|| seen.lock().len() == 2).await;
        assert_eq!(p.state(), PublisherState::Running);
    }

    #[tokio::test]
    async fn test_overflow_with_subscriber_delivers_on_caller() {
        // Subscriber blocks the loop so the queue (capacity 1) fills up.
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));

        struct Gated {
            gate: Arc<tokio::sync::Semaphore>,
            seen: Arc<Mutex<Vec<u64>>>,
        }

        #[async_trait::async_trait]
        impl Subscribe for Gated {
            async fn on_event(&self, event: &Event) {
                if self.seen.lock().is_empty() {
                    self.seen.lock().push(event.seq);
                    let _permit = self.gate.acquire().await;
                    return;
                }
                self.seen.lock().push(event.seq);
            }
            fn interest(&self) -> crate::subscribers::Interest {
                crate::subscribers::Interest::Exact(TOPIC)
            }
        }

        let p = publisher(1);
        p.add_subscriber(Arc::new(Gated {
            gate: Arc::clone(&gate),
            seen: Arc::clone(&seen),
        }));
        wait_until(|| p.state() == PublisherState::Running).await;

        let first = Event::custom("publisher-test");
        let first_seq = first.seq;
        p.publish(first).await.expect("publish");
        wait_until(|| seen.lock().len() == 1).await;

        // Loop is stuck inside the first callback: one event fills the queue,
        // the next one overflows and is delivered on this task.
        p.publish(Event::custom("publisher-test")).await.expect("publish");
        let overflow = Event::custom("publisher-test");
        let overflow_seq = overflow.seq;
        p.publish(overflow).await.expect("publish");
        assert_eq!(*seen.lock(), vec![first_seq, overflow_seq]);

        gate.add_permits(1);
        wait_until(|| seen.lock().len() == 3).await;
    }

    #[tokio::test]
    async fn test_stale_events_skipped_for_opted_in_subscribers() {
        let p = publisher(8);
        let stale_filtered = Arc::new(Mutex::new(Vec::new()));
        let everything = Arc::new(Mutex::new(Vec::new()));
        let (sf, ev_all) = (Arc::clone(&stale_filtered), Arc::clone(&everything));
        p.add_subscriber(
            FnSubscriber::exact("fresh-only", TOPIC, move |e: &Event| sf.lock().push(e.seq))
                .ignoring_stale()
                .arc(),
        );
        p.add_subscriber(
            FnSubscriber::exact("all", TOPIC, move |e: &Event| ev_all.lock().push(e.seq)).arc(),
        );

        let older = Event::custom("publisher-test");
        let newer = Event::custom("publisher-test");
        let (older_seq, newer_seq) = (older.seq, newer.seq);
        p.publish(newer).await.expect("publish");
        p.publish(older).await.expect("publish");

        wait_until(|| everything.lock().len() == 2).await;
        assert_eq!(*everything.lock(), vec![newer_seq, older_seq]);
        assert_eq!(*stale_filtered.lock(), vec![newer_seq]);
        assert_eq!(p.highest_sequence(), newer_seq);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_executor_subscriber_does_not_block_loop() {
        let p = publisher(8);
        let release = Arc::new(tokio::sync::Notify::new());
        let inline_seen = Arc::new(AtomicUsize::new(0));

        struct Slow(Arc<tokio::sync::Notify>);

        #[async_trait::async_trait]
        impl Subscribe for Slow {
            async fn on_event(&self, _event: &Event) {
                self.0.notified().await;
            }
            fn interest(&self) -> crate::subscribers::Interest {
                crate::subscribers::Interest::Exact(TOPIC)
            }
            fn executor(&self) -> Option<tokio::runtime::Handle> {
                Some(tokio::runtime::Handle::current())
            }
        }

        p.add_subscriber(Arc::new(Slow(Arc::clone(&release))));
        let counter = Arc::clone(&inline_seen);
        p.add_subscriber(
            FnSubscriber::exact("inline", TOPIC, move |_: &Event| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .arc(),
        );

        for _ in 0..3 {
            p.publish(Event::custom("publisher-test")).await.expect("publish");
        }
        wait_until(|| inline_seen.load(Ordering::SeqCst) == 3).await;
        release.notify_waiters();
    }
}
