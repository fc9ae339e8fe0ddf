//! # beatvisor
//!
//! **Beatvisor** is the liveness core of a service-discovery registry: an
//! in-process, typed event bus plus the heartbeat-driven health/expiry engine
//! that is its heaviest producer.
//!
//! It tracks published instances, turns silent ones unhealthy, removes the ones
//! that stay silent, and tells the rest of the registry about every transition
//! through per-type event channels. A distro mapper decides which cluster node
//! drives the checks of each client.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   beats (single / connection)          client lifecycle
//!            │                                  │
//!            ▼                                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  HealthCheckEngine                                                │
//! │  - ClientManager (clients → services → Mutex<InstancePublishInfo>)│
//! │  - HealthCheckReactor (one sweep task per client)                 │
//! │  - CheckContext (checkers, interceptor chains, metadata, switches)│
//! └──────┬───────────────────────────────────────────────────┬────────┘
//!        │ every check_interval                              │
//!        ▼                                                   │
//!   ClientBeatCheckTask ─► [health-check-enabled, responsible]
//!        │                                                   │
//!        └─► InstanceBeatCheckTask (per service)             │
//!              ─► [responsible, service-enabled, instance-enabled]
//!              ─► UnhealthyInstanceChecker ─► ExpiredInstanceChecker
//!                        │                          │        │
//!                        ▼                          ▼        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                     EventBus (one Publisher per type)             │
//! │  ServiceChanged │ ClientChanged │ ClientDeregisterService │ ...   │
//! │  bounded queue + dispatch loop each                               │
//! └──────────────┬──────────────────────────┬─────────────────────────┘
//!                ▼                          ▼
//!        exact subscribers         predicate subscribers
//!       (push, index, ...)          (LogWriter, audit)
//! ```
//!
//! ### Instance lifecycle
//! ```text
//! register_instance ──► HEALTHY ──(no beat > heartbeat timeout)──► UNHEALTHY
//!                          ▲                                           │
//!                          └──────────── beat (fast recovery) ─────────┘
//! HEALTHY / UNHEALTHY ──(no beat > delete timeout, expire on)──► REMOVED
//! ```
//!
//! ## Features
//! | Area               | Description                                                    | Key types / traits                              |
//! |--------------------|----------------------------------------------------------------|-------------------------------------------------|
//! | **Event bus**      | Per-type publishers, ordered inline dispatch, overflow policy. | [`EventBus`], [`Publisher`], [`Event`]          |
//! | **Subscriber API** | Exact or predicate subscribers, optional executor.             | [`Subscribe`], [`Interest`], [`FnSubscriber`]   |
//! | **Health checks**  | Beat ingestion, checkers, interceptor chains.                  | [`HealthCheckEngine`], [`InstanceBeatChecker`]  |
//! | **Partitioning**   | One owner node per client.                                     | [`Responsibility`], [`DistroMapper`]            |
//! | **Errors**         | Typed errors with stable labels.                               | [`BusError`], [`HealthCheckError`]              |
//! | **Configuration**  | TOML-loadable settings and runtime switches.                   | [`Config`], [`Switches`]                        |
//!
//! ## Optional features
//! - `logging`: exports a built-in [`LogWriter`] that logs every event via `tracing`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use beatvisor::{
//!     Client, Config, Event, EventType, FnSubscriber, HealthCheckEngine, InstancePublishInfo,
//!     Service, Subscribe,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let watcher: Arc<dyn Subscribe> =
//!         FnSubscriber::exact("push", EventType::ServiceChanged, |ev: &Event| {
//!             println!("service changed: {:?}", ev.service());
//!         })
//!         .arc();
//!
//!     let engine = HealthCheckEngine::builder(Config::default())
//!         .with_subscribers(vec![watcher])
//!         .build()?;
//!
//!     let client = engine.client_connected(Client::ip_port("10.0.0.5", 8080, true));
//!     let svc = Service::new("public", "DEFAULT_GROUP", "orders", true);
//!     engine
//!         .register_instance(client.client_id(), svc, InstancePublishInfo::new("10.0.0.5", 8080))
//!         .await?;
//!
//!     engine.shutdown();
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod healthcheck;
mod naming;
mod subscribers;

// ---- Public re-exports ----

pub use crate::core::{Config, EngineBuilder, HealthCheckEngine, Switches, load_config};
pub use error::{BusError, ConfigError, HealthCheckError};
pub use events::{
    Event, EventBus, EventKind, EventType, MAX_PUBLISHER_CAPACITY, Publisher, PublisherState,
};
pub use healthcheck::{
    BeatInfo, BeatOutcome, CheckContext, CheckPlan, ClientBeatCheckTask, DistroMapper,
    ExpiredInstanceChecker, HealthCheckEnableInterceptor, HealthCheckReactor,
    InstanceBeatCheckTask, InstanceBeatChecker, InstanceEnableInterceptor, InterceptOutcome,
    Interceptable, Interceptor, InterceptorChain, Responsibility, ResponsibleInterceptor,
    ServiceEnableInterceptor, Standalone, UnhealthyInstanceChecker,
};
pub use naming::{
    BEAT_CHECK_ENABLED, Client, ClientManager, DEFAULT_CLUSTER, DEFAULT_GROUP, DEFAULT_NAMESPACE,
    GROUP_SEPARATOR, HEART_BEAT_TIMEOUT, ID_DELIMITER, IP_DELETE_TIMEOUT, InstanceMetadata,
    InstancePublishInfo, MetadataProvider, MetadataStore, ServiceMetadata, Service,
    SharedInstance, now_millis,
};
pub use subscribers::{FnSubscriber, Interest, Subscribe};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
