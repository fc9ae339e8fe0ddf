//! Registry data model: services, clients, published instances and metadata.
//!
//! ## Ownership
//! ```text
//! ClientManager ──► Client ──► { Service → SharedInstance (Mutex<InstancePublishInfo>) }
//!                               ▲
//!               beat ingestion ─┤ (lock, stamp, maybe recover)
//!               checker chain  ─┘ (lock, decide, mutate)
//! ```

mod client;
mod instance;
mod manager;
mod metadata;
mod service;

pub use client::{Client, ID_DELIMITER};
pub use instance::{DEFAULT_CLUSTER, InstancePublishInfo, SharedInstance, now_millis};
pub use manager::ClientManager;
pub use metadata::{
    BEAT_CHECK_ENABLED, HEART_BEAT_TIMEOUT, IP_DELETE_TIMEOUT, InstanceMetadata,
    MetadataProvider, MetadataStore, ServiceMetadata,
};
pub use service::{DEFAULT_GROUP, DEFAULT_NAMESPACE, GROUP_SEPARATOR, Service};
