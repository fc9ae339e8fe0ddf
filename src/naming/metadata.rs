//! # Instance and service metadata.
//!
//! Metadata is managed outside the liveness core; checkers and interceptors
//! only read it through [`MetadataProvider`]. [`MetadataStore`] is the
//! in-memory implementation used when the embedding process has no store of
//! its own.
//!
//! ## Preserved keys
//! - [`HEART_BEAT_TIMEOUT`]: ms without a beat before an instance turns unhealthy
//! - [`IP_DELETE_TIMEOUT`]: ms without a beat before an instance is removed
//! - [`BEAT_CHECK_ENABLED`]: `"false"` disables sweep checks for a service/instance

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use super::service::Service;

pub const HEART_BEAT_TIMEOUT: &str = "preserved.heart.beat.timeout";
pub const IP_DELETE_TIMEOUT: &str = "preserved.ip.delete.timeout";
pub const BEAT_CHECK_ENABLED: &str = "preserved.beat.check.enabled";

/// Operator-managed metadata of one instance.
///
/// Only `extend_data` is consulted by the checks; see the preserved keys above.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstanceMetadata {
    pub extend_data: HashMap<String, String>,
}

impl InstanceMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extend(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extend_data.insert(key.into(), value.into());
        self
    }
}

/// Operator-managed metadata of one service.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceMetadata {
    pub extend_data: HashMap<String, String>,
}

impl ServiceMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extend(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extend_data.insert(key.into(), value.into());
        self
    }
}

/// Read access to metadata overrides.
pub trait MetadataProvider: Send + Sync + 'static {
    /// Metadata of the instance identified by `metadata_id` within `service`.
    fn instance_metadata(&self, service: &Service, metadata_id: &str)
    -> Option<Arc<InstanceMetadata>>;

    /// Metadata of `service` itself.
    fn service_metadata(&self, service: &Service) -> Option<Arc<ServiceMetadata>>;
}

/// In-memory metadata store.
#[derive(Default)]
pub struct MetadataStore {
    instances: DashMap<(Service, String), Arc<InstanceMetadata>>,
    services: DashMap<Service, Arc<ServiceMetadata>>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_instance_metadata(
        &self,
        service: Service,
        metadata_id: impl Into<String>,
        metadata: InstanceMetadata,
    ) {
        self.instances
            .insert((service, metadata_id.into()), Arc::new(metadata));
    }

    pub fn update_service_metadata(&self, service: Service, metadata: ServiceMetadata) {
        self.services.insert(service, Arc::new(metadata));
    }

    pub fn remove_instance_metadata(&self, service: &Service, metadata_id: &str) {
        self.instances
            .remove(&(service.clone(), metadata_id.to_string()));
    }

    pub fn remove_service_metadata(&self, service: &Service) {
        self.services.remove(service);
    }
}

impl MetadataProvider for MetadataStore {
    fn instance_metadata(
        &self,
        service: &Service,
        metadata_id: &str,
    ) -> Option<Arc<InstanceMetadata>> {
        self.instances
            .get(&(service.clone(), metadata_id.to_string()))
            .map(|m| Arc::clone(m.value()))
    }

    fn service_metadata(&self, service: &Service) -> Option<Arc<ServiceMetadata>> {
        self.services.get(service).map(|m| Arc::clone(m.value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_returns_updated_metadata() {
        let store = MetadataStore::new();
        let svc = Service::new("public", "g", "svc", true);
        store.update_service_metadata(
            svc.clone(),
            ServiceMetadata::new().with_extend(HEART_BEAT_TIMEOUT, "9999"),
        );
        store.update_instance_metadata(
            svc.clone(),
            "1.1.1.1:80:DEFAULT",
            InstanceMetadata::new().with_extend(HEART_BEAT_TIMEOUT, "5000"),
        );

        let service_md = store.service_metadata(&svc).expect("service metadata");
        assert_eq!(service_md.extend_data[HEART_BEAT_TIMEOUT], "9999");
        let instance_md = store
            .instance_metadata(&svc, "1.1.1.1:80:DEFAULT")
            .expect("instance metadata");
        assert_eq!(instance_md.extend_data[HEART_BEAT_TIMEOUT], "5000");
        assert!(store.instance_metadata(&svc, "2.2.2.2:80:DEFAULT").is_none());

        store.remove_instance_metadata(&svc, "1.1.1.1:80:DEFAULT");
        assert!(store.instance_metadata(&svc, "1.1.1.1:80:DEFAULT").is_none());
    }
}
