//! # Registry client.
//!
//! A [`Client`] is one registered party (a connection or an `ip:port` peer).
//! It owns at most one [`InstancePublishInfo`] per [`Service`] and a
//! last-updated timestamp refreshed by connection-level beats.
//!
//! ## Identity
//! - `client_id` keys the client in the [`ClientManager`](crate::ClientManager).
//! - `responsible_id` is what the distro mapper hashes to pick the owning node;
//!   for `ip:port` clients it is the address without the ephemeral suffix.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::instance::{InstancePublishInfo, SharedInstance, now_millis};
use super::service::Service;

/// Separator between address and ephemeral flag in `ip:port` client ids.
pub const ID_DELIMITER: char = '#';

/// A registered client and the instances it publishes.
#[derive(Debug)]
pub struct Client {
    client_id: Arc<str>,
    responsible_id: Arc<str>,
    ephemeral: bool,
    published: RwLock<HashMap<Service, SharedInstance>>,
    last_updated_ms: AtomicU64,
}

impl Client {
    /// Creates a client whose responsibility key equals its id.
    pub fn new(client_id: impl Into<Arc<str>>, ephemeral: bool) -> Self {
        let client_id = client_id.into();
        Self {
            responsible_id: Arc::clone(&client_id),
            client_id,
            ephemeral,
            published: RwLock::new(HashMap::new()),
            last_updated_ms: AtomicU64::new(now_millis()),
        }
    }

    /// Creates an `ip:port` client (`ip:port#ephemeral`), responsible key `ip:port`.
    ///
    /// ```
    /// use beatvisor::Client;
    ///
    /// let c = Client::ip_port("10.0.0.7", 8848, true);
    /// assert_eq!(c.client_id(), "10.0.0.7:8848#true");
    /// assert_eq!(c.responsible_id(), "10.0.0.7:8848");
    /// ```
    pub fn ip_port(ip: &str, port: u16, ephemeral: bool) -> Self {
        let address = format!("{ip}:{port}");
        Self {
            client_id: Arc::from(format!("{address}{ID_DELIMITER}{ephemeral}")),
            responsible_id: Arc::from(address),
            ephemeral,
            published: RwLock::new(HashMap::new()),
            last_updated_ms: AtomicU64::new(now_millis()),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn responsible_id(&self) -> &str {
        &self.responsible_id
    }

    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    pub fn last_updated_ms(&self) -> u64 {
        self.last_updated_ms.load(Ordering::Acquire)
    }

    /// Advances the client timestamp; older stamps are ignored.
    pub fn set_last_updated(&self, at_ms: u64) {
        self.last_updated_ms.fetch_max(at_ms, Ordering::AcqRel);
    }

    /// Publishes `info` under `service`, replacing any previous record.
    ///
    /// Returns `true` if the service was not published before.
    pub fn add_service_instance(&self, service: Service, info: InstancePublishInfo) -> bool {
        let fresh = self
            .published
            .write()
            .insert(service, info.into_shared())
            .is_none();
        self.set_last_updated(now_millis());
        fresh
    }

    /// Removes the instance published under `service`.
    pub fn remove_service_instance(&self, service: &Service) -> Option<SharedInstance> {
        let removed = self.published.write().remove(service);
        if removed.is_some() {
            self.set_last_updated(now_millis());
        }
        removed
    }

    /// Removes the record under `service` only if it is still `instance`.
    ///
    /// Callers may hold `instance`'s lock: the map lock is never held while
    /// an instance lock is acquired.
    pub(crate) fn remove_service_instance_if_current(
        &self,
        service: &Service,
        instance: &SharedInstance,
    ) -> bool {
        let mut published = self.published.write();
        let current = published
            .get(service)
            .is_some_and(|i| Arc::ptr_eq(i, instance));
        if current {
            published.remove(service);
        }
        drop(published);
        if current {
            self.set_last_updated(now_millis());
        }
        current
    }

    pub fn get_instance_publish_info(&self, service: &Service) -> Option<SharedInstance> {
        self.published.read().get(service).cloned()
    }

    /// Snapshot of every published service.
    pub fn published_services(&self) -> Vec<Service> {
        self.published.read().keys().cloned().collect()
    }

    /// Snapshot of every `(service, instance)` pair.
    pub fn published_instances(&self) -> Vec<(Service, SharedInstance)> {
        self.published
            .read()
            .iter()
            .map(|(s, i)| (s.clone(), Arc::clone(i)))
            .collect()
    }

    pub fn instance_count(&self) -> usize {
        self.published.read().len()
    }

    /// Stamps every owned instance with `at_ms`, then the client itself.
    ///
    /// Returns how many instances were stamped.
    pub(crate) fn refresh_all_heartbeats(&self, at_ms: u64) -> usize {
        let instances: Vec<SharedInstance> = self.published.read().values().cloned().collect();
        for instance in &instances {
            instance.lock().refresh_heartbeat(at_ms);
        }
        self.set_last_updated(at_ms);
        instances.len()
    }
}
