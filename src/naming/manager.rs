//! # Client manager.
//!
//! Holds every connected [`Client`] keyed by its id. The map is sharded
//! (`DashMap`), so lookups from beat ingestion and sweep tasks never contend
//! on a single lock.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::client::Client;

/// Registry of connected clients.
#[derive(Default)]
pub struct ClientManager {
    clients: DashMap<Arc<str>, Arc<Client>>,
}

impl ClientManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a client and returns the stored handle.
    ///
    /// An existing client with the same id is kept as is and returned.
    pub fn client_connected(&self, client: Arc<Client>) -> Arc<Client> {
        let id: Arc<str> = Arc::from(client.client_id());
        let mut inserted = false;
        let stored = self
            .clients
            .entry(Arc::clone(&id))
            .or_insert_with(|| {
                inserted = true;
                client
            })
            .value()
            .clone();
        if inserted {
            debug!(client_id = %id, "client connected");
        }
        stored
    }

    /// Removes a client, returning it if it was present.
    pub fn client_disconnected(&self, client_id: &str) -> Option<Arc<Client>> {
        self.clients.remove(client_id).map(|(_, c)| c)
    }

    pub fn get_client(&self, client_id: &str) -> Option<Arc<Client>> {
        self.clients.get(client_id).map(|c| Arc::clone(c.value()))
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.clients.contains_key(client_id)
    }

    /// Returns sorted client ids.
    pub fn all_client_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.clients.iter().map(|e| e.key().to_string()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_is_idempotent_per_id() {
        let mgr = ClientManager::new();
        let first = Arc::new(Client::new("c1", true));
        let stored = mgr.client_connected(Arc::clone(&first));
        assert!(Arc::ptr_eq(&stored, &first));
        let again = mgr.client_connected(Arc::new(Client::new("c1", true)));
        assert!(Arc::ptr_eq(&again, &first));

        let stored = mgr.get_client("c1").expect("client present");
        assert!(Arc::ptr_eq(&stored, &first));
    }

    #[test]
    fn test_disconnect_removes_client() {
        let mgr = ClientManager::new();
        mgr.client_connected(Arc::new(Client::new("c1", true)));
        mgr.client_connected(Arc::new(Client::new("c0", true)));
        assert_eq!(mgr.all_client_ids(), vec!["c0".to_string(), "c1".to_string()]);

        assert!(mgr.client_disconnected("c1").is_some());
        assert!(!mgr.contains("c1"));
        assert!(mgr.client_disconnected("c1").is_none());
        assert_eq!(mgr.len(), 1);
    }
}
