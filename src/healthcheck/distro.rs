//! # Responsibility partitioning across cluster members.
//!
//! Exactly one node drives the checks of a given client. [`DistroMapper`]
//! hashes the client's responsible id onto the sorted list of healthy members;
//! every node computes the same owner from the same member list.
//!
//! ```text
//! members (sorted): [10.0.0.1:8848, 10.0.0.2:8848, 10.0.0.3:8848]
//! crc32("10.1.2.3:9000") % 3 = 1  ──► 10.0.0.2:8848 is responsible
//! ```

use parking_lot::RwLock;
use tracing::debug;

/// Answers whether this node owns a client.
pub trait Responsibility: Send + Sync + 'static {
    /// `responsible_id` is the client's routing key (see `Client::responsible_id`).
    fn responsible(&self, responsible_id: &str) -> bool;
}

/// Single-node deployment: always responsible.
#[derive(Debug, Default, Clone, Copy)]
pub struct Standalone;

impl Responsibility for Standalone {
    fn responsible(&self, _responsible_id: &str) -> bool {
        true
    }
}

/// Hash-based owner selection over the healthy member list.
#[derive(Debug)]
pub struct DistroMapper {
    local: String,
    members: RwLock<Vec<String>>,
}

impl DistroMapper {
    /// Creates a mapper for `local` with an initial member list.
    pub fn new(local: impl Into<String>, members: impl IntoIterator<Item = String>) -> Self {
        let mapper = Self {
            local: local.into(),
            members: RwLock::new(Vec::new()),
        };
        mapper.update_members(members);
        mapper
    }

    pub fn local_address(&self) -> &str {
        &self.local
    }

    /// Replaces the healthy member list (sorted, deduplicated).
    pub fn update_members(&self, members: impl IntoIterator<Item = String>) {
        let mut list: Vec<String> = members.into_iter().collect();
        list.sort();
        list.dedup();
        debug!(local = %self.local, members = list.len(), "distro members updated");
        *self.members.write() = list;
    }

    pub fn members(&self) -> Vec<String> {
        self.members.read().clone()
    }

    /// Member owning `responsible_id`; `None` with an empty member list.
    pub fn responsible_server(&self, responsible_id: &str) -> Option<String> {
        let members = self.members.read();
        if members.is_empty() {
            return None;
        }
        let idx = distro_hash(responsible_id) % members.len();
        members.get(idx).cloned()
    }
}

impl Responsibility for DistroMapper {
    /// A node missing from the member list (not yet joined, or just removed)
    /// keeps checking everything.
    fn responsible(&self, responsible_id: &str) -> bool {
        let members = self.members.read();
        let Some(index) = members.iter().position(|m| *m == self.local) else {
            return true;
        };
        distro_hash(responsible_id) % members.len() == index
    }
}

fn distro_hash(responsible_id: &str) -> usize {
    crc32fast::hash(responsible_id.as_bytes()) as usize
}
