//! # Published instance state.
//!
//! [`InstancePublishInfo`] is the per-instance liveness record owned by one
//! [`Client`](crate::Client). Only heartbeat ingestion and the checker chain
//! mutate `healthy` and `last_heartbeat_ms`.
//!
//! ## Single writer
//! Every record lives behind its own mutex ([`SharedInstance`]). Writers lock,
//! decide, mutate and unlock before publishing any event, so a beat and a
//! sweep check for the same instance never interleave inside a transition.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Cluster used when a registration does not name one.
pub const DEFAULT_CLUSTER: &str = "DEFAULT";

/// Shared, lock-guarded instance record.
pub type SharedInstance = Arc<Mutex<InstancePublishInfo>>;

/// Liveness record of a single published instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstancePublishInfo {
    ip: String,
    port: u16,
    cluster: String,
    healthy: bool,
    last_heartbeat_ms: u64,
    extend_datum: HashMap<String, String>,
}

impl InstancePublishInfo {
    /// Creates a healthy instance whose last heartbeat is "now".
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
            cluster: DEFAULT_CLUSTER.to_string(),
            healthy: true,
            last_heartbeat_ms: now_millis(),
            extend_datum: HashMap::new(),
        }
    }

    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = cluster.into();
        self
    }

    pub fn with_healthy(mut self, healthy: bool) -> Self {
        self.healthy = healthy;
        self
    }

    /// Sets the initial heartbeat timestamp (epoch millis).
    ///
    /// Only meant for construction; afterwards the timestamp only advances
    /// through [`refresh_heartbeat`](Self::refresh_heartbeat).
    pub fn with_last_heartbeat(mut self, at_ms: u64) -> Self {
        self.last_heartbeat_ms = at_ms;
        self
    }

    /// Adds an extended key/value override carried by the instance itself.
    pub fn with_extend(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extend_datum.insert(key.into(), value.into());
        self
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    pub fn last_heartbeat_ms(&self) -> u64 {
        self.last_heartbeat_ms
    }

    pub fn extend_datum(&self) -> &HashMap<String, String> {
        &self.extend_datum
    }

    /// Identity used to look up instance-level metadata: `ip:port:cluster`.
    pub fn metadata_id(&self) -> String {
        format!("{}:{}:{}", self.ip, self.port, self.cluster)
    }

    /// Returns `true` when `ip`/`port` identify this instance.
    pub fn matches_address(&self, ip: &str, port: u16) -> bool {
        self.ip == ip && self.port == port
    }

    /// Advances the heartbeat timestamp; older stamps are ignored.
    pub(crate) fn refresh_heartbeat(&mut self, at_ms: u64) {
        self.last_heartbeat_ms = self.last_heartbeat_ms.max(at_ms);
    }

    /// Sets the health flag, returning `true` if it actually changed.
    pub(crate) fn set_healthy(&mut self, healthy: bool) -> bool {
        let changed = self.healthy != healthy;
        self.healthy = healthy;
        changed
    }

    /// Milliseconds elapsed since the last heartbeat, as seen at `now_ms`.
    pub fn elapsed_since_beat(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_heartbeat_ms)
    }

    /// Wraps the record for sharing between a client and its checkers.
    pub fn into_shared(self) -> SharedInstance {
        Arc::new(Mutex::new(self))
    }
}

/// Wall-clock time in epoch milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().min(u128::from(u64::MAX)) as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_only_advances() {
        let mut info = InstancePublishInfo::new("10.0.0.1", 8080).with_last_heartbeat(1_000);
        info.refresh_heartbeat(500);
        assert_eq!(info.last_heartbeat_ms(), 1_000);
        info.refresh_heartbeat(2_000);
        assert_eq!(info.last_heartbeat_ms(), 2_000);
    }

    #[test]
    fn test_set_healthy_reports_transition() {
        let mut info = InstancePublishInfo::new("10.0.0.1", 8080);
        assert!(!info.set_healthy(true));
        assert!(info.set_healthy(false));
        assert!(!info.set_healthy(false));
        assert!(!info.is_healthy());
    }

    #[test]
    fn test_metadata_id_includes_cluster() {
        let info = InstancePublishInfo::new("10.0.0.1", 8080).with_cluster("east");
        assert_eq!(info.metadata_id(), "10.0.0.1:8080:east");
    }

    #[test]
    fn test_elapsed_saturates_for_future_beats() {
        let info = InstancePublishInfo::new("10.0.0.1", 8080).with_last_heartbeat(5_000);
        assert_eq!(info.elapsed_since_beat(4_000), 0);
        assert_eq!(info.elapsed_since_beat(6_500), 1_500);
    }
}
