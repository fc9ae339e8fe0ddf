use std::fmt;
use std::sync::Arc;

use crate::core::{Config, Switches};
use crate::error::HealthCheckError;
use crate::events::EventBus;
use crate::naming::{MetadataProvider, Service};

use super::checker::InstanceBeatChecker;
use super::interceptor::InterceptorChain;
use super::task::{ClientBeatCheckTask, InstanceBeatCheckTask};

/// Everything a check task needs, shared by all tasks of one engine.
pub struct CheckContext {
    pub(crate) bus: Arc<EventBus>,
    pub(crate) metadata: Arc<dyn MetadataProvider>,
    pub(crate) switches: Arc<Switches>,
    pub(crate) heartbeat_timeout_ms: u64,
    pub(crate) ip_delete_timeout_ms: u64,
    pub(crate) checkers: Vec<Arc<dyn InstanceBeatChecker>>,
    pub(crate) instance_chain: InterceptorChain<InstanceBeatCheckTask>,
    pub(crate) client_chain: InterceptorChain<ClientBeatCheckTask>,
}

impl CheckContext {
    pub(crate) fn new(
        config: &Config,
        bus: Arc<EventBus>,
        metadata: Arc<dyn MetadataProvider>,
        switches: Arc<Switches>,
        checkers: Vec<Arc<dyn InstanceBeatChecker>>,
        instance_chain: InterceptorChain<InstanceBeatCheckTask>,
        client_chain: InterceptorChain<ClientBeatCheckTask>,
    ) -> Self {
        Self {
            bus,
            metadata,
            switches,
            heartbeat_timeout_ms: config.heartbeat_timeout_ms,
            ip_delete_timeout_ms: config.ip_delete_timeout_ms,
            checkers,
            instance_chain,
            client_chain,
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataProvider> {
        &self.metadata
    }

    pub fn switches(&self) -> &Arc<Switches> {
        &self.switches
    }

    /// Checker names in execution order.
    pub fn checker_names(&self) -> Vec<&'static str> {
        self.checkers.iter().map(|c| c.name()).collect()
    }

    /// Millisecond override for `key`: instance metadata first, then service metadata.
    ///
    /// # Errors
    /// [`HealthCheckError::InvalidMetadata`] if the first value found is not a
    /// non-negative integer.
    pub fn metadata_timeout(
        &self,
        service: &Service,
        metadata_id: &str,
        key: &str,
    ) -> Result<Option<u64>, HealthCheckError> {
        if let Some(md) = self.metadata.instance_metadata(service, metadata_id) {
            if let Some(raw) = md.extend_data.get(key) {
                return parse_millis(key, raw).map(Some);
            }
        }
        if let Some(md) = self.metadata.service_metadata(service) {
            if let Some(raw) = md.extend_data.get(key) {
                return parse_millis(key, raw).map(Some);
            }
        }
        Ok(None)
    }
}

impl fmt::Debug for CheckContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckContext")
            .field("heartbeat_timeout_ms", &self.heartbeat_timeout_ms)
            .field("ip_delete_timeout_ms", &self.ip_delete_timeout_ms)
            .field("checkers", &self.checker_names())
            .field("instance_chain", &self.instance_chain)
            .field("client_chain", &self.client_chain)
            .finish()
    }
}

pub(crate) fn parse_millis(key: &str, raw: &str) -> Result<u64, HealthCheckError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| HealthCheckError::InvalidMetadata {
            key: key.to_string(),
            value: raw.to_string(),
        })
}

pub(crate) fn parse_switch(key: &str, raw: &str) -> Result<bool, HealthCheckError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(HealthCheckError::InvalidMetadata {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_millis("k", " 5000 ").expect("millis"), 5000);
        assert!(matches!(
            parse_millis("k", "-1"),
            Err(HealthCheckError::InvalidMetadata { .. })
        ));
        assert!(!parse_switch("k", "FALSE").expect("switch"));
        assert!(parse_switch("k", "true").expect("switch"));
        assert!(parse_switch("k", "nope").is_err());
    }
}
