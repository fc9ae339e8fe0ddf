//! # Heartbeat ingestion.
//!
//! - Single-instance beat ([`BeatInfo`]): stamps one instance of an `ip:port`
//!   client; an unhealthy instance recovers immediately and the recovery is
//!   published as service-changed + client-changed.
//! - Connection beat: stamps every instance of a client, then the client.

use tracing::{debug, info};

use crate::error::HealthCheckError;
use crate::events::{Event, EventBus};
use crate::naming::{Client, ClientManager, DEFAULT_CLUSTER, ID_DELIMITER, Service};

/// Payload of a single-instance heartbeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeatInfo {
    pub namespace: String,
    /// Grouped service name (`group@@name`, or bare name for the default group).
    pub service_name: String,
    pub ip: String,
    pub port: u16,
    pub cluster: String,
    pub ephemeral: bool,
}

impl BeatInfo {
    /// Beat for an ephemeral instance in the default cluster.
    pub fn new(
        namespace: impl Into<String>,
        service_name: impl Into<String>,
        ip: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            service_name: service_name.into(),
            ip: ip.into(),
            port,
            cluster: DEFAULT_CLUSTER.to_string(),
            ephemeral: true,
        }
    }

    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = cluster.into();
        self
    }

    pub fn with_ephemeral(mut self, ephemeral: bool) -> Self {
        self.ephemeral = ephemeral;
        self
    }

    /// Service the beat targets.
    pub fn service(&self) -> Service {
        Service::from_grouped_name(&self.namespace, &self.service_name, self.ephemeral)
    }

    /// Id of the `ip:port` client owning the instance (see [`Client::ip_port`]).
    pub fn client_id(&self) -> String {
        format!("{}:{}{ID_DELIMITER}{}", self.ip, self.port, self.ephemeral)
    }
}

/// What a single-instance beat did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeatOutcome {
    /// Timestamp refreshed; the instance was already healthy.
    Refreshed,
    /// Timestamp refreshed and the instance turned healthy again.
    Recovered,
}

pub(crate) async fn process_beat(
    clients: &ClientManager,
    bus: &EventBus,
    beat: &BeatInfo,
    now_ms: u64,
) -> Result<BeatOutcome, HealthCheckError> {
    let client_id = beat.client_id();
    let client = clients
        .get_client(&client_id)
        .ok_or_else(|| HealthCheckError::ClientNotFound {
            client_id: client_id.clone(),
        })?;
    let service = beat.service();
    let not_found = || HealthCheckError::InstanceNotFound {
        service: service.grouped_name(),
        ip: beat.ip.clone(),
        port: beat.port,
    };
    let instance = client
        .get_instance_publish_info(&service)
        .ok_or_else(not_found)?;

    let recovered = {
        let mut instance = instance.lock();
        if !instance.matches_address(&beat.ip, beat.port) {
            return Err(not_found());
        }
        instance.refresh_heartbeat(now_ms);
        instance.set_healthy(true)
    };

    if !recovered {
        debug!(client_id = %client_id, service = %service, "beat received");
        return Ok(BeatOutcome::Refreshed);
    }
    info!(
        client_id = %client_id,
        service = %service,
        ip = %beat.ip,
        port = beat.port,
        cluster = %beat.cluster,
        "instance recovered by beat"
    );
    bus.publish(Event::service_changed(service)).await?;
    bus.publish(Event::client_changed(client_id)).await?;
    Ok(BeatOutcome::Recovered)
}

pub(crate) fn process_connection_beat(client: &Client, now_ms: u64) -> usize {
    let stamped = client.refresh_all_heartbeats(now_ms);
    debug!(client_id = %client.client_id(), instances = stamped, "connection beat received");
    stamped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beat_identity() {
        let beat = BeatInfo::new("public", "grp@@orders", "10.0.0.1", 8080);
        assert_eq!(beat.client_id(), "10.0.0.1:8080#true");
        let svc = beat.service();
        assert_eq!(svc.group(), "grp");
        assert_eq!(svc.name(), "orders");
        assert!(svc.is_ephemeral());

        let persistent = beat.with_ephemeral(false);
        assert_eq!(persistent.client_id(), "10.0.0.1:8080#false");
        assert_eq!(
            persistent.client_id(),
            Client::ip_port("10.0.0.1", 8080, false).client_id()
        );
    }
}
