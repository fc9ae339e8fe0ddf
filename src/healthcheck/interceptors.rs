//! # Built-in interceptors.
//!
//! Instance chain, in this order:
//! 1. [`ResponsibleInterceptor`]: skip clients owned by another node.
//! 2. [`ServiceEnableInterceptor`]: skip services whose metadata sets
//!    `preserved.beat.check.enabled = false`.
//! 3. [`InstanceEnableInterceptor`]: skip instances whose metadata (or extend
//!    datum) sets `preserved.beat.check.enabled = false`.
//!
//! Client chain: [`HealthCheckEnableInterceptor`] then [`ResponsibleInterceptor`].
//!
//! A flag value other than `true`/`false` is an error, not a silent skip.

use std::sync::Arc;

use crate::core::Switches;
use crate::error::HealthCheckError;
use crate::naming::{BEAT_CHECK_ENABLED, MetadataProvider};

use super::context::parse_switch;
use super::distro::Responsibility;
use super::interceptor::Interceptor;
use super::task::{ClientBeatCheckTask, InstanceBeatCheckTask};

/// Stops tasks for clients this node is not responsible for.
pub struct ResponsibleInterceptor {
    responsibility: Arc<dyn Responsibility>,
}

impl ResponsibleInterceptor {
    pub fn new(responsibility: Arc<dyn Responsibility>) -> Self {
        Self { responsibility }
    }
}

impl Interceptor<InstanceBeatCheckTask> for ResponsibleInterceptor {
    fn intercept(&self, task: &InstanceBeatCheckTask) -> Result<bool, HealthCheckError> {
        Ok(!self
            .responsibility
            .responsible(task.client().responsible_id()))
    }

    fn name(&self) -> &'static str {
        "responsible"
    }
}

impl Interceptor<ClientBeatCheckTask> for ResponsibleInterceptor {
    fn intercept(&self, task: &ClientBeatCheckTask) -> Result<bool, HealthCheckError> {
        Ok(!self
            .responsibility
            .responsible(task.client().responsible_id()))
    }

    fn name(&self) -> &'static str {
        "responsible"
    }
}

/// Stops tasks for services with beat checks disabled in their metadata.
pub struct ServiceEnableInterceptor {
    metadata: Arc<dyn MetadataProvider>,
}

impl ServiceEnableInterceptor {
    pub fn new(metadata: Arc<dyn MetadataProvider>) -> Self {
        Self { metadata }
    }
}

impl Interceptor<InstanceBeatCheckTask> for ServiceEnableInterceptor {
    fn intercept(&self, task: &InstanceBeatCheckTask) -> Result<bool, HealthCheckError> {
        let Some(md) = self.metadata.service_metadata(task.service()) else {
            return Ok(false);
        };
        match md.extend_data.get(BEAT_CHECK_ENABLED) {
            Some(raw) => Ok(!parse_switch(BEAT_CHECK_ENABLED, raw)?),
            None => Ok(false),
        }
    }

    fn name(&self) -> &'static str {
        "service-enabled"
    }
}

/// Stops tasks for instances with beat checks disabled.
///
/// Instance metadata wins over the instance's own extend datum.
pub struct InstanceEnableInterceptor {
    metadata: Arc<dyn MetadataProvider>,
}

impl InstanceEnableInterceptor {
    pub fn new(metadata: Arc<dyn MetadataProvider>) -> Self {
        Self { metadata }
    }
}

impl Interceptor<InstanceBeatCheckTask> for InstanceEnableInterceptor {
    fn intercept(&self, task: &InstanceBeatCheckTask) -> Result<bool, HealthCheckError> {
        let (metadata_id, datum) = {
            let instance = task.instance().lock();
            (
                instance.metadata_id(),
                instance.extend_datum().get(BEAT_CHECK_ENABLED).cloned(),
            )
        };
        let from_metadata = self
            .metadata
            .instance_metadata(task.service(), &metadata_id)
            .and_then(|md| md.extend_data.get(BEAT_CHECK_ENABLED).cloned());

        match from_metadata.or(datum) {
            Some(raw) => Ok(!parse_switch(BEAT_CHECK_ENABLED, &raw)?),
            None => Ok(false),
        }
    }

    fn name(&self) -> &'static str {
        "instance-enabled"
    }
}

/// Stops client sweeps while the global health-check switch is off.
pub struct HealthCheckEnableInterceptor {
    switches: Arc<Switches>,
}

impl HealthCheckEnableInterceptor {
    pub fn new(switches: Arc<Switches>) -> Self {
        Self { switches }
    }
}

impl Interceptor<ClientBeatCheckTask> for HealthCheckEnableInterceptor {
    fn intercept(&self, _task: &ClientBeatCheckTask) -> Result<bool, HealthCheckError> {
        Ok(!self.switches.is_health_check_enabled())
    }

    fn name(&self) -> &'static str {
        "health-check-enabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Config, HealthCheckEngine};
    use crate::naming::{Client, InstanceMetadata, InstancePublishInfo, MetadataStore, Service};

    fn svc() -> Service {
        Service::new("public", "DEFAULT_GROUP", "orders", true)
    }

    async fn task_for(info: InstancePublishInfo) -> InstanceBeatCheckTask {
        let engine = HealthCheckEngine::builder(Config {
            check_interval_ms: 3_600_000,
            ..Config::default()
        })
        .build()
        .expect("engine");
        let client = engine.client_connected(Client::ip_port("10.0.0.1", 8080, true));
        engine
            .register_instance(client.client_id(), svc(), info)
            .await
            .expect("register");
        engine
            .instance_check_task(client.client_id(), &svc())
            .expect("task")
    }

    #[tokio::test]
    async fn test_instance_metadata_wins_over_extend_datum() {
        let task = task_for(
            InstancePublishInfo::new("10.0.0.1", 8080).with_extend(BEAT_CHECK_ENABLED, "false"),
        )
        .await;
        let store = Arc::new(MetadataStore::new());
        let interceptor = InstanceEnableInterceptor::new(Arc::clone(&store) as Arc<dyn MetadataProvider>);
        assert!(interceptor.intercept(&task).expect("intercept"));

        store.update_instance_metadata(
            svc(),
            "10.0.0.1:8080:DEFAULT",
            InstanceMetadata::new().with_extend(BEAT_CHECK_ENABLED, "TRUE"),
        );
        assert!(!interceptor.intercept(&task).expect("intercept"));
    }

    #[tokio::test]
    async fn test_malformed_flag_is_an_error() {
        let task = task_for(
            InstancePublishInfo::new("10.0.0.1", 8080).with_extend(BEAT_CHECK_ENABLED, "maybe"),
        )
        .await;
        let interceptor = InstanceEnableInterceptor::new(Arc::new(MetadataStore::new()));
        let err = interceptor.intercept(&task).unwrap_err();
        assert_eq!(err.as_label(), "check_invalid_metadata");
    }

    #[tokio::test]
    async fn test_service_without_metadata_passes() {
        let task = task_for(InstancePublishInfo::new("10.0.0.1", 8080)).await;
        let interceptor = ServiceEnableInterceptor::new(Arc::new(MetadataStore::new()));
        assert!(!interceptor.intercept(&task).expect("intercept"));
    }
}
