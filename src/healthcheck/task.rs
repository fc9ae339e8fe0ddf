//! # Check tasks.
//!
//! - [`InstanceBeatCheckTask`]: one (client, service, instance) triple; its
//!   `pass_intercept` runs the checker list and publishes the resulting events.
//! - [`ClientBeatCheckTask`]: one client; its `pass_intercept` fans out one
//!   instance task per published service through the instance chain.
//!
//! `run()` is the task boundary: errors and panics are caught and logged there,
//! never propagated to sibling tasks.
//!
//! ```text
//! ClientBeatCheckTask::run()
//!   └─► client_chain: [health-check-enabled, responsible]
//!         └─► pass_intercept()
//!               ├─► InstanceBeatCheckTask(svc A)::run()
//!               │     └─► instance_chain: [responsible, service-enabled, instance-enabled]
//!               │           └─► prepare all checkers → apply each → publish events
//!               └─► InstanceBeatCheckTask(svc B)::run() ...
//! ```

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{error, trace};

use crate::error::{HealthCheckError, panic_message};
use crate::naming::{Client, Service, SharedInstance, now_millis};

use super::checker::CheckPlan;
use super::context::CheckContext;
use super::interceptor::{InterceptOutcome, Interceptable, InterceptorChain};

/// Sweep task for a single published instance.
pub struct InstanceBeatCheckTask {
    client: Arc<Client>,
    service: Service,
    instance: SharedInstance,
    ctx: Arc<CheckContext>,
}

impl InstanceBeatCheckTask {
    pub fn new(
        client: Arc<Client>,
        service: Service,
        instance: SharedInstance,
        ctx: Arc<CheckContext>,
    ) -> Self {
        Self {
            client,
            service,
            instance,
            ctx,
        }
    }

    pub fn client(&self) -> &Arc<Client> {
        &self.client
    }

    pub fn service(&self) -> &Service {
        &self.service
    }

    pub fn instance(&self) -> &SharedInstance {
        &self.instance
    }

    /// Runs the task through the context's instance chain.
    ///
    /// Failures are logged here with the task's identity and returned; the
    /// instance keeps its last state.
    pub async fn run(&self) -> Result<InterceptOutcome, HealthCheckError> {
        let result = run_guarded(&self.ctx.instance_chain, self).await;
        if let Err(err) = &result {
            error!(
                client_id = %self.client.client_id(),
                service = %self.service,
                label = err.as_label(),
                error = %err,
                "instance check failed"
            );
        }
        result
    }
}

#[async_trait]
impl Interceptable for InstanceBeatCheckTask {
    async fn pass_intercept(&self) -> Result<(), HealthCheckError> {
        // Every checker validates its inputs before any of them mutates.
        let plans = self
            .ctx
            .checkers
            .iter()
            .map(|checker| Ok((checker, checker.prepare(&self.ctx, self)?)))
            .collect::<Result<Vec<_>, HealthCheckError>>()?;

        let now_ms = now_millis();
        let mut events = Vec::new();
        for (checker, plan) in plans {
            if let CheckPlan::Apply { timeout_ms } = plan {
                events.extend(checker.apply(&self.ctx, self, timeout_ms, now_ms));
            }
        }
        for event in events {
            self.ctx.bus.publish(event).await?;
        }
        Ok(())
    }

    async fn after_intercept(&self) {
        trace!(client_id = %self.client.client_id(), service = %self.service, "instance check done");
    }
}

impl fmt::Debug for InstanceBeatCheckTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceBeatCheckTask")
            .field("client_id", &self.client.client_id())
            .field("service", &self.service)
            .finish()
    }
}

/// Sweep task covering every instance of one client.
pub struct ClientBeatCheckTask {
    client: Arc<Client>,
    ctx: Arc<CheckContext>,
}

impl ClientBeatCheckTask {
    pub fn new(client: Arc<Client>, ctx: Arc<CheckContext>) -> Self {
        Self { client, ctx }
    }

    pub fn client(&self) -> &Arc<Client> {
        &self.client
    }

    pub fn context(&self) -> &Arc<CheckContext> {
        &self.ctx
    }

    /// Runs the task through the context's client chain.
    pub async fn run(&self) -> Result<InterceptOutcome, HealthCheckError> {
        let result = run_guarded(&self.ctx.client_chain, self).await;
        if let Err(err) = &result {
            error!(
                client_id = %self.client.client_id(),
                label = err.as_label(),
                error = %err,
                "client check failed"
            );
        }
        result
    }
}

#[async_trait]
impl Interceptable for ClientBeatCheckTask {
    /// Checks every published instance; a failing instance does not stop the rest.
    async fn pass_intercept(&self) -> Result<(), HealthCheckError> {
        for (service, instance) in self.client.published_instances() {
            let task = InstanceBeatCheckTask::new(
                Arc::clone(&self.client),
                service,
                instance,
                Arc::clone(&self.ctx),
            );
            let _ = task.run().await;
        }
        Ok(())
    }
}

impl fmt::Debug for ClientBeatCheckTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBeatCheckTask")
            .field("client_id", &self.client.client_id())
            .finish()
    }
}

async fn run_guarded<T: Interceptable + 'static>(
    chain: &InterceptorChain<T>,
    task: &T,
) -> Result<InterceptOutcome, HealthCheckError> {
    match AssertUnwindSafe(chain.do_intercept(task)).catch_unwind().await {
        Ok(result) => result,
        Err(panic_err) => Err(HealthCheckError::Panicked {
            info: panic_message(panic_err.as_ref()),
        }),
    }
}
