//! # Instance beat checkers.
//!
//! Checkers run in registration order once an [`InstanceBeatCheckTask`] has
//! passed its interceptor chain, in two phases:
//! 1. `prepare` on every checker: resolves and validates inputs (timeouts,
//!    switches) without touching the instance. Any error here fails the task
//!    before anything is mutated.
//! 2. `apply` on every prepared checker: locks the instance, decides, mutates,
//!    unlocks, and returns the events to publish. It cannot fail.
//!
//! No event is produced unless the state actually changed, so running a
//! checker twice is harmless.
//!
//! ## Built-ins
//! | Checker                     | Guard                  | Timeout lookup                                        | Transition                     |
//! |-----------------------------|------------------------|-------------------------------------------------------|--------------------------------|
//! | [`UnhealthyInstanceChecker`]| instance is healthy    | instance md → service md → `heartbeat_timeout_ms`     | healthy → unhealthy            |
//! | [`ExpiredInstanceChecker`]  | expire switch is on    | instance md → service md → extend datum → `ip_delete_timeout_ms` | removed from its client |

use tracing::info;

use crate::error::HealthCheckError;
use crate::events::Event;
use crate::naming::{HEART_BEAT_TIMEOUT, IP_DELETE_TIMEOUT};

use super::context::{CheckContext, parse_millis};
use super::task::InstanceBeatCheckTask;

/// Outcome of [`InstanceBeatChecker::prepare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckPlan {
    /// Run `apply` with this resolved timeout.
    Apply { timeout_ms: u64 },
    /// Nothing to do for this task.
    Skip,
}

/// One liveness rule applied to a single instance.
pub trait InstanceBeatChecker: Send + Sync + 'static {
    /// Resolves the checker's inputs for `task`. Must not mutate anything.
    fn prepare(
        &self,
        ctx: &CheckContext,
        task: &InstanceBeatCheckTask,
    ) -> Result<CheckPlan, HealthCheckError>;

    /// Performs the transition for an elapsed time beyond `timeout_ms` at
    /// `now_ms`; returns its events (empty if none).
    fn apply(
        &self,
        ctx: &CheckContext,
        task: &InstanceBeatCheckTask,
        timeout_ms: u64,
        now_ms: u64,
    ) -> Vec<Event>;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Marks silent instances unhealthy.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnhealthyInstanceChecker;

impl InstanceBeatChecker for UnhealthyInstanceChecker {
    fn prepare(
        &self,
        ctx: &CheckContext,
        task: &InstanceBeatCheckTask,
    ) -> Result<CheckPlan, HealthCheckError> {
        let metadata_id = {
            let instance = task.instance().lock();
            if !instance.is_healthy() {
                return Ok(CheckPlan::Skip);
            }
            instance.metadata_id()
        };
        let timeout_ms = ctx
            .metadata_timeout(task.service(), &metadata_id, HEART_BEAT_TIMEOUT)?
            .unwrap_or(ctx.heartbeat_timeout_ms);
        Ok(CheckPlan::Apply { timeout_ms })
    }

    fn apply(
        &self,
        _ctx: &CheckContext,
        task: &InstanceBeatCheckTask,
        timeout_ms: u64,
        now_ms: u64,
    ) -> Vec<Event> {
        let (metadata_id, elapsed) = {
            let mut instance = task.instance().lock();
            let elapsed = instance.elapsed_since_beat(now_ms);
            if !instance.is_healthy() || elapsed <= timeout_ms || !instance.set_healthy(false) {
                return Vec::new();
            }
            (instance.metadata_id(), elapsed)
        };

        info!(
            client_id = %task.client().client_id(),
            service = %task.service(),
            instance = %metadata_id,
            elapsed_ms = elapsed,
            timeout_ms,
            "instance marked unhealthy, no beat within timeout"
        );
        vec![
            Event::service_changed(task.service().clone()),
            Event::client_changed(task.client().client_id()),
        ]
    }

    fn name(&self) -> &'static str {
        "unhealthy"
    }
}

/// Removes instances silent for longer than their delete timeout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExpiredInstanceChecker;

impl InstanceBeatChecker for ExpiredInstanceChecker {
    fn prepare(
        &self,
        ctx: &CheckContext,
        task: &InstanceBeatCheckTask,
    ) -> Result<CheckPlan, HealthCheckError> {
        if !ctx.switches.is_expire_instance_enabled() {
            return Ok(CheckPlan::Skip);
        }
        let (metadata_id, extended) = {
            let instance = task.instance().lock();
            (
                instance.metadata_id(),
                instance.extend_datum().get(IP_DELETE_TIMEOUT).cloned(),
            )
        };
        let timeout_ms =
            match ctx.metadata_timeout(task.service(), &metadata_id, IP_DELETE_TIMEOUT)? {
                Some(ms) => ms,
                None => match extended {
                    Some(raw) => parse_millis(IP_DELETE_TIMEOUT, &raw)?,
                    None => ctx.ip_delete_timeout_ms,
                },
            };
        Ok(CheckPlan::Apply { timeout_ms })
    }

    fn apply(
        &self,
        _ctx: &CheckContext,
        task: &InstanceBeatCheckTask,
        timeout_ms: u64,
        now_ms: u64,
    ) -> Vec<Event> {
        let (metadata_id, elapsed) = {
            // Held across removal so a concurrent beat cannot land in between.
            let instance = task.instance().lock();
            let elapsed = instance.elapsed_since_beat(now_ms);
            if elapsed <= timeout_ms
                || !task
                    .client()
                    .remove_service_instance_if_current(task.service(), task.instance())
            {
                return Vec::new();
            }
            (instance.metadata_id(), elapsed)
        };

        info!(
            client_id = %task.client().client_id(),
            service = %task.service(),
            instance = %metadata_id,
            elapsed_ms = elapsed,
            timeout_ms,
            "expired instance removed"
        );
        vec![Event::client_deregister_service(
            task.service().clone(),
            task.client().client_id(),
        )]
    }

    fn name(&self) -> &'static str {
        "expired"
    }
}
