//! # Periodic sweep scheduler.
//!
//! [`HealthCheckReactor`] keeps one long-running Tokio task per client. Each
//! task sleeps a random initial delay (0..interval) so sweeps of clients
//! connected together do not fire together, then runs a
//! [`ClientBeatCheckTask`] every `interval` until cancelled.
//!
//! Every per-client token is a child of the reactor's root token:
//! `cancel_check(id)` stops one client, `shutdown()` stops all of them.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng as _;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::naming::Client;

use super::context::CheckContext;
use super::task::ClientBeatCheckTask;

/// Scheduler of per-client sweep tasks.
pub struct HealthCheckReactor {
    interval: Duration,
    root: CancellationToken,
    tasks: DashMap<Arc<str>, CancellationToken>,
}

impl HealthCheckReactor {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            root: CancellationToken::new(),
            tasks: DashMap::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts sweeping `client`; returns `false` if it is already scheduled
    /// or the reactor is shut down.
    pub fn schedule_check(&self, client: Arc<Client>, ctx: Arc<CheckContext>) -> bool {
        if self.root.is_cancelled() {
            return false;
        }
        let id: Arc<str> = Arc::from(client.client_id());
        let token = match self.tasks.entry(Arc::clone(&id)) {
            dashmap::mapref::entry::Entry::Occupied(_) => return false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let token = self.root.child_token();
                slot.insert(token.clone());
                token
            }
        };

        let interval = self.interval;
        let interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        let task_id = Arc::clone(&id);
        tokio::spawn(async move {
            let initial_delay = rand::thread_rng().gen_range(0..interval_ms.max(1));
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(Duration::from_millis(initial_delay)) => {}
            }

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!(client_id = %task_id, "client sweep cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        let task = ClientBeatCheckTask::new(Arc::clone(&client), Arc::clone(&ctx));
                        let _ = task.run().await;
                    }
                }
            }
        });

        debug!(client_id = %id, interval = ?interval, "client sweep scheduled");
        true
    }

    /// Stops the sweep of `client_id`; returns `false` if none was scheduled.
    pub fn cancel_check(&self, client_id: &str) -> bool {
        match self.tasks.remove(client_id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, client_id: &str) -> bool {
        self.tasks.contains_key(client_id)
    }

    pub fn scheduled_count(&self) -> usize {
        self.tasks.len()
    }

    /// Cancels every sweep; later `schedule_check` calls are refused.
    pub fn shutdown(&self) {
        self.root.cancel();
        let stopped = self.tasks.len();
        self.tasks.clear();
        info!(stopped, "health check reactor shut down");
    }
}

impl Drop for HealthCheckReactor {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Config, HealthCheckEngine};

    fn context() -> Arc<CheckContext> {
        let engine = HealthCheckEngine::builder(Config::default())
            .build()
            .expect("engine");
        Arc::clone(engine.context())
    }

    #[tokio::test]
    async fn test_schedule_is_unique_per_client() {
        let reactor = HealthCheckReactor::new(Duration::from_secs(60));
        let ctx = context();
        let client = Arc::new(Client::new("conn-1", true));

        assert!(reactor.schedule_check(Arc::clone(&client), Arc::clone(&ctx)));
        assert!(!reactor.schedule_check(Arc::clone(&client), Arc::clone(&ctx)));
        assert!(reactor.is_scheduled("conn-1"));
        assert_eq!(reactor.scheduled_count(), 1);

        assert!(reactor.cancel_check("conn-1"));
        assert!(!reactor.cancel_check("conn-1"));
        assert!(!reactor.is_scheduled("conn-1"));

        // A cancelled client can be scheduled again.
        assert!(reactor.schedule_check(client, ctx));
    }

    #[tokio::test]
    async fn test_shutdown_refuses_new_checks() {
        let reactor = HealthCheckReactor::new(Duration::from_secs(60));
        let ctx = context();
        for id in ["a", "b"] {
            reactor.schedule_check(Arc::new(Client::new(id, true)), Arc::clone(&ctx));
        }
        reactor.shutdown();

        assert_eq!(reactor.scheduled_count(), 0);
        assert!(!reactor.schedule_check(Arc::new(Client::new("c", true)), ctx));
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let reactor = HealthCheckReactor::new(Duration::ZERO);
        assert_eq!(reactor.interval(), Duration::from_millis(1));
    }
}
