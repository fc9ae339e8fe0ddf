//! # HealthCheckEngine: beats in, transitions out.
//!
//! The [`HealthCheckEngine`] owns the client registry, the check context
//! (bus, metadata, switches, checkers, interceptor chains) and the sweep
//! reactor. It is the entry point for beats, client lifecycle calls and
//! externally scheduled check tasks.
//!
//! ## High-level architecture
//! ```text
//! beat(BeatInfo) ─────────────► ClientManager ─► Client ─► instance.lock()
//!                                                              │ stamp, recover?
//!                                                              ▼
//! connection_beat(id) ──► stamp all instances            EventBus.publish(...)
//!
//! client_connected(c) ──► ClientManager + HealthCheckReactor.schedule_check(c)
//!                                           │ every check_interval
//!                                           ▼
//!                               ClientBeatCheckTask::run()
//!                                 └─► InstanceBeatCheckTask::run() per service
//!                                       └─► checkers ─► EventBus.publish(...)
//!
//! run_until_signal() ──► SIGINT/SIGTERM/SIGQUIT ──► shutdown(): reactor, then bus
//! ```
//!
//! ## Example
//! ```rust
//! use beatvisor::{BeatInfo, BeatOutcome, Client, Config, HealthCheckEngine, InstancePublishInfo, Service};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = HealthCheckEngine::builder(Config::default()).build()?;
//!
//!     let client = engine.client_connected(Client::ip_port("10.0.0.5", 8080, true));
//!     let svc = Service::from_grouped_name("public", "DEFAULT_GROUP@@orders", true);
//!     engine
//!         .register_instance(client.client_id(), svc, InstancePublishInfo::new("10.0.0.5", 8080))
//!         .await?;
//!
//!     let beat = BeatInfo::new("public", "DEFAULT_GROUP@@orders", "10.0.0.5", 8080);
//!     assert_eq!(engine.beat(&beat).await?, BeatOutcome::Refreshed);
//!
//!     engine.shutdown();
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tracing::info;

use crate::core::{Config, Switches, shutdown};
use crate::error::HealthCheckError;
use crate::events::{Event, EventBus};
use crate::healthcheck::{
    BeatInfo, BeatOutcome, CheckContext, ClientBeatCheckTask, HealthCheckReactor,
    InstanceBeatCheckTask, InterceptOutcome, process_beat, process_connection_beat,
};
use crate::naming::{Client, ClientManager, InstancePublishInfo, Service, now_millis};

use super::builder::EngineBuilder;

/// Liveness engine for one registry node.
pub struct HealthCheckEngine {
    cfg: Config,
    bus: Arc<EventBus>,
    clients: Arc<ClientManager>,
    ctx: Arc<CheckContext>,
    reactor: HealthCheckReactor,
}

impl HealthCheckEngine {
    /// Returns a builder for a customised engine.
    pub fn builder(cfg: Config) -> EngineBuilder {
        EngineBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        bus: Arc<EventBus>,
        clients: Arc<ClientManager>,
        ctx: Arc<CheckContext>,
        reactor: HealthCheckReactor,
    ) -> Self {
        Self {
            cfg,
            bus,
            clients,
            ctx,
            reactor,
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn clients(&self) -> &Arc<ClientManager> {
        &self.clients
    }

    pub fn switches(&self) -> &Arc<Switches> {
        &self.ctx.switches
    }

    pub fn context(&self) -> &Arc<CheckContext> {
        &self.ctx
    }

    pub fn reactor(&self) -> &HealthCheckReactor {
        &self.reactor
    }

    /// Single-instance beat from an `ip:port` client.
    ///
    /// # Errors
    /// - [`HealthCheckError::ClientNotFound`] if the beat's client is unknown;
    /// - [`HealthCheckError::InstanceNotFound`] if it does not publish that
    ///   service at that address;
    /// - [`HealthCheckError::Bus`] if a recovery event cannot be published.
    pub async fn beat(&self, beat: &BeatInfo) -> Result<BeatOutcome, HealthCheckError> {
        process_beat(&self.clients, &self.bus, beat, now_millis()).await
    }

    /// Connection-level beat: stamps every instance of the client, then the
    /// client. Returns how many instances were stamped.
    pub fn connection_beat(&self, client_id: &str) -> Result<usize, HealthCheckError> {
        let client = self.client(client_id)?;
        Ok(process_connection_beat(&client, now_millis()))
    }

    /// Registers a client and starts its periodic sweep.
    ///
    /// If a client with the same id exists, the existing one is kept and returned.
    pub fn client_connected(&self, client: Client) -> Arc<Client> {
        let stored = self.clients.client_connected(Arc::new(client));
        self.reactor
            .schedule_check(Arc::clone(&stored), Arc::clone(&self.ctx));
        stored
    }

    /// Removes a client, stops its sweep and publishes a client-disconnect event.
    ///
    /// Returns `false` if the client was unknown (no event published).
    pub async fn client_disconnected(&self, client_id: &str) -> Result<bool, HealthCheckError> {
        self.reactor.cancel_check(client_id);
        let Some(client) = self.clients.client_disconnected(client_id) else {
            return Ok(false);
        };
        info!(client_id = %client_id, instances = client.instance_count(), "client disconnected");
        self.bus
            .publish(Event::client_disconnect(client.client_id()))
            .await?;
        Ok(true)
    }

    /// Publishes `info` for `service` under the client; emits client-changed.
    pub async fn register_instance(
        &self,
        client_id: &str,
        service: Service,
        info: InstancePublishInfo,
    ) -> Result<(), HealthCheckError> {
        let client = self.client(client_id)?;
        client.add_service_instance(service, info);
        self.bus
            .publish(Event::client_changed(client.client_id()))
            .await?;
        Ok(())
    }

    /// Removes the client's instance of `service`; emits client-deregister.
    ///
    /// Returns `false` if nothing was published for that service.
    pub async fn deregister_instance(
        &self,
        client_id: &str,
        service: &Service,
    ) -> Result<bool, HealthCheckError> {
        let client = self.client(client_id)?;
        if client.remove_service_instance(service).is_none() {
            return Ok(false);
        }
        self.bus
            .publish(Event::client_deregister_service(
                service.clone(),
                client.client_id(),
            ))
            .await?;
        Ok(true)
    }

    /// Builds the check task for one published instance, for an external scheduler.
    pub fn instance_check_task(
        &self,
        client_id: &str,
        service: &Service,
    ) -> Result<InstanceBeatCheckTask, HealthCheckError> {
        let client = self.client(client_id)?;
        let instance = client.get_instance_publish_info(service).ok_or_else(|| {
            HealthCheckError::InstanceNotFound {
                service: service.grouped_name(),
                ip: String::new(),
                port: 0,
            }
        })?;
        Ok(InstanceBeatCheckTask::new(
            client,
            service.clone(),
            instance,
            Arc::clone(&self.ctx),
        ))
    }

    /// Runs one instance check now, through the instance interceptor chain.
    pub async fn check_instance(
        &self,
        client_id: &str,
        service: &Service,
    ) -> Result<InterceptOutcome, HealthCheckError> {
        self.instance_check_task(client_id, service)?.run().await
    }

    /// Runs one client sweep now, through the client interceptor chain.
    pub async fn sweep_client(&self, client_id: &str) -> Result<InterceptOutcome, HealthCheckError> {
        let client = self.client(client_id)?;
        ClientBeatCheckTask::new(client, Arc::clone(&self.ctx))
            .run()
            .await
    }

    /// Waits for SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere), then shuts down.
    pub async fn run_until_signal(&self) -> std::io::Result<()> {
        let signal = shutdown::wait_for_shutdown_signal().await?;
        info!(%signal, "shutdown signal received");
        self.shutdown();
        Ok(())
    }

    /// Stops every sweep, then every publisher loop. Idempotent.
    pub fn shutdown(&self) {
        self.reactor.shutdown();
        self.bus.shutdown();
    }

    fn client(&self, client_id: &str) -> Result<Arc<Client>, HealthCheckError> {
        self.clients
            .get_client(client_id)
            .ok_or_else(|| HealthCheckError::ClientNotFound {
                client_id: client_id.to_string(),
            })
    }
}
