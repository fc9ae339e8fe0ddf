use std::sync::Arc;

use crate::{
    core::{Config, Switches},
    error::BusError,
    events::{EventBus, EventType},
    healthcheck::{
        CheckContext, ClientBeatCheckTask, ExpiredInstanceChecker, HealthCheckEnableInterceptor,
        HealthCheckReactor, InstanceBeatCheckTask, InstanceBeatChecker, InstanceEnableInterceptor,
        Interceptor, InterceptorChain, Responsibility, ResponsibleInterceptor,
        ServiceEnableInterceptor, Standalone, UnhealthyInstanceChecker,
    },
    naming::{ClientManager, MetadataProvider, MetadataStore},
    subscribers::Subscribe,
};

use super::engine::HealthCheckEngine;

/// Builder for constructing a [`HealthCheckEngine`] with explicit collaborators.
///
/// Anything not set falls back to:
/// - a fresh [`EventBus`] sized from the config;
/// - an empty [`MetadataStore`];
/// - [`Standalone`] responsibility;
/// - [`Switches`] initialised from the config;
/// - checkers `[unhealthy, expired]`;
/// - instance chain `[responsible, service-enabled, instance-enabled]`;
/// - client chain `[health-check-enabled, responsible]`.
pub struct EngineBuilder {
    cfg: Config,
    bus: Option<Arc<EventBus>>,
    metadata: Option<Arc<dyn MetadataProvider>>,
    responsibility: Option<Arc<dyn Responsibility>>,
    switches: Option<Arc<Switches>>,
    checkers: Option<Vec<Arc<dyn InstanceBeatChecker>>>,
    instance_interceptors: Option<Vec<Arc<dyn Interceptor<InstanceBeatCheckTask>>>>,
    client_interceptors: Option<Vec<Arc<dyn Interceptor<ClientBeatCheckTask>>>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl EngineBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            bus: None,
            metadata: None,
            responsibility: None,
            switches: None,
            checkers: None,
            instance_interceptors: None,
            client_interceptors: None,
            subscribers: Vec::new(),
        }
    }

    /// Publishes onto an existing bus instead of creating one.
    pub fn with_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Source of instance/service metadata overrides.
    pub fn with_metadata(mut self, metadata: Arc<dyn MetadataProvider>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Decides which clients this node sweeps.
    pub fn with_responsibility(mut self, responsibility: Arc<dyn Responsibility>) -> Self {
        self.responsibility = Some(responsibility);
        self
    }

    /// Shares switches with other components (e.g. an admin endpoint).
    pub fn with_switches(mut self, switches: Arc<Switches>) -> Self {
        self.switches = Some(switches);
        self
    }

    /// Replaces the checker list; checkers run in the given order.
    pub fn with_checkers(mut self, checkers: Vec<Arc<dyn InstanceBeatChecker>>) -> Self {
        self.checkers = Some(checkers);
        self
    }

    /// Replaces the instance interceptor chain.
    pub fn with_instance_interceptors(
        mut self,
        interceptors: Vec<Arc<dyn Interceptor<InstanceBeatCheckTask>>>,
    ) -> Self {
        self.instance_interceptors = Some(interceptors);
        self
    }

    /// Replaces the client interceptor chain.
    pub fn with_client_interceptors(
        mut self,
        interceptors: Vec<Arc<dyn Interceptor<ClientBeatCheckTask>>>,
    ) -> Self {
        self.client_interceptors = Some(interceptors);
        self
    }

    /// Sets event subscribers registered on the bus at build time.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds and returns the engine.
    ///
    /// Registers a publisher for every built-in event type, then the
    /// subscribers. Must be called within a Tokio runtime.
    pub fn build(self) -> Result<Arc<HealthCheckEngine>, BusError> {
        let bus = self
            .bus
            .unwrap_or_else(|| Arc::new(EventBus::with_config(&self.cfg)));
        for event_type in EventType::BUILTIN {
            bus.register_publisher(event_type, self.cfg.ring_buffer_size_clamped())?;
        }
        for subscriber in self.subscribers {
            bus.register_subscriber(subscriber)?;
        }

        let metadata = self
            .metadata
            .unwrap_or_else(|| Arc::new(MetadataStore::new()) as Arc<dyn MetadataProvider>);
        let responsibility = self
            .responsibility
            .unwrap_or_else(|| Arc::new(Standalone) as Arc<dyn Responsibility>);
        let switches = self
            .switches
            .unwrap_or_else(|| Arc::new(Switches::from_config(&self.cfg)));

        let checkers = self.checkers.unwrap_or_else(|| {
            vec![
                Arc::new(UnhealthyInstanceChecker) as Arc<dyn InstanceBeatChecker>,
                Arc::new(ExpiredInstanceChecker),
            ]
        });
        let instance_interceptors = self.instance_interceptors.unwrap_or_else(|| {
            vec![
                Arc::new(ResponsibleInterceptor::new(Arc::clone(&responsibility)))
                    as Arc<dyn Interceptor<InstanceBeatCheckTask>>,
                Arc::new(ServiceEnableInterceptor::new(Arc::clone(&metadata))),
                Arc::new(InstanceEnableInterceptor::new(Arc::clone(&metadata))),
            ]
        });
        let client_interceptors = self.client_interceptors.unwrap_or_else(|| {
            vec![
                Arc::new(HealthCheckEnableInterceptor::new(Arc::clone(&switches)))
                    as Arc<dyn Interceptor<ClientBeatCheckTask>>,
                Arc::new(ResponsibleInterceptor::new(Arc::clone(&responsibility))),
            ]
        });

        let ctx = Arc::new(CheckContext::new(
            &self.cfg,
            Arc::clone(&bus),
            metadata,
            switches,
            checkers,
            InterceptorChain::new(instance_interceptors),
            InterceptorChain::new(client_interceptors),
        ));
        let reactor = HealthCheckReactor::new(self.cfg.check_interval());

        Ok(Arc::new(HealthCheckEngine::new_internal(
            self.cfg,
            bus,
            Arc::new(ClientManager::new()),
            ctx,
            reactor,
        )))
    }
}
