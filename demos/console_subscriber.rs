//! # Example: console_subscriber
//!
//! Wires a console subscriber and the built-in [`LogWriter`] into a
//! [`HealthCheckEngine`], then lets one instance go silent.
//!
//! Shows how to:
//! - Implement the [`Subscribe`] trait for one event type.
//! - Override liveness timeouts through instance metadata.
//! - Watch an instance go unhealthy, recover on a beat, then expire.
//!
//! ## Flow
//! ```text
//! client_connected ──► register_instance ──► (silence)
//!     ├─► sweep ─► UnhealthyInstanceChecker ─► ServiceChanged ──► ConsoleSubscriber
//!     ├─► beat() ─► fast recovery ───────────► ServiceChanged ──► ConsoleSubscriber
//!     └─► sweep ─► ExpiredInstanceChecker ───► ClientDeregisterService ─► LogWriter
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example console_subscriber
//! ```

use std::{sync::Arc, time::Duration};

use beatvisor::{
    BeatInfo, Client, Config, Event, EventKind, EventType, HEART_BEAT_TIMEOUT, HealthCheckEngine,
    IP_DELETE_TIMEOUT, InstanceMetadata, InstancePublishInfo, Interest, LogWriter,
    MetadataProvider, MetadataStore, Service, Subscribe,
};
use tracing_subscriber::EnvFilter;

/// Prints every service view change.
struct ConsoleSubscriber;

#[async_trait::async_trait]
impl Subscribe for ConsoleSubscriber {
    async fn on_event(&self, ev: &Event) {
        if let EventKind::ServiceChanged { service } = &ev.kind {
            println!("[sub] service changed: seq={} service={service}", ev.seq);
        }
    }

    fn interest(&self) -> Interest {
        Interest::Exact(EventType::ServiceChanged)
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let service = Service::new("public", "DEFAULT_GROUP", "orders", true);
    let metadata = Arc::new(MetadataStore::new());
    metadata.update_instance_metadata(
        service.clone(),
        "10.0.0.5:8080:DEFAULT",
        InstanceMetadata::new()
            .with_extend(HEART_BEAT_TIMEOUT, "500")
            .with_extend(IP_DELETE_TIMEOUT, "1500"),
    );

    let engine = HealthCheckEngine::builder(Config {
        check_interval_ms: 200,
        ..Config::default()
    })
    .with_metadata(metadata as Arc<dyn MetadataProvider>)
    .with_subscribers(vec![
        Arc::new(ConsoleSubscriber) as Arc<dyn Subscribe>,
        Arc::new(LogWriter),
    ])
    .build()?;

    let client = engine.client_connected(Client::ip_port("10.0.0.5", 8080, true));
    engine
        .register_instance(
            client.client_id(),
            service.clone(),
            InstancePublishInfo::new("10.0.0.5", 8080),
        )
        .await?;

    // Let the instance turn unhealthy, then bring it back.
    tokio::time::sleep(Duration::from_millis(900)).await;
    let outcome = engine
        .beat(&BeatInfo::new("public", "DEFAULT_GROUP@@orders", "10.0.0.5", 8080))
        .await?;
    println!("[main] beat outcome: {outcome:?}");

    // Stay silent until the instance expires.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    println!(
        "[main] instances still published: {}",
        client.instance_count()
    );

    engine.shutdown();
    Ok(())
}
