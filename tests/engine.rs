use std::sync::Arc;
use std::time::Duration;

use beatvisor::{
    BeatInfo, BeatOutcome, Client, Config, Event, EventKind, EventType, FnSubscriber,
    HealthCheckEngine, InstancePublishInfo, Service, Subscribe, load_config, now_millis,
};
use parking_lot::Mutex;

type Seen = Arc<Mutex<Vec<Event>>>;

fn recorder() -> (Arc<dyn Subscribe>, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let sub = FnSubscriber::predicate("recorder", |_: &Event| true, move |ev: &Event| {
        sink.lock().push(ev.clone());
    })
    .arc();
    (sub, seen)
}

async fn wait_until(seen: &Seen, done: impl Fn(&[Event]) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done(&seen.lock()) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_silent_instance_is_marked_then_removed() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("beatvisor.toml");
    std::fs::write(
        &path,
        "check_interval_ms = 20\nheartbeat_timeout_ms = 15000\nip_delete_timeout_ms = 30000\n",
    )?;
    let cfg = load_config(&path)?;

    let (sub, seen) = recorder();
    let engine = HealthCheckEngine::builder(cfg)
        .with_subscribers(vec![sub])
        .build()?;

    let orders = Service::new("public", "DEFAULT_GROUP", "orders", true);
    let payments = Service::new("public", "DEFAULT_GROUP", "payments", true);

    let stale = engine.client_connected(Client::ip_port("10.0.0.1", 8080, true));
    engine
        .register_instance(
            stale.client_id(),
            orders.clone(),
            InstancePublishInfo::new("10.0.0.1", 8080).with_last_heartbeat(now_millis() - 60_000),
        )
        .await?;

    let live = engine.client_connected(Client::ip_port("10.0.0.2", 8080, true));
    engine
        .register_instance(
            live.client_id(),
            payments.clone(),
            InstancePublishInfo::new("10.0.0.2", 8080),
        )
        .await?;

    wait_until(&seen, |events| {
        let unhealthy = events
            .iter()
            .any(|e| e.event_type() == EventType::ServiceChanged && e.service() == Some(&orders));
        let removed = events.iter().any(|e| {
            matches!(&e.kind, EventKind::ClientDeregisterService { service, .. } if *service == orders)
        });
        unhealthy && removed
    })
    .await;

    assert_eq!(stale.instance_count(), 0);
    assert_eq!(live.instance_count(), 1);
    assert!(!seen.lock().iter().any(|e| e.service() == Some(&payments)));

    let beat = BeatInfo::new("public", "DEFAULT_GROUP@@payments", "10.0.0.2", 8080);
    assert_eq!(engine.beat(&beat).await?, BeatOutcome::Refreshed);

    engine.shutdown();
    assert!(engine.bus().is_closed());
    Ok(())
}
