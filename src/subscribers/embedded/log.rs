//! # LogWriter: bus event printer
//!
//! A predicate subscriber that logs every event it sees through `tracing`.
//! Use it for tests or demos.
//!
//! ## Example output
//! ```text
//! INFO [service-changed] service=public#DEFAULT_GROUP@@orders#true seq=12
//! INFO [client-changed] client_id=10.0.0.1:8080#true seq=13
//! INFO [client-deregister] service=public#DEFAULT_GROUP@@orders#true client_id=10.0.0.1:8080#true seq=14
//! INFO [client-disconnect] client_id=10.0.0.1:8080#true seq=15
//! INFO [custom] topic=audit payload=Some("hello") seq=16
//! ```

use async_trait::async_trait;
use tracing::info;

use crate::events::{Event, EventKind};
use crate::subscribers::{Interest, Subscribe};

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match &e.kind {
            EventKind::ServiceChanged { service } => {
                info!(service = %service, seq = e.seq, "[service-changed]");
            }
            EventKind::ClientChanged { client_id } => {
                info!(client_id = %client_id, seq = e.seq, "[client-changed]");
            }
            EventKind::ClientDeregisterService { service, client_id } => {
                info!(service = %service, client_id = %client_id, seq = e.seq, "[client-deregister]");
            }
            EventKind::ClientDisconnect { client_id } => {
                info!(client_id = %client_id, seq = e.seq, "[client-disconnect]");
            }
            EventKind::Custom { topic, payload } => {
                info!(topic = *topic, payload = ?payload, seq = e.seq, "[custom]");
            }
        }
    }

    fn interest(&self) -> Interest {
        Interest::Predicate
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
