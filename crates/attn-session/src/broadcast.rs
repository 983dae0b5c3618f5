//! Dashboard fan-out.
//!
//! Delivery is best effort: each client's queue is offered the message without
//! waiting. A full or closed queue drops the update for that client only; the
//! next tick supersedes it.

use attn_core::ServerMessage;
use attn_telemetry::Metrics;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace, warn};

use crate::clients::ClientRegistry;

/// Per-publish delivery counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Publishes dashboard updates to every connected client.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    clients: ClientRegistry,
}

impl Broadcaster {
    pub fn new(clients: ClientRegistry) -> Self {
        Self { clients }
    }

    /// Offer `message` to every connected client. Never fails as a whole.
    pub fn publish(&self, message: &ServerMessage) -> PublishReport {
        let mut report = PublishReport::default();

        for (client, tx) in self.clients.senders() {
            match tx.try_send(message.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(client = %client, kind = message.kind(), "Client queue full, update dropped");
                    report.failed += 1;
                    Metrics::dashboard_failed();
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(client = %client, kind = message.kind(), "Client gone, update dropped");
                    report.failed += 1;
                    Metrics::dashboard_failed();
                }
            }
        }

        Metrics::dashboard_delivered(report.delivered);
        trace!(
            delivered = report.delivered,
            failed = report.failed,
            "Dashboard update published"
        );
        report
    }
}
