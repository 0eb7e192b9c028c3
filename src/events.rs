use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Handle used by services to emit domain events.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously. Event delivery is best-effort; a full
    /// or closed channel never fails the originating operation.
    pub async fn send(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            warn!("Failed to publish event: {}", e);
        }
    }
}

/// The events emitted by the coordination core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Picking
    PickAssigned {
        operator_id: Uuid,
        product_code: String,
        target: i64,
    },
    UnitPicked {
        operator_id: Uuid,
        product_code: String,
        order_id: Uuid,
        remaining: i64,
    },
    PickCompleted {
        operator_id: Uuid,
        product_code: String,
    },

    // Packing
    PackAssigned {
        operator_id: Uuid,
        order_number: String,
    },
    UnitPacked {
        operator_id: Uuid,
        order_number: String,
        product_code: String,
    },
    OrderPacked {
        operator_id: Uuid,
        order_number: String,
    },

    // Order lifecycle
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },

    // Shipping
    ManifestClosed {
        manifest_id: Uuid,
        batch_number: String,
        order_count: u64,
    },
}

/// Creates an event channel pair with the given buffer capacity.
pub fn event_channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Drains the event channel, logging each event. Spawned at startup; richer
/// consumers (webhooks, outbox) would hang off this same receiver.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(?event, "domain event");
    }
}
