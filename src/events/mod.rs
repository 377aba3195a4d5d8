use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the storefront services.
///
/// Events are informational: consumers must never be able to fail a request
/// by rejecting one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Cart events
    CartItemAdded { cart_id: Uuid, product_id: Uuid },
    CartItemRemoved { cart_id: Uuid, item_id: Uuid },
    CartCleared(Uuid),

    // Order events
    OrderCreated(Uuid),
    OrderCancelled(Uuid),
    OrderPaid(Uuid),
    PaymentIntentCreated { order_id: Uuid, intent_id: String },

    // Catalog events
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeleted(Uuid),

    // Review events
    ProductRated { product_id: Uuid, score: i32 },
    ReviewCreated { product_id: Uuid, review_id: Uuid },
    ReviewDeleted { product_id: Uuid, review_id: Uuid },
    TargetReported { report_id: Uuid },

    // Account events
    AccountRegistered(Uuid),
    AccountActivated(Uuid),
    PasswordResetRequested(Uuid),
    PasswordChanged(Uuid),
    AccountDeleted(Uuid),
}

/// Cloneable handle for publishing events onto the in-process channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, surfacing channel failure to the caller.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging (rather than propagating) channel failure.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "Dropped event");
        }
    }
}

/// Consumes events from the channel for the lifetime of the process.
///
/// Currently the consumer only records events to the log; it is the hook
/// point for webhooks or a durable outbox later.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(event = ?event, "Processing event");
    }
    info!("Event channel closed; consumer exiting");
}
