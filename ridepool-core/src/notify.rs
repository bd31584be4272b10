//! Boundary to the out-of-band push/email collaborators. The core only
//! emits intents; concrete delivery lives outside this repository.
//! Dispatch failures are logged and swallowed, never surfaced to the
//! triggering request.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum NotificationIntent {
    NewBookingRequest {
        driver_id: Uuid,
        passenger_id: Uuid,
        trip_id: Uuid,
        booking_id: Uuid,
        seats: i32,
    },
    BookingConfirmed {
        passenger_id: Uuid,
        driver_id: Uuid,
        trip_id: Uuid,
        booking_id: Uuid,
    },
    BookingRejected {
        passenger_id: Uuid,
        driver_id: Uuid,
        trip_id: Uuid,
        booking_id: Uuid,
    },
    NewMessage {
        recipient_id: Uuid,
        sender_id: Uuid,
        preview: String,
    },
    TripCancelled {
        passenger_ids: Vec<Uuid>,
        trip_id: Uuid,
        cancelled_by: Uuid,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn dispatch(&self, intent: NotificationIntent) -> Result<(), NotifyError>;
}

/// Fire-and-forget dispatch on a spawned task; a stalled or failing
/// collaborator never holds up the booking or message path.
pub fn spawn_notify(notifier: Arc<dyn Notifier>, intent: NotificationIntent) {
    tokio::spawn(async move {
        if let Err(e) = notifier.dispatch(intent).await {
            warn!(error = %e, "notification dispatch failed");
        }
    });
}

/// Default wiring: logs the intent. Push/email transports plug in behind
/// the same trait.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn dispatch(&self, intent: NotificationIntent) -> Result<(), NotifyError> {
        info!(?intent, "notification intent");
        Ok(())
    }
}
