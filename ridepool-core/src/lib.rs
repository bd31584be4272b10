pub mod booking;
pub mod capacity;
pub mod messaging;
pub mod notify;
pub mod trip;

pub use booking::BookingService;
pub use capacity::CapacityLedger;
pub use messaging::MessageService;
pub use trip::TripService;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use tokio::sync::mpsc;

    use ridepool_domain::trip::NewTrip;
    use ridepool_store::MemoryGateway;

    use crate::notify::{NotificationIntent, Notifier, NotifyError};

    pub fn gateway() -> MemoryGateway {
        MemoryGateway::new()
    }

    pub fn future_trip(seats: i32, instant_booking: bool) -> NewTrip {
        NewTrip {
            departure: "Lyon".to_string(),
            destination: "Grenoble".to_string(),
            date_time: Utc::now() + Duration::days(2),
            total_seats: seats,
            price_cents: 900,
            instant_booking,
            description: None,
            meeting_point: None,
        }
    }

    /// Records every dispatched intent and forwards it on a channel so
    /// tests can await the spawned dispatch.
    pub struct RecordingNotifier {
        pub intents: Mutex<Vec<NotificationIntent>>,
        tx: mpsc::UnboundedSender<NotificationIntent>,
    }

    impl RecordingNotifier {
        pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<NotificationIntent>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                Arc::new(Self {
                    intents: Mutex::new(Vec::new()),
                    tx,
                }),
                rx,
            )
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn dispatch(&self, intent: NotificationIntent) -> Result<(), NotifyError> {
            self.intents.lock().unwrap().push(intent.clone());
            let _ = self.tx.send(intent);
            Ok(())
        }
    }

    /// A notifier that always fails; transitions must still succeed.
    pub struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn dispatch(&self, _intent: NotificationIntent) -> Result<(), NotifyError> {
            Err(NotifyError::Delivery("push gateway unreachable".into()))
        }
    }
}
