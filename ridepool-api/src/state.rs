use std::sync::Arc;

use ridepool_core::{BookingService, MessageService, TripService};
use ridepool_realtime::SessionRegistry;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub trips: Arc<TripService>,
    pub bookings: Arc<BookingService>,
    pub messages: Arc<MessageService>,
    pub registry: Arc<SessionRegistry>,
    pub auth: AuthConfig,
}
