use std::net::SocketAddr;
use std::sync::Arc;

use ridepool_api::{
    app,
    state::{AppState, AuthConfig},
};
use ridepool_core::notify::LogNotifier;
use ridepool_core::{BookingService, CapacityLedger, MessageService, TripService};
use ridepool_domain::repository::{BookingStore, MessageStore, TripStore, UserStore};
use ridepool_realtime::SessionRegistry;
use ridepool_store::{DbClient, PgBookingStore, PgMessageStore, PgTripStore, PgUserStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ridepool=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ridepool_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Ridepool API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to database");
    db.migrate().await.expect("Failed to run migrations");

    let trips: Arc<dyn TripStore> = Arc::new(PgTripStore::new(db.pool.clone()));
    let bookings: Arc<dyn BookingStore> = Arc::new(PgBookingStore::new(db.pool.clone()));
    let messages: Arc<dyn MessageStore> = Arc::new(PgMessageStore::new(db.pool.clone()));
    let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(db.pool.clone()));

    let registry = Arc::new(SessionRegistry::new());
    let notifier = Arc::new(LogNotifier);
    let ledger = Arc::new(CapacityLedger::new(trips.clone(), bookings.clone()));

    let app_state = AppState {
        trips: Arc::new(TripService::new(
            trips.clone(),
            bookings.clone(),
            notifier.clone(),
        )),
        bookings: Arc::new(BookingService::new(
            trips,
            bookings,
            ledger,
            registry.clone(),
            notifier.clone(),
        )),
        messages: Arc::new(MessageService::new(
            messages,
            users,
            registry.clone(),
            notifier,
        )),
        registry,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
