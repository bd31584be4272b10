pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod memory;
pub mod message_repo;
pub mod trip_repo;
pub mod user_repo;

pub use booking_repo::PgBookingStore;
pub use database::DbClient;
pub use memory::MemoryGateway;
pub use message_repo::PgMessageStore;
pub use trip_repo::PgTripStore;
pub use user_repo::PgUserStore;

use ridepool_domain::DomainError;

pub(crate) fn storage_err(e: sqlx::Error) -> DomainError {
    DomainError::Storage(e.to_string())
}

pub(crate) fn parse_err(e: String) -> DomainError {
    DomainError::Storage(e)
}
