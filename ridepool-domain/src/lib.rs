pub mod booking;
pub mod events;
pub mod message;
pub mod repository;
pub mod trip;
pub mod user;

/// Hard limit on seats a single booking may claim.
pub const MAX_SEATS_PER_BOOKING: i32 = 8;

/// Hard limit on a chat message body, in characters.
pub const MAX_MESSAGE_LEN: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid transition from {from} to {to}")]
    InvalidState { from: String, to: String },

    #[error("Not enough seats: requested {requested}, available {available}")]
    CapacityExceeded { requested: i32, available: i32 },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type DomainResult<T> = Result<T, DomainError>;
