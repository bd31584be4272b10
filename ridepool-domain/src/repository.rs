use async_trait::async_trait;
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus, NewBooking};
use crate::message::{Message, NewMessage};
use crate::trip::{NewTrip, Trip, TripChanges, TripFilter, TripStatus};
use crate::user::UserRef;
use crate::DomainResult;

/// Gateway to trip rows. The backing store offers row-level CRUD only;
/// `update_status` is the single atomic primitive (a conditional
/// single-row write that fails with `Conflict` when the row is no longer
/// in the expected status).
#[async_trait]
pub trait TripStore: Send + Sync {
    async fn insert(&self, driver_id: Uuid, trip: NewTrip) -> DomainResult<Trip>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Trip>>;

    /// Applies a partial edit in one row write.
    async fn update(&self, id: Uuid, changes: TripChanges) -> DomainResult<Trip>;

    /// Hard delete; the schema cascades to the trip's bookings. Returns
    /// false when the row was already gone.
    async fn delete(&self, id: Uuid) -> DomainResult<bool>;

    /// Active trips departing in the future matching the filter, soonest
    /// departure first.
    async fn search(&self, filter: TripFilter) -> DomainResult<Vec<Trip>>;

    /// Every trip published by the driver, newest first.
    async fn list_for_driver(&self, driver_id: Uuid) -> DomainResult<Vec<Trip>>;

    /// Rewrites the derived `seats_available` field.
    async fn set_seats_available(&self, id: Uuid, seats_available: i32) -> DomainResult<()>;

    async fn update_status(
        &self,
        id: Uuid,
        expected: TripStatus,
        next: TripStatus,
    ) -> DomainResult<Trip>;
}

/// Gateway to booking rows. `update_status` is the compare-and-swap used
/// by the state machine: the write only lands if the row is still in
/// `expected` status.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn insert(&self, booking: NewBooking, status: BookingStatus) -> DomainResult<Booking>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Booking>>;

    /// The passenger's booking on this trip still in pending/confirmed, if
    /// any.
    async fn find_active(&self, trip_id: Uuid, passenger_id: Uuid)
        -> DomainResult<Option<Booking>>;

    async fn confirmed_for_trip(&self, trip_id: Uuid) -> DomainResult<Vec<Booking>>;

    /// Pending and confirmed bookings for a trip.
    async fn active_for_trip(&self, trip_id: Uuid) -> DomainResult<Vec<Booking>>;

    /// Newest first.
    async fn list_for_passenger(
        &self,
        passenger_id: Uuid,
        status: Option<BookingStatus>,
    ) -> DomainResult<Vec<Booking>>;

    /// Newest first.
    async fn list_for_trip(&self, trip_id: Uuid) -> DomainResult<Vec<Booking>>;

    async fn update_status(
        &self,
        id: Uuid,
        expected: BookingStatus,
        next: BookingStatus,
    ) -> DomainResult<Booking>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert(&self, message: NewMessage) -> DomainResult<Message>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Message>>;

    /// Full history between two users, oldest first.
    async fn between(&self, a: Uuid, b: Uuid) -> DomainResult<Vec<Message>>;

    /// Every message the user sent or received, newest first.
    async fn for_user(&self, user_id: Uuid) -> DomainResult<Vec<Message>>;

    /// Flips `read` to true. Returns false when the message was already
    /// read (the write is skipped).
    async fn mark_read(&self, id: Uuid) -> DomainResult<bool>;

    /// Marks every unread message from `sender_id` to `recipient_id` as
    /// read; returns the ids affected.
    async fn mark_conversation_read(
        &self,
        sender_id: Uuid,
        recipient_id: Uuid,
    ) -> DomainResult<Vec<Uuid>>;

    /// Hard delete. Returns false when the row was already gone.
    async fn delete(&self, id: Uuid) -> DomainResult<bool>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, id: Uuid) -> DomainResult<Option<UserRef>>;
}
