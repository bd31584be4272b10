//! Seat accounting for a trip. Owns the no-overbooking invariant: only
//! confirmed bookings consume capacity, counts are read fresh at decision
//! time, and the pending-to-confirmed promotion re-validates inside a
//! per-trip critical section immediately before the conditional write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};
use uuid::Uuid;

use ridepool_domain::booking::{Booking, BookingStatus};
use ridepool_domain::repository::{BookingStore, TripStore};
use ridepool_domain::trip::Trip;
use ridepool_domain::{DomainError, DomainResult};

pub struct CapacityLedger {
    trips: Arc<dyn TripStore>,
    bookings: Arc<dyn BookingStore>,
    // Per-trip write slots. The backing store only offers single-row CAS,
    // so confirmations of the same trip serialize here; the row-level
    // precondition still catches writers outside this process.
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl CapacityLedger {
    pub fn new(trips: Arc<dyn TripStore>, bookings: Arc<dyn BookingStore>) -> Self {
        Self {
            trips,
            bookings,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn trip_lock(&self, trip_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        // Sweep slots nobody holds so the map stays bounded by the number
        // of trips with in-flight confirmations.
        locks.retain(|id, lock| *id == trip_id || Arc::strong_count(lock) > 1);
        locks.entry(trip_id).or_default().clone()
    }

    /// Seats held by confirmed bookings, read fresh.
    pub async fn booked_seats(&self, trip_id: Uuid) -> DomainResult<i32> {
        let confirmed = self.bookings.confirmed_for_trip(trip_id).await?;
        Ok(confirmed.iter().map(|b| b.seats).sum())
    }

    pub async fn can_accommodate(&self, trip: &Trip, requested: i32) -> DomainResult<bool> {
        let booked = self.booked_seats(trip.id).await?;
        Ok(booked + requested <= trip.total_seats)
    }

    /// Promotes a pending booking to confirmed. Re-checks the confirmed
    /// seat total inside the trip's write slot, then performs the status
    /// write conditioned on the booking still being pending. Exactly one
    /// of two racing confirmations of the last seat wins; the loser gets
    /// `CapacityExceeded` (or `Conflict` if its row was already taken).
    pub async fn confirm(&self, trip: &Trip, booking: &Booking) -> DomainResult<Booking> {
        let lock = self.trip_lock(trip.id);
        let _slot = lock.lock().await;

        let booked = self.booked_seats(trip.id).await?;
        if booked + booking.seats > trip.total_seats {
            return Err(DomainError::CapacityExceeded {
                requested: booking.seats,
                available: trip.total_seats - booked,
            });
        }

        let confirmed = self
            .bookings
            .update_status(booking.id, BookingStatus::Pending, BookingStatus::Confirmed)
            .await?;

        // Derived convenience field; persisted bookings are the source of
        // truth, so a failed refresh must not un-report the committed
        // write.
        if let Err(e) = self
            .trips
            .set_seats_available(trip.id, trip.total_seats - booked - booking.seats)
            .await
        {
            warn!(trip_id = %trip.id, error = %e, "seats_available refresh failed");
        }

        info!(
            trip_id = %trip.id,
            booking_id = %booking.id,
            seats = booking.seats,
            remaining = trip.total_seats - booked - booking.seats,
            "booking confirmed"
        );
        Ok(confirmed)
    }

    /// Recomputes `seats_available` after a confirmed booking left the
    /// confirmed set. Best effort: the caller's transition already
    /// committed, so failures are logged and swallowed.
    pub async fn release(&self, trip: &Trip) {
        let lock = self.trip_lock(trip.id);
        let _slot = lock.lock().await;

        let refreshed = match self.booked_seats(trip.id).await {
            Ok(booked) => {
                self.trips
                    .set_seats_available(trip.id, trip.total_seats - booked)
                    .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = refreshed {
            warn!(trip_id = %trip.id, error = %e, "seats_available refresh failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{future_trip, gateway};
    use ridepool_domain::booking::NewBooking;

    async fn pending_booking(
        gw: &ridepool_store::MemoryGateway,
        trip_id: Uuid,
        seats: i32,
    ) -> Booking {
        BookingStore::insert(
            gw,
            NewBooking {
                trip_id,
                passenger_id: Uuid::new_v4(),
                seats,
            },
            BookingStatus::Pending,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_confirmed_seats_only_count() {
        let gw = gateway();
        let trip = TripStore::insert(&gw, Uuid::new_v4(), future_trip(3, false))
            .await
            .unwrap();
        let ledger = CapacityLedger::new(Arc::new(gw.clone()), Arc::new(gw.clone()));

        let pending = pending_booking(&gw, trip.id, 2).await;
        assert_eq!(ledger.booked_seats(trip.id).await.unwrap(), 0);

        ledger.confirm(&trip, &pending).await.unwrap();
        assert_eq!(ledger.booked_seats(trip.id).await.unwrap(), 2);
        assert!(ledger.can_accommodate(&trip, 1).await.unwrap());
        assert!(!ledger.can_accommodate(&trip, 2).await.unwrap());
    }

    #[tokio::test]
    async fn test_confirm_rejects_over_capacity() {
        let gw = gateway();
        let trip = TripStore::insert(&gw, Uuid::new_v4(), future_trip(2, false))
            .await
            .unwrap();
        let ledger = CapacityLedger::new(Arc::new(gw.clone()), Arc::new(gw.clone()));

        let first = pending_booking(&gw, trip.id, 2).await;
        let second = pending_booking(&gw, trip.id, 1).await;

        ledger.confirm(&trip, &first).await.unwrap();
        let err = ledger.confirm(&trip, &second).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::CapacityExceeded {
                requested: 1,
                available: 0
            }
        ));

        // The loser's row is untouched.
        let second = BookingStore::get(&gw, second.id).await.unwrap().unwrap();
        assert_eq!(second.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn test_racing_confirms_exactly_one_wins() {
        let gw = gateway();
        let trip = TripStore::insert(&gw, Uuid::new_v4(), future_trip(1, false))
            .await
            .unwrap();
        let ledger = Arc::new(CapacityLedger::new(
            Arc::new(gw.clone()),
            Arc::new(gw.clone()),
        ));

        let a = pending_booking(&gw, trip.id, 1).await;
        let b = pending_booking(&gw, trip.id, 1).await;

        let (ra, rb) = tokio::join!(ledger.confirm(&trip, &a), ledger.confirm(&trip, &b));

        assert_ne!(ra.is_ok(), rb.is_ok(), "exactly one confirmation must win");
        let loser = if ra.is_ok() { rb } else { ra };
        assert!(matches!(
            loser.unwrap_err(),
            DomainError::CapacityExceeded { .. } | DomainError::Conflict(_)
        ));

        let confirmed = gw.confirmed_for_trip(trip.id).await.unwrap();
        assert_eq!(confirmed.iter().map(|b| b.seats).sum::<i32>(), 1);
    }

    #[tokio::test]
    async fn test_release_refreshes_seats_available() {
        let gw = gateway();
        let trip = TripStore::insert(&gw, Uuid::new_v4(), future_trip(4, false))
            .await
            .unwrap();
        let ledger = CapacityLedger::new(Arc::new(gw.clone()), Arc::new(gw.clone()));

        let booking = pending_booking(&gw, trip.id, 3).await;
        ledger.confirm(&trip, &booking).await.unwrap();
        assert_eq!(
            TripStore::get(&gw, trip.id).await.unwrap().unwrap().seats_available,
            1
        );

        BookingStore::update_status(
            &gw,
            booking.id,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
        )
        .await
        .unwrap();
        ledger.release(&trip).await;
        assert_eq!(
            TripStore::get(&gw, trip.id).await.unwrap().unwrap().seats_available,
            4
        );
    }

    /// Trip store whose `seats_available` writes always fail; everything
    /// else delegates.
    struct FlakySeatsStore(ridepool_store::MemoryGateway);

    #[async_trait::async_trait]
    impl TripStore for FlakySeatsStore {
        async fn insert(
            &self,
            driver_id: Uuid,
            trip: ridepool_domain::trip::NewTrip,
        ) -> DomainResult<Trip> {
            TripStore::insert(&self.0, driver_id, trip).await
        }

        async fn get(&self, id: Uuid) -> DomainResult<Option<Trip>> {
            TripStore::get(&self.0, id).await
        }

        async fn update(
            &self,
            id: Uuid,
            changes: ridepool_domain::trip::TripChanges,
        ) -> DomainResult<Trip> {
            TripStore::update(&self.0, id, changes).await
        }

        async fn delete(&self, id: Uuid) -> DomainResult<bool> {
            TripStore::delete(&self.0, id).await
        }

        async fn search(
            &self,
            filter: ridepool_domain::trip::TripFilter,
        ) -> DomainResult<Vec<Trip>> {
            self.0.search(filter).await
        }

        async fn list_for_driver(&self, driver_id: Uuid) -> DomainResult<Vec<Trip>> {
            self.0.list_for_driver(driver_id).await
        }

        async fn set_seats_available(&self, _id: Uuid, _seats: i32) -> DomainResult<()> {
            Err(DomainError::Storage("seats write refused".into()))
        }

        async fn update_status(
            &self,
            id: Uuid,
            expected: ridepool_domain::trip::TripStatus,
            next: ridepool_domain::trip::TripStatus,
        ) -> DomainResult<Trip> {
            TripStore::update_status(&self.0, id, expected, next).await
        }
    }

    #[tokio::test]
    async fn test_confirm_survives_seats_available_write_failure() {
        let gw = gateway();
        let trip = TripStore::insert(&gw, Uuid::new_v4(), future_trip(2, false))
            .await
            .unwrap();
        let ledger = CapacityLedger::new(
            Arc::new(FlakySeatsStore(gw.clone())),
            Arc::new(gw.clone()),
        );

        let booking = pending_booking(&gw, trip.id, 1).await;
        let confirmed = ledger.confirm(&trip, &booking).await.unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);

        // The committed write is what the store reports back.
        let stored = BookingStore::get(&gw, booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Confirmed);

        // Release on the same flaky store stays silent too.
        ledger.release(&trip).await;
    }

    #[tokio::test]
    async fn test_lock_slots_are_swept_when_idle() {
        let gw = gateway();
        let ledger = CapacityLedger::new(Arc::new(gw.clone()), Arc::new(gw));

        for _ in 0..32 {
            let slot = ledger.trip_lock(Uuid::new_v4());
            drop(slot);
        }

        // Only the most recent acquisition can still be resident.
        assert!(ledger.locks.lock().unwrap().len() <= 1);
    }
}
