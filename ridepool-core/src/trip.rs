//! Trip publication and retirement. Most trip fields are plain data; the
//! part the core cares about is seat bookkeeping (owned by the capacity
//! ledger) and cancellation, which must reach every passenger holding an
//! active booking.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use ridepool_domain::repository::{BookingStore, TripStore};
use ridepool_domain::trip::{NewTrip, Trip, TripChanges, TripFilter, TripStatus};
use ridepool_domain::{DomainError, DomainResult, MAX_SEATS_PER_BOOKING};

use crate::notify::{spawn_notify, NotificationIntent, Notifier};

pub struct TripService {
    trips: Arc<dyn TripStore>,
    bookings: Arc<dyn BookingStore>,
    notifier: Arc<dyn Notifier>,
}

impl TripService {
    pub fn new(
        trips: Arc<dyn TripStore>,
        bookings: Arc<dyn BookingStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            trips,
            bookings,
            notifier,
        }
    }

    pub async fn create(&self, driver_id: Uuid, trip: NewTrip) -> DomainResult<Trip> {
        if trip.departure.trim().is_empty() || trip.destination.trim().is_empty() {
            return Err(DomainError::Validation(
                "departure and destination are required".into(),
            ));
        }
        if trip.total_seats < 1 || trip.total_seats > MAX_SEATS_PER_BOOKING {
            return Err(DomainError::Validation(format!(
                "total seats must be between 1 and {MAX_SEATS_PER_BOOKING}"
            )));
        }
        if trip.price_cents < 0 {
            return Err(DomainError::Validation("price cannot be negative".into()));
        }
        if trip.date_time <= Utc::now() {
            return Err(DomainError::Validation(
                "departure must be in the future".into(),
            ));
        }

        let trip = self.trips.insert(driver_id, trip).await?;
        info!(trip_id = %trip.id, driver_id = %driver_id, "trip created");
        Ok(trip)
    }

    pub async fn get(&self, trip_id: Uuid) -> DomainResult<Trip> {
        self.trips
            .get(trip_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("trip {trip_id}")))
    }

    pub async fn search(&self, filter: TripFilter) -> DomainResult<Vec<Trip>> {
        self.trips.search(filter).await
    }

    pub async fn list_for_driver(&self, driver_id: Uuid) -> DomainResult<Vec<Trip>> {
        self.trips.list_for_driver(driver_id).await
    }

    /// Partial edit of an active trip; driver only. Shrinking the seat
    /// count below what is already confirmed is refused, and any seat
    /// change recomputes the derived `seats_available`.
    pub async fn update(
        &self,
        actor_id: Uuid,
        trip_id: Uuid,
        mut changes: TripChanges,
    ) -> DomainResult<Trip> {
        let trip = self.get(trip_id).await?;
        if trip.driver_id != actor_id {
            return Err(DomainError::Forbidden(
                "only the trip driver can edit the trip".into(),
            ));
        }
        if trip.status != TripStatus::Active {
            return Err(DomainError::Validation(
                "only active trips can be edited".into(),
            ));
        }
        if changes.is_empty() {
            return Err(DomainError::Validation("no changes supplied".into()));
        }
        if changes
            .departure
            .as_deref()
            .is_some_and(|d| d.trim().is_empty())
            || changes
                .destination
                .as_deref()
                .is_some_and(|d| d.trim().is_empty())
        {
            return Err(DomainError::Validation(
                "departure and destination cannot be blank".into(),
            ));
        }
        if changes.date_time.is_some_and(|d| d <= Utc::now()) {
            return Err(DomainError::Validation(
                "departure must be in the future".into(),
            ));
        }
        if changes.price_cents.is_some_and(|p| p < 0) {
            return Err(DomainError::Validation("price cannot be negative".into()));
        }
        if let Some(total) = changes.total_seats {
            if total < 1 || total > MAX_SEATS_PER_BOOKING {
                return Err(DomainError::Validation(format!(
                    "total seats must be between 1 and {MAX_SEATS_PER_BOOKING}"
                )));
            }
            let confirmed: i32 = self
                .bookings
                .confirmed_for_trip(trip_id)
                .await?
                .iter()
                .map(|b| b.seats)
                .sum();
            if total < confirmed {
                return Err(DomainError::Validation(format!(
                    "cannot reduce seats below the {confirmed} already confirmed"
                )));
            }
            changes.seats_available = Some(total - confirmed);
        }

        let updated = self.trips.update(trip_id, changes).await?;
        info!(trip_id = %trip_id, driver_id = %actor_id, "trip updated");
        Ok(updated)
    }

    /// Hard delete; driver only. Bookings go with the trip (the schema
    /// cascades), so passengers holding an active booking are notified
    /// first, best effort.
    pub async fn delete(&self, actor_id: Uuid, trip_id: Uuid) -> DomainResult<()> {
        let trip = self.get(trip_id).await?;
        if trip.driver_id != actor_id {
            return Err(DomainError::Forbidden(
                "only the trip driver can delete the trip".into(),
            ));
        }

        let passenger_ids: Vec<Uuid> = self
            .bookings
            .active_for_trip(trip_id)
            .await?
            .into_iter()
            .map(|b| b.passenger_id)
            .collect();

        if !self.trips.delete(trip_id).await? {
            return Err(DomainError::NotFound(format!("trip {trip_id}")));
        }
        info!(
            trip_id = %trip_id,
            passengers = passenger_ids.len(),
            "trip deleted"
        );

        if !passenger_ids.is_empty() {
            spawn_notify(
                self.notifier.clone(),
                NotificationIntent::TripCancelled {
                    passenger_ids,
                    trip_id,
                    cancelled_by: actor_id,
                },
            );
        }
        Ok(())
    }

    /// Soft-retires a trip. Driver only, active trips only; every passenger
    /// with a pending or confirmed booking is notified best-effort.
    pub async fn cancel(&self, actor_id: Uuid, trip_id: Uuid) -> DomainResult<Trip> {
        let trip = self.get(trip_id).await?;
        if trip.driver_id != actor_id {
            return Err(DomainError::Forbidden(
                "only the trip driver can cancel the trip".into(),
            ));
        }

        let cancelled = self
            .trips
            .update_status(trip_id, TripStatus::Active, TripStatus::Cancelled)
            .await?;

        let passenger_ids: Vec<Uuid> = self
            .bookings
            .active_for_trip(trip_id)
            .await?
            .into_iter()
            .map(|b| b.passenger_id)
            .collect();

        info!(
            trip_id = %trip_id,
            passengers = passenger_ids.len(),
            "trip cancelled"
        );

        if !passenger_ids.is_empty() {
            spawn_notify(
                self.notifier.clone(),
                NotificationIntent::TripCancelled {
                    passenger_ids,
                    trip_id,
                    cancelled_by: actor_id,
                },
            );
        }

        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{future_trip, gateway, RecordingNotifier};
    use ridepool_domain::booking::{BookingStatus, NewBooking};

    fn service(
        gw: &ridepool_store::MemoryGateway,
        notifier: Arc<dyn Notifier>,
    ) -> TripService {
        TripService::new(Arc::new(gw.clone()), Arc::new(gw.clone()), notifier)
    }

    #[tokio::test]
    async fn test_create_validates_inputs() {
        let gw = gateway();
        let (notifier, _rx) = RecordingNotifier::new();
        let svc = service(&gw, notifier);
        let driver = Uuid::new_v4();

        let mut past = future_trip(3, false);
        past.date_time = Utc::now() - chrono::Duration::hours(1);
        assert!(matches!(
            svc.create(driver, past).await.unwrap_err(),
            DomainError::Validation(_)
        ));

        let mut no_seats = future_trip(0, false);
        no_seats.total_seats = 0;
        assert!(matches!(
            svc.create(driver, no_seats).await.unwrap_err(),
            DomainError::Validation(_)
        ));

        let trip = svc.create(driver, future_trip(3, false)).await.unwrap();
        assert_eq!(trip.status, TripStatus::Active);
        assert_eq!(trip.seats_available, 3);
    }

    #[tokio::test]
    async fn test_cancel_is_driver_only_and_notifies_passengers() {
        let gw = gateway();
        let (notifier, mut rx) = RecordingNotifier::new();
        let svc = service(&gw, notifier);
        let driver = Uuid::new_v4();
        let passenger = Uuid::new_v4();

        let trip = svc.create(driver, future_trip(3, false)).await.unwrap();
        BookingStore::insert(
            &gw,
            NewBooking {
                trip_id: trip.id,
                passenger_id: passenger,
                seats: 1,
            },
            BookingStatus::Pending,
        )
        .await
        .unwrap();

        assert!(matches!(
            svc.cancel(passenger, trip.id).await.unwrap_err(),
            DomainError::Forbidden(_)
        ));

        let cancelled = svc.cancel(driver, trip.id).await.unwrap();
        assert_eq!(cancelled.status, TripStatus::Cancelled);

        match rx.recv().await.unwrap() {
            NotificationIntent::TripCancelled { passenger_ids, .. } => {
                assert_eq!(passenger_ids, vec![passenger]);
            }
            other => panic!("unexpected intent: {other:?}"),
        }

        // A second cancel hits the failed status precondition.
        assert!(matches!(
            svc.cancel(driver, trip.id).await.unwrap_err(),
            DomainError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn test_update_is_driver_only_and_validates() {
        let gw = gateway();
        let (notifier, _rx) = RecordingNotifier::new();
        let svc = service(&gw, notifier);
        let driver = Uuid::new_v4();
        let trip = svc.create(driver, future_trip(3, false)).await.unwrap();

        assert!(matches!(
            svc.update(
                Uuid::new_v4(),
                trip.id,
                TripChanges {
                    price_cents: Some(500),
                    ..Default::default()
                }
            )
            .await
            .unwrap_err(),
            DomainError::Forbidden(_)
        ));
        assert!(matches!(
            svc.update(driver, trip.id, TripChanges::default())
                .await
                .unwrap_err(),
            DomainError::Validation(_)
        ));
        assert!(matches!(
            svc.update(
                driver,
                trip.id,
                TripChanges {
                    date_time: Some(Utc::now() - chrono::Duration::hours(1)),
                    ..Default::default()
                }
            )
            .await
            .unwrap_err(),
            DomainError::Validation(_)
        ));

        let updated = svc
            .update(
                driver,
                trip.id,
                TripChanges {
                    departure: Some("Villeurbanne".into()),
                    price_cents: Some(650),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.departure, "Villeurbanne");
        assert_eq!(updated.price_cents, 650);
        // Untouched fields survive.
        assert_eq!(updated.destination, trip.destination);
    }

    #[tokio::test]
    async fn test_update_cannot_shrink_seats_below_confirmed() {
        let gw = gateway();
        let (notifier, _rx) = RecordingNotifier::new();
        let svc = service(&gw, notifier);
        let driver = Uuid::new_v4();
        let trip = svc.create(driver, future_trip(4, false)).await.unwrap();
        BookingStore::insert(
            &gw,
            NewBooking {
                trip_id: trip.id,
                passenger_id: Uuid::new_v4(),
                seats: 3,
            },
            BookingStatus::Confirmed,
        )
        .await
        .unwrap();

        assert!(matches!(
            svc.update(
                driver,
                trip.id,
                TripChanges {
                    total_seats: Some(2),
                    ..Default::default()
                }
            )
            .await
            .unwrap_err(),
            DomainError::Validation(_)
        ));

        // Shrinking to exactly the confirmed load leaves nothing free.
        let updated = svc
            .update(
                driver,
                trip.id,
                TripChanges {
                    total_seats: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.total_seats, 3);
        assert_eq!(updated.seats_available, 0);
    }

    #[tokio::test]
    async fn test_delete_is_driver_only_and_cascades_to_bookings() {
        let gw = gateway();
        let (notifier, mut rx) = RecordingNotifier::new();
        let svc = service(&gw, notifier);
        let driver = Uuid::new_v4();
        let passenger = Uuid::new_v4();
        let trip = svc.create(driver, future_trip(3, false)).await.unwrap();
        let booking = BookingStore::insert(
            &gw,
            NewBooking {
                trip_id: trip.id,
                passenger_id: passenger,
                seats: 1,
            },
            BookingStatus::Confirmed,
        )
        .await
        .unwrap();

        assert!(matches!(
            svc.delete(passenger, trip.id).await.unwrap_err(),
            DomainError::Forbidden(_)
        ));

        svc.delete(driver, trip.id).await.unwrap();
        assert!(matches!(
            svc.get(trip.id).await.unwrap_err(),
            DomainError::NotFound(_)
        ));
        assert!(BookingStore::get(&gw, booking.id).await.unwrap().is_none());

        match rx.recv().await.unwrap() {
            NotificationIntent::TripCancelled { passenger_ids, .. } => {
                assert_eq!(passenger_ids, vec![passenger]);
            }
            other => panic!("unexpected intent: {other:?}"),
        }

        assert!(matches!(
            svc.delete(driver, trip.id).await.unwrap_err(),
            DomainError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_search_returns_active_future_trips_soonest_first() {
        let gw = gateway();
        let (notifier, _rx) = RecordingNotifier::new();
        let svc = service(&gw, notifier);
        let driver = Uuid::new_v4();

        let mut later = future_trip(3, false);
        later.date_time = Utc::now() + chrono::Duration::days(5);
        let later = svc.create(driver, later).await.unwrap();
        let sooner = svc.create(driver, future_trip(3, false)).await.unwrap();
        let mut elsewhere = future_trip(2, false);
        elsewhere.destination = "Annecy".to_string();
        let elsewhere = svc.create(driver, elsewhere).await.unwrap();
        let cancelled = svc.create(driver, future_trip(3, false)).await.unwrap();
        svc.cancel(driver, cancelled.id).await.unwrap();

        let all = svc.search(TripFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, sooner.id);
        assert_eq!(all.last().unwrap().id, later.id);

        let filtered = svc
            .search(TripFilter {
                destination: Some("anne".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, elsewhere.id);

        let seated = svc
            .search(TripFilter {
                min_seats: Some(3),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(seated.iter().all(|t| t.seats_available >= 3));
        assert_eq!(seated.len(), 2);
    }

    #[tokio::test]
    async fn test_list_for_driver_only_shows_own_trips() {
        let gw = gateway();
        let (notifier, _rx) = RecordingNotifier::new();
        let svc = service(&gw, notifier);
        let driver = Uuid::new_v4();
        let other = Uuid::new_v4();

        svc.create(driver, future_trip(3, false)).await.unwrap();
        svc.create(driver, future_trip(2, false)).await.unwrap();
        svc.create(other, future_trip(2, false)).await.unwrap();

        let mine = svc.list_for_driver(driver).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|t| t.driver_id == driver));
    }
}
