//! Booking lifecycle: creation and the status state machine, with the
//! authorization rules for who may trigger which transition. Every
//! successful transition fans out to the counter-party's live sessions and
//! dispatches a best-effort notification.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use ridepool_domain::booking::{Booking, BookingStatus, NewBooking};
use ridepool_domain::events::LiveEvent;
use ridepool_domain::repository::{BookingStore, TripStore};
use ridepool_domain::trip::{Trip, TripStatus};
use ridepool_domain::{DomainError, DomainResult, MAX_SEATS_PER_BOOKING};
use ridepool_realtime::SessionRegistry;

use crate::capacity::CapacityLedger;
use crate::notify::{spawn_notify, NotificationIntent, Notifier};

pub struct BookingService {
    trips: Arc<dyn TripStore>,
    bookings: Arc<dyn BookingStore>,
    ledger: Arc<CapacityLedger>,
    registry: Arc<SessionRegistry>,
    notifier: Arc<dyn Notifier>,
}

impl BookingService {
    pub fn new(
        trips: Arc<dyn TripStore>,
        bookings: Arc<dyn BookingStore>,
        ledger: Arc<CapacityLedger>,
        registry: Arc<SessionRegistry>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            trips,
            bookings,
            ledger,
            registry,
            notifier,
        }
    }

    async fn trip_or_not_found(&self, trip_id: Uuid) -> DomainResult<Trip> {
        self.trips
            .get(trip_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("trip {trip_id}")))
    }

    async fn booking_or_not_found(&self, id: Uuid) -> DomainResult<Booking> {
        self.bookings
            .get(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("booking {id}")))
    }

    /// Creates a booking request. Both creation paths go through here: the
    /// row is always inserted pending, and trips with instant booking
    /// immediately promote it through the capacity ledger's guarded
    /// confirm.
    pub async fn create(
        &self,
        passenger_id: Uuid,
        trip_id: Uuid,
        seats: i32,
    ) -> DomainResult<Booking> {
        if seats < 1 || seats > MAX_SEATS_PER_BOOKING {
            return Err(DomainError::Validation(format!(
                "seats must be between 1 and {MAX_SEATS_PER_BOOKING}"
            )));
        }

        let trip = self.trip_or_not_found(trip_id).await?;

        if trip.driver_id == passenger_id {
            return Err(DomainError::Validation(
                "you cannot book your own trip".into(),
            ));
        }
        if trip.status != TripStatus::Active {
            return Err(DomainError::Validation(
                "this trip is no longer available".into(),
            ));
        }
        if trip.date_time <= chrono::Utc::now() {
            return Err(DomainError::Validation("this trip has already departed".into()));
        }
        if self
            .bookings
            .find_active(trip_id, passenger_id)
            .await?
            .is_some()
        {
            return Err(DomainError::Validation(
                "you already have an active booking on this trip".into(),
            ));
        }

        // A pending reservation does not consume capacity, so the only
        // up-front refusal is a request no empty trip could seat. The real
        // check happens at confirmation, inside the ledger.
        if seats > trip.total_seats {
            return Err(DomainError::CapacityExceeded {
                requested: seats,
                available: trip.total_seats,
            });
        }

        let booking = self
            .bookings
            .insert(
                NewBooking {
                    trip_id,
                    passenger_id,
                    seats,
                },
                BookingStatus::Pending,
            )
            .await?;

        let booking = if trip.instant_booking {
            match self.ledger.confirm(&trip, &booking).await {
                Ok(confirmed) => confirmed,
                Err(e) => {
                    // Lost the seat race after insert; retire the fresh row.
                    let _ = self
                        .bookings
                        .update_status(booking.id, BookingStatus::Pending, BookingStatus::Rejected)
                        .await;
                    return Err(e);
                }
            }
        } else {
            booking
        };

        info!(
            booking_id = %booking.id,
            trip_id = %trip_id,
            passenger_id = %passenger_id,
            status = %booking.status,
            "booking created"
        );

        self.registry.emit_to_user(
            trip.driver_id,
            LiveEvent::NewBooking {
                booking_id: booking.id,
                trip_id,
                passenger_id,
                seats,
                status: booking.status.to_string(),
            },
        );

        let intent = if booking.status == BookingStatus::Confirmed {
            NotificationIntent::BookingConfirmed {
                passenger_id,
                driver_id: trip.driver_id,
                trip_id,
                booking_id: booking.id,
            }
        } else {
            NotificationIntent::NewBookingRequest {
                driver_id: trip.driver_id,
                passenger_id,
                trip_id,
                booking_id: booking.id,
                seats,
            }
        };
        spawn_notify(self.notifier.clone(), intent);

        Ok(booking)
    }

    /// Applies a status transition on behalf of `actor`, enforcing the
    /// transition table. Failures perform no write.
    pub async fn update_status(
        &self,
        actor_id: Uuid,
        booking_id: Uuid,
        target: BookingStatus,
    ) -> DomainResult<Booking> {
        let booking = self.booking_or_not_found(booking_id).await?;
        let trip = self.trip_or_not_found(booking.trip_id).await?;

        if booking.status.is_terminal() {
            return Err(DomainError::InvalidState {
                from: booking.status.to_string(),
                to: target.to_string(),
            });
        }

        let updated = match target {
            BookingStatus::Confirmed => {
                if actor_id != trip.driver_id {
                    return Err(DomainError::Forbidden(
                        "only the trip driver can confirm a booking".into(),
                    ));
                }
                if booking.status != BookingStatus::Pending {
                    return Err(DomainError::InvalidState {
                        from: booking.status.to_string(),
                        to: target.to_string(),
                    });
                }
                let updated = self.ledger.confirm(&trip, &booking).await?;
                self.registry.emit_to_user(
                    booking.passenger_id,
                    LiveEvent::BookingAccepted {
                        booking_id,
                        trip_id: trip.id,
                        driver_id: trip.driver_id,
                    },
                );
                spawn_notify(
                    self.notifier.clone(),
                    NotificationIntent::BookingConfirmed {
                        passenger_id: booking.passenger_id,
                        driver_id: trip.driver_id,
                        trip_id: trip.id,
                        booking_id,
                    },
                );
                updated
            }
            BookingStatus::Rejected => {
                if actor_id != trip.driver_id {
                    return Err(DomainError::Forbidden(
                        "only the trip driver can reject a booking".into(),
                    ));
                }
                if booking.status != BookingStatus::Pending {
                    return Err(DomainError::InvalidState {
                        from: booking.status.to_string(),
                        to: target.to_string(),
                    });
                }
                let updated = self
                    .bookings
                    .update_status(booking_id, BookingStatus::Pending, BookingStatus::Rejected)
                    .await?;
                self.registry.emit_to_user(
                    booking.passenger_id,
                    LiveEvent::BookingRejected {
                        booking_id,
                        trip_id: trip.id,
                        driver_id: trip.driver_id,
                    },
                );
                spawn_notify(
                    self.notifier.clone(),
                    NotificationIntent::BookingRejected {
                        passenger_id: booking.passenger_id,
                        driver_id: trip.driver_id,
                        trip_id: trip.id,
                        booking_id,
                    },
                );
                updated
            }
            BookingStatus::Cancelled => {
                if actor_id != booking.passenger_id {
                    return Err(DomainError::Forbidden(
                        "only the passenger can cancel their booking".into(),
                    ));
                }
                let was_confirmed = booking.status == BookingStatus::Confirmed;
                let updated = self
                    .bookings
                    .update_status(booking_id, booking.status, BookingStatus::Cancelled)
                    .await?;
                if was_confirmed {
                    self.ledger.release(&trip).await;
                }
                self.registry.emit_to_user(
                    trip.driver_id,
                    LiveEvent::BookingCancelled {
                        booking_id,
                        trip_id: trip.id,
                        passenger_id: booking.passenger_id,
                    },
                );
                updated
            }
            BookingStatus::Pending => {
                return Err(DomainError::InvalidState {
                    from: booking.status.to_string(),
                    to: target.to_string(),
                });
            }
        };

        info!(
            booking_id = %booking_id,
            from = %booking.status,
            to = %updated.status,
            actor_id = %actor_id,
            "booking status updated"
        );
        Ok(updated)
    }

    /// Visible to the passenger and the trip's driver only.
    pub async fn get(&self, actor_id: Uuid, booking_id: Uuid) -> DomainResult<Booking> {
        let booking = self.booking_or_not_found(booking_id).await?;
        let trip = self.trip_or_not_found(booking.trip_id).await?;
        if actor_id != booking.passenger_id && actor_id != trip.driver_id {
            return Err(DomainError::Forbidden("not your booking".into()));
        }
        Ok(booking)
    }

    pub async fn list_for_passenger(
        &self,
        passenger_id: Uuid,
        status: Option<BookingStatus>,
    ) -> DomainResult<Vec<Booking>> {
        self.bookings.list_for_passenger(passenger_id, status).await
    }

    /// All bookings on a trip; driver only.
    pub async fn list_for_trip(&self, actor_id: Uuid, trip_id: Uuid) -> DomainResult<Vec<Booking>> {
        let trip = self.trip_or_not_found(trip_id).await?;
        if actor_id != trip.driver_id {
            return Err(DomainError::Forbidden(
                "only the trip driver can list its bookings".into(),
            ));
        }
        self.bookings.list_for_trip(trip_id).await
    }
}
