//! In-memory gateway used by the test suites. Honors the same contract as
//! the Postgres gateway: every write is a single-row operation and the
//! status updates are compare-and-swap.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use ridepool_domain::booking::{Booking, BookingStatus, NewBooking};
use ridepool_domain::message::{Message, NewMessage};
use ridepool_domain::repository::{BookingStore, MessageStore, TripStore, UserStore};
use ridepool_domain::trip::{NewTrip, Trip, TripChanges, TripFilter, TripStatus};
use ridepool_domain::user::UserRef;
use ridepool_domain::{DomainError, DomainResult};

#[derive(Default)]
struct State {
    trips: HashMap<Uuid, Trip>,
    // Insertion-ordered so "newest first" is a reverse scan even when
    // timestamps tie within a test.
    bookings: Vec<Booking>,
    messages: Vec<Message>,
    users: HashMap<Uuid, UserRef>,
}

#[derive(Default, Clone)]
pub struct MemoryGateway {
    state: Arc<Mutex<State>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a user row (account management is outside the core).
    pub fn add_user(&self, user: UserRef) {
        let mut state = self.state.lock().unwrap();
        state.users.insert(user.id, user);
    }

    pub fn add_simple_user(&self, id: Uuid, first_name: &str) -> UserRef {
        let user = UserRef {
            id,
            first_name: first_name.to_string(),
            last_name: "Test".to_string(),
            avatar: None,
        };
        self.add_user(user.clone());
        user
    }
}

#[async_trait]
impl TripStore for MemoryGateway {
    async fn insert(&self, driver_id: Uuid, trip: NewTrip) -> DomainResult<Trip> {
        let now = Utc::now();
        let row = Trip {
            id: Uuid::new_v4(),
            driver_id,
            departure: trip.departure,
            destination: trip.destination,
            date_time: trip.date_time,
            total_seats: trip.total_seats,
            seats_available: trip.total_seats,
            price_cents: trip.price_cents,
            instant_booking: trip.instant_booking,
            description: trip.description,
            meeting_point: trip.meeting_point,
            status: TripStatus::Active,
            created_at: now,
            updated_at: now,
        };
        let mut state = self.state.lock().unwrap();
        state.trips.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Trip>> {
        Ok(self.state.lock().unwrap().trips.get(&id).cloned())
    }

    async fn update(&self, id: Uuid, changes: TripChanges) -> DomainResult<Trip> {
        let mut state = self.state.lock().unwrap();
        let trip = state
            .trips
            .get_mut(&id)
            .ok_or_else(|| DomainError::NotFound(format!("trip {id}")))?;
        if let Some(departure) = changes.departure {
            trip.departure = departure;
        }
        if let Some(destination) = changes.destination {
            trip.destination = destination;
        }
        if let Some(date_time) = changes.date_time {
            trip.date_time = date_time;
        }
        if let Some(total_seats) = changes.total_seats {
            trip.total_seats = total_seats;
        }
        if let Some(price_cents) = changes.price_cents {
            trip.price_cents = price_cents;
        }
        if let Some(instant_booking) = changes.instant_booking {
            trip.instant_booking = instant_booking;
        }
        if let Some(description) = changes.description {
            trip.description = Some(description);
        }
        if let Some(meeting_point) = changes.meeting_point {
            trip.meeting_point = Some(meeting_point);
        }
        if let Some(seats_available) = changes.seats_available {
            trip.seats_available = seats_available;
        }
        trip.updated_at = Utc::now();
        Ok(trip.clone())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<bool> {
        let mut state = self.state.lock().unwrap();
        if state.trips.remove(&id).is_none() {
            return Ok(false);
        }
        // Same cascade the schema performs.
        state.bookings.retain(|b| b.trip_id != id);
        Ok(true)
    }

    async fn search(&self, filter: TripFilter) -> DomainResult<Vec<Trip>> {
        let now = Utc::now();
        let contains = |field: &str, needle: &Option<String>| {
            needle
                .as_ref()
                .map(|n| field.to_lowercase().contains(&n.to_lowercase()))
                .unwrap_or(true)
        };
        let state = self.state.lock().unwrap();
        let mut trips: Vec<Trip> = state
            .trips
            .values()
            .filter(|t| t.status == TripStatus::Active && t.date_time >= now)
            .filter(|t| contains(&t.departure, &filter.departure))
            .filter(|t| contains(&t.destination, &filter.destination))
            .filter(|t| filter.date_from.map(|d| t.date_time >= d).unwrap_or(true))
            .filter(|t| filter.date_to.map(|d| t.date_time <= d).unwrap_or(true))
            .filter(|t| {
                filter
                    .max_price_cents
                    .map(|p| t.price_cents <= p)
                    .unwrap_or(true)
            })
            .filter(|t| {
                filter
                    .min_seats
                    .map(|s| t.seats_available >= s)
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        trips.sort_by_key(|t| t.date_time);
        Ok(trips)
    }

    async fn list_for_driver(&self, driver_id: Uuid) -> DomainResult<Vec<Trip>> {
        let state = self.state.lock().unwrap();
        let mut trips: Vec<Trip> = state
            .trips
            .values()
            .filter(|t| t.driver_id == driver_id)
            .cloned()
            .collect();
        trips.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(trips)
    }

    async fn set_seats_available(&self, id: Uuid, seats_available: i32) -> DomainResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(trip) = state.trips.get_mut(&id) {
            trip.seats_available = seats_available;
            trip.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: TripStatus,
        next: TripStatus,
    ) -> DomainResult<Trip> {
        let mut state = self.state.lock().unwrap();
        let trip = state
            .trips
            .get_mut(&id)
            .ok_or_else(|| DomainError::NotFound(format!("trip {id}")))?;
        if trip.status != expected {
            return Err(DomainError::Conflict(format!(
                "trip {id} is {} rather than {expected}",
                trip.status
            )));
        }
        trip.status = next;
        trip.updated_at = Utc::now();
        Ok(trip.clone())
    }
}

#[async_trait]
impl BookingStore for MemoryGateway {
    async fn insert(&self, booking: NewBooking, status: BookingStatus) -> DomainResult<Booking> {
        let now = Utc::now();
        let row = Booking {
            id: Uuid::new_v4(),
            trip_id: booking.trip_id,
            passenger_id: booking.passenger_id,
            seats: booking.seats,
            status,
            created_at: now,
            updated_at: now,
        };
        let mut state = self.state.lock().unwrap();
        state.bookings.push(row.clone());
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Booking>> {
        let state = self.state.lock().unwrap();
        Ok(state.bookings.iter().find(|b| b.id == id).cloned())
    }

    async fn find_active(
        &self,
        trip_id: Uuid,
        passenger_id: Uuid,
    ) -> DomainResult<Option<Booking>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .bookings
            .iter()
            .find(|b| {
                b.trip_id == trip_id && b.passenger_id == passenger_id && b.status.is_active()
            })
            .cloned())
    }

    async fn confirmed_for_trip(&self, trip_id: Uuid) -> DomainResult<Vec<Booking>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .bookings
            .iter()
            .filter(|b| b.trip_id == trip_id && b.status == BookingStatus::Confirmed)
            .cloned()
            .collect())
    }

    async fn active_for_trip(&self, trip_id: Uuid) -> DomainResult<Vec<Booking>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .bookings
            .iter()
            .filter(|b| b.trip_id == trip_id && b.status.is_active())
            .cloned()
            .collect())
    }

    async fn list_for_passenger(
        &self,
        passenger_id: Uuid,
        status: Option<BookingStatus>,
    ) -> DomainResult<Vec<Booking>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .bookings
            .iter()
            .rev()
            .filter(|b| {
                b.passenger_id == passenger_id && status.map(|s| b.status == s).unwrap_or(true)
            })
            .cloned()
            .collect())
    }

    async fn list_for_trip(&self, trip_id: Uuid) -> DomainResult<Vec<Booking>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .bookings
            .iter()
            .rev()
            .filter(|b| b.trip_id == trip_id)
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: BookingStatus,
        next: BookingStatus,
    ) -> DomainResult<Booking> {
        let mut state = self.state.lock().unwrap();
        let booking = state
            .bookings
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| DomainError::NotFound(format!("booking {id}")))?;
        if booking.status != expected {
            return Err(DomainError::Conflict(format!(
                "booking {id} is {} rather than {expected}",
                booking.status
            )));
        }
        booking.status = next;
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }
}

#[async_trait]
impl MessageStore for MemoryGateway {
    async fn insert(&self, message: NewMessage) -> DomainResult<Message> {
        let row = Message {
            id: Uuid::new_v4(),
            sender_id: message.sender_id,
            recipient_id: message.recipient_id,
            body: message.body,
            read: false,
            created_at: Utc::now(),
        };
        let mut state = self.state.lock().unwrap();
        state.messages.push(row.clone());
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Message>> {
        let state = self.state.lock().unwrap();
        Ok(state.messages.iter().find(|m| m.id == id).cloned())
    }

    async fn between(&self, a: Uuid, b: Uuid) -> DomainResult<Vec<Message>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .messages
            .iter()
            .filter(|m| {
                (m.sender_id == a && m.recipient_id == b)
                    || (m.sender_id == b && m.recipient_id == a)
            })
            .cloned()
            .collect())
    }

    async fn for_user(&self, user_id: Uuid) -> DomainResult<Vec<Message>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .messages
            .iter()
            .rev()
            .filter(|m| m.sender_id == user_id || m.recipient_id == user_id)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, id: Uuid) -> DomainResult<bool> {
        let mut state = self.state.lock().unwrap();
        match state.messages.iter_mut().find(|m| m.id == id) {
            Some(message) if !message.read => {
                message.read = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_conversation_read(
        &self,
        sender_id: Uuid,
        recipient_id: Uuid,
    ) -> DomainResult<Vec<Uuid>> {
        let mut state = self.state.lock().unwrap();
        let mut affected = Vec::new();
        for message in state.messages.iter_mut() {
            if message.sender_id == sender_id && message.recipient_id == recipient_id && !message.read
            {
                message.read = true;
                affected.push(message.id);
            }
        }
        Ok(affected)
    }

    async fn delete(&self, id: Uuid) -> DomainResult<bool> {
        let mut state = self.state.lock().unwrap();
        let before = state.messages.len();
        state.messages.retain(|m| m.id != id);
        Ok(state.messages.len() < before)
    }
}

#[async_trait]
impl UserStore for MemoryGateway {
    async fn get(&self, id: Uuid) -> DomainResult<Option<UserRef>> {
        Ok(self.state.lock().unwrap().users.get(&id).cloned())
    }
}
