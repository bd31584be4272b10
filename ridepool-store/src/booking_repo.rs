use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use ridepool_domain::booking::{Booking, BookingStatus, NewBooking};
use ridepool_domain::repository::BookingStore;
use ridepool_domain::{DomainError, DomainResult};

use crate::{parse_err, storage_err};

pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    trip_id: Uuid,
    passenger_id: Uuid,
    seats: i32,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = DomainError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            trip_id: row.trip_id,
            passenger_id: row.passenger_id,
            seats: row.seats,
            status: row.status.parse().map_err(parse_err)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_bookings(rows: Vec<BookingRow>) -> DomainResult<Vec<Booking>> {
    rows.into_iter().map(Booking::try_from).collect()
}

const BOOKING_COLUMNS: &str =
    "id, trip_id, passenger_id, seats, status, created_at, updated_at";

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn insert(&self, booking: NewBooking, status: BookingStatus) -> DomainResult<Booking> {
        let sql = format!(
            "INSERT INTO bookings (id, trip_id, passenger_id, seats, status) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {BOOKING_COLUMNS}"
        );
        let row: BookingRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(booking.trip_id)
            .bind(booking.passenger_id)
            .bind(booking.seats)
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;

        row.try_into()
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Booking>> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1");
        let row: Option<BookingRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.map(Booking::try_from).transpose()
    }

    async fn find_active(
        &self,
        trip_id: Uuid,
        passenger_id: Uuid,
    ) -> DomainResult<Option<Booking>> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE trip_id = $1 AND passenger_id = $2 AND status IN ('pending', 'confirmed') \
             LIMIT 1"
        );
        let row: Option<BookingRow> = sqlx::query_as(&sql)
            .bind(trip_id)
            .bind(passenger_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.map(Booking::try_from).transpose()
    }

    async fn confirmed_for_trip(&self, trip_id: Uuid) -> DomainResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE trip_id = $1 AND status = 'confirmed'"
        );
        let rows: Vec<BookingRow> = sqlx::query_as(&sql)
            .bind(trip_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        into_bookings(rows)
    }

    async fn active_for_trip(&self, trip_id: Uuid) -> DomainResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE trip_id = $1 AND status IN ('pending', 'confirmed')"
        );
        let rows: Vec<BookingRow> = sqlx::query_as(&sql)
            .bind(trip_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        into_bookings(rows)
    }

    async fn list_for_passenger(
        &self,
        passenger_id: Uuid,
        status: Option<BookingStatus>,
    ) -> DomainResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {BOOKING_COLUMNS} FROM bookings \
                     WHERE passenger_id = $1 AND status = $2 ORDER BY created_at DESC"
                );
                sqlx::query_as(&sql)
                    .bind(passenger_id)
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await
                    .map_err(storage_err)?
            }
            None => {
                let sql = format!(
                    "SELECT {BOOKING_COLUMNS} FROM bookings \
                     WHERE passenger_id = $1 ORDER BY created_at DESC"
                );
                sqlx::query_as(&sql)
                    .bind(passenger_id)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(storage_err)?
            }
        };

        into_bookings(rows)
    }

    async fn list_for_trip(&self, trip_id: Uuid) -> DomainResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE trip_id = $1 ORDER BY created_at DESC"
        );
        let rows: Vec<BookingRow> = sqlx::query_as(&sql)
            .bind(trip_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        into_bookings(rows)
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: BookingStatus,
        next: BookingStatus,
    ) -> DomainResult<Booking> {
        // Compare-and-swap on the prior status; a losing concurrent writer
        // observes a failed precondition instead of double-writing.
        let sql = format!(
            "UPDATE bookings SET status = $3, updated_at = now() \
             WHERE id = $1 AND status = $2 RETURNING {BOOKING_COLUMNS}"
        );
        let row: Option<BookingRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(expected.as_str())
            .bind(next.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        match row {
            Some(row) => row.try_into(),
            None => match self.get(id).await? {
                Some(booking) => Err(DomainError::Conflict(format!(
                    "booking {id} is {} rather than {expected}",
                    booking.status
                ))),
                None => Err(DomainError::NotFound(format!("booking {id}"))),
            },
        }
    }
}
