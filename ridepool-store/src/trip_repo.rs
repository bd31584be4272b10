use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use ridepool_domain::repository::TripStore;
use ridepool_domain::trip::{NewTrip, Trip, TripChanges, TripFilter, TripStatus};
use ridepool_domain::{DomainError, DomainResult};

use crate::{parse_err, storage_err};

pub struct PgTripStore {
    pool: PgPool,
}

impl PgTripStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TripRow {
    id: Uuid,
    driver_id: Uuid,
    departure: String,
    destination: String,
    date_time: DateTime<Utc>,
    total_seats: i32,
    seats_available: i32,
    price_cents: i32,
    instant_booking: bool,
    description: Option<String>,
    meeting_point: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TripRow> for Trip {
    type Error = DomainError;

    fn try_from(row: TripRow) -> Result<Self, Self::Error> {
        Ok(Trip {
            id: row.id,
            driver_id: row.driver_id,
            departure: row.departure,
            destination: row.destination,
            date_time: row.date_time,
            total_seats: row.total_seats,
            seats_available: row.seats_available,
            price_cents: row.price_cents,
            instant_booking: row.instant_booking,
            description: row.description,
            meeting_point: row.meeting_point,
            status: row.status.parse().map_err(parse_err)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const TRIP_COLUMNS: &str = "id, driver_id, departure, destination, date_time, total_seats, \
     seats_available, price_cents, instant_booking, description, meeting_point, status, \
     created_at, updated_at";

#[async_trait]
impl TripStore for PgTripStore {
    async fn insert(&self, driver_id: Uuid, trip: NewTrip) -> DomainResult<Trip> {
        let sql = format!(
            "INSERT INTO trips (id, driver_id, departure, destination, date_time, total_seats, \
             seats_available, price_cents, instant_booking, description, meeting_point, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $6, $7, $8, $9, $10, 'active') \
             RETURNING {TRIP_COLUMNS}"
        );
        let row: TripRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(driver_id)
            .bind(&trip.departure)
            .bind(&trip.destination)
            .bind(trip.date_time)
            .bind(trip.total_seats)
            .bind(trip.price_cents)
            .bind(trip.instant_booking)
            .bind(&trip.description)
            .bind(&trip.meeting_point)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;

        row.try_into()
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Trip>> {
        let sql = format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1");
        let row: Option<TripRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.map(Trip::try_from).transpose()
    }

    async fn update(&self, id: Uuid, changes: TripChanges) -> DomainResult<Trip> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE trips SET updated_at = now()");
        if let Some(departure) = changes.departure {
            qb.push(", departure = ").push_bind(departure);
        }
        if let Some(destination) = changes.destination {
            qb.push(", destination = ").push_bind(destination);
        }
        if let Some(date_time) = changes.date_time {
            qb.push(", date_time = ").push_bind(date_time);
        }
        if let Some(total_seats) = changes.total_seats {
            qb.push(", total_seats = ").push_bind(total_seats);
        }
        if let Some(price_cents) = changes.price_cents {
            qb.push(", price_cents = ").push_bind(price_cents);
        }
        if let Some(instant_booking) = changes.instant_booking {
            qb.push(", instant_booking = ").push_bind(instant_booking);
        }
        if let Some(description) = changes.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(meeting_point) = changes.meeting_point {
            qb.push(", meeting_point = ").push_bind(meeting_point);
        }
        if let Some(seats_available) = changes.seats_available {
            qb.push(", seats_available = ").push_bind(seats_available);
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(format!(" RETURNING {TRIP_COLUMNS}"));

        let row: Option<TripRow> = qb
            .build_query_as()
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        match row {
            Some(row) => row.try_into(),
            None => Err(DomainError::NotFound(format!("trip {id}"))),
        }
    }

    async fn delete(&self, id: Uuid) -> DomainResult<bool> {
        // Bookings go with the trip via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM trips WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn search(&self, filter: TripFilter) -> DomainResult<Vec<Trip>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE status = 'active' AND date_time >= "
        ));
        qb.push_bind(Utc::now());
        if let Some(departure) = &filter.departure {
            qb.push(" AND departure ILIKE ")
                .push_bind(format!("%{departure}%"));
        }
        if let Some(destination) = &filter.destination {
            qb.push(" AND destination ILIKE ")
                .push_bind(format!("%{destination}%"));
        }
        if let Some(date_from) = filter.date_from {
            qb.push(" AND date_time >= ").push_bind(date_from);
        }
        if let Some(date_to) = filter.date_to {
            qb.push(" AND date_time <= ").push_bind(date_to);
        }
        if let Some(max_price) = filter.max_price_cents {
            qb.push(" AND price_cents <= ").push_bind(max_price);
        }
        if let Some(min_seats) = filter.min_seats {
            qb.push(" AND seats_available >= ").push_bind(min_seats);
        }
        qb.push(" ORDER BY date_time ASC");

        let rows: Vec<TripRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        rows.into_iter().map(Trip::try_from).collect()
    }

    async fn list_for_driver(&self, driver_id: Uuid) -> DomainResult<Vec<Trip>> {
        let sql = format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE driver_id = $1 ORDER BY created_at DESC"
        );
        let rows: Vec<TripRow> = sqlx::query_as(&sql)
            .bind(driver_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        rows.into_iter().map(Trip::try_from).collect()
    }

    async fn set_seats_available(&self, id: Uuid, seats_available: i32) -> DomainResult<()> {
        sqlx::query("UPDATE trips SET seats_available = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(seats_available)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: TripStatus,
        next: TripStatus,
    ) -> DomainResult<Trip> {
        // Single-row conditional write: lands only if the row is still in
        // the expected status.
        let sql = format!(
            "UPDATE trips SET status = $3, updated_at = now() \
             WHERE id = $1 AND status = $2 RETURNING {TRIP_COLUMNS}"
        );
        let row: Option<TripRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(expected.as_str())
            .bind(next.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        match row {
            Some(row) => row.try_into(),
            None => match self.get(id).await? {
                Some(trip) => Err(DomainError::Conflict(format!(
                    "trip {id} is {} rather than {expected}",
                    trip.status
                ))),
                None => Err(DomainError::NotFound(format!("trip {id}"))),
            },
        }
    }
}
