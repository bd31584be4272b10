use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub departure: String,
    pub destination: String,
    pub date_time: DateTime<Utc>,
    pub total_seats: i32,
    /// Derived convenience field: total_seats minus confirmed seats.
    pub seats_available: i32,
    pub price_cents: i32,
    pub instant_booking: bool,
    pub description: Option<String>,
    pub meeting_point: Option<String>,
    pub status: TripStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    Active,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Active => "active",
            TripStatus::Completed => "completed",
            TripStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for TripStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TripStatus::Active),
            "completed" => Ok(TripStatus::Completed),
            "cancelled" => Ok(TripStatus::Cancelled),
            other => Err(format!("unknown trip status: {other}")),
        }
    }
}

impl std::fmt::Display for TripStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields a driver supplies when publishing a trip.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTrip {
    pub departure: String,
    pub destination: String,
    pub date_time: DateTime<Utc>,
    pub total_seats: i32,
    pub price_cents: i32,
    #[serde(default)]
    pub instant_booking: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub meeting_point: Option<String>,
}

/// Partial edit of a published trip; absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TripChanges {
    pub departure: Option<String>,
    pub destination: Option<String>,
    pub date_time: Option<DateTime<Utc>>,
    pub total_seats: Option<i32>,
    pub price_cents: Option<i32>,
    pub instant_booking: Option<bool>,
    pub description: Option<String>,
    pub meeting_point: Option<String>,
    /// Recomputed by the service when `total_seats` changes; never taken
    /// from the request body.
    #[serde(skip)]
    pub seats_available: Option<i32>,
}

impl TripChanges {
    pub fn is_empty(&self) -> bool {
        self.departure.is_none()
            && self.destination.is_none()
            && self.date_time.is_none()
            && self.total_seats.is_none()
            && self.price_cents.is_none()
            && self.instant_booking.is_none()
            && self.description.is_none()
            && self.meeting_point.is_none()
    }
}

/// Search filter for the public trip listing. Only active trips departing
/// in the future are ever returned.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TripFilter {
    pub departure: Option<String>,
    pub destination: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub max_price_cents: Option<i32>,
    pub min_seats: Option<i32>,
}
