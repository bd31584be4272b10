use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use ridepool_domain::booking::{Booking, BookingStatus};

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking).get(my_bookings))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/status", post(update_status))
        .route("/v1/trips/{id}/bookings", get(trip_bookings))
}

#[derive(Debug, Deserialize)]
struct CreateBookingRequest {
    trip_id: Uuid,
    #[serde(default = "default_seats")]
    seats: i32,
}

fn default_seats() -> i32 {
    1
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state
        .bookings
        .create(user_id, req.trip_id, req.seats)
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

#[derive(Debug, Deserialize)]
struct StatusRequest {
    status: BookingStatus,
}

async fn update_status(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.bookings.update_status(user_id, id, req.status).await?;
    Ok(Json(booking))
}

async fn get_booking(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.get(user_id, id).await?))
}

#[derive(Debug, Deserialize)]
struct BookingFilter {
    status: Option<BookingStatus>,
}

async fn my_bookings(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Query(filter): Query<BookingFilter>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(
        state
            .bookings
            .list_for_passenger(user_id, filter.status)
            .await?,
    ))
}

async fn trip_bookings(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.list_for_trip(user_id, id).await?))
}
