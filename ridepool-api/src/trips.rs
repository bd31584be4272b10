use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use uuid::Uuid;

use ridepool_domain::trip::{NewTrip, Trip, TripChanges, TripFilter};

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/trips", post(create_trip).get(search_trips))
        .route("/v1/trips/mine", get(my_trips))
        .route(
            "/v1/trips/{id}",
            get(get_trip).patch(update_trip).delete(delete_trip),
        )
        .route("/v1/trips/{id}/cancel", post(cancel_trip))
}

async fn create_trip(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(req): Json<NewTrip>,
) -> Result<(StatusCode, Json<Trip>), AppError> {
    let trip = state.trips.create(user_id, req).await?;
    Ok((StatusCode::CREATED, Json(trip)))
}

async fn get_trip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(state.trips.get(id).await?))
}

async fn cancel_trip(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(state.trips.cancel(user_id, id).await?))
}

async fn search_trips(
    State(state): State<AppState>,
    Query(filter): Query<TripFilter>,
) -> Result<Json<Vec<Trip>>, AppError> {
    Ok(Json(state.trips.search(filter).await?))
}

async fn my_trips(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<Vec<Trip>>, AppError> {
    Ok(Json(state.trips.list_for_driver(user_id).await?))
}

async fn update_trip(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(changes): Json<TripChanges>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(state.trips.update(user_id, id, changes).await?))
}

async fn delete_trip(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.trips.delete(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
