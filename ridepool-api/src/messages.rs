use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ridepool_core::messaging::ConversationSummary;
use ridepool_domain::message::Message;
use ridepool_domain::user::UserRef;

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/messages", post(send_message))
        .route("/v1/messages/{id}/read", post(mark_read))
        .route("/v1/messages/{id}", delete(delete_message))
        .route("/v1/conversations", get(list_conversations))
        .route("/v1/conversations/{user_id}", get(open_conversation))
}

#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    recipient_id: Uuid,
    body: String,
}

async fn send_message(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    let message = state
        .messages
        .send(user_id, req.recipient_id, req.body)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn list_conversations(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<Vec<ConversationSummary>>, AppError> {
    Ok(Json(state.messages.conversations(user_id).await?))
}

#[derive(Debug, Serialize)]
struct ConversationResponse {
    user: UserRef,
    messages: Vec<Message>,
}

async fn open_conversation(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(other_id): Path<Uuid>,
) -> Result<Json<ConversationResponse>, AppError> {
    let (user, messages) = state.messages.open(user_id, other_id).await?;
    Ok(Json(ConversationResponse { user, messages }))
}

async fn mark_read(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.messages.mark_read(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_message(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.messages.delete(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
