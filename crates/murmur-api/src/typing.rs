use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use murmur_core::Identity;
use murmur_types::api::SetTypingRequest;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn set_typing(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<SetTypingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .run(identity, move |s| s.typing().set_typing(conversation_id, req.is_typing))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn currently_typing(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state
        .run(identity, move |s| s.typing().currently_typing(conversation_id))
        .await?;
    Ok(Json(users))
}
