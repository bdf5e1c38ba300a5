use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use murmur_core::Identity;
use murmur_types::api::{MarkReadResponse, ReadByResponse, UnreadCountResponse};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn mark_read(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let marked = state
        .run(identity, move |s| s.receipts().mark_read(conversation_id))
        .await?;
    Ok(Json(MarkReadResponse { marked }))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let unread_count = state
        .run(identity, move |s| s.receipts().unread_count(conversation_id))
        .await?;
    Ok(Json(UnreadCountResponse { unread_count }))
}

pub async fn read_by(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let user_ids = state.run(identity, move |s| s.receipts().read_by(message_id)).await?;
    Ok(Json(ReadByResponse { user_ids }))
}
