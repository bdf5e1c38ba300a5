use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use murmur_core::Identity;
use murmur_types::api::{EditMessageRequest, ForwardMessageRequest, MessagePage};
use murmur_types::payload::OutgoingMessage;

use crate::conversations::SearchQuery;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn get_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Query(page): Query<MessagePage>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = state
        .run(identity, move |s| s.messages().list(conversation_id, page))
        .await?;
    Ok(Json(messages))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<OutgoingMessage>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .run(identity, move |s| s.messages().send(conversation_id, req))
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn search_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<SearchQuery>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let hits = state
        .run(identity, move |s| s.messages().search(conversation_id, &query.q))
        .await?;
    Ok(Json(hits))
}

pub async fn pinned_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let pinned = state
        .run(identity, move |s| s.messages().pinned(conversation_id))
        .await?;
    Ok(Json(pinned))
}

pub async fn get_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let resolved = state.run(identity, move |s| s.messages().get(message_id)).await?;
    Ok(Json(resolved))
}

pub async fn edit_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<EditMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .run(identity, move |s| s.messages().edit(message_id, &req.content))
        .await?;
    Ok(Json(view))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    state.run(identity, move |s| s.messages().soft_delete(message_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn forward_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<ForwardMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .run(identity, move |s| s.messages().forward(message_id, req.target_conversation_id))
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn pin_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    state.run(identity, move |s| s.messages().pin(message_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unpin_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    state.run(identity, move |s| s.messages().unpin(message_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
