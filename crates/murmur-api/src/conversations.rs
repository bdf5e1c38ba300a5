use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use murmur_core::Identity;
use murmur_types::api::{
    AddParticipantRequest, CreateDirectRequest, CreateGroupRequest, MuteRequest, UpdateConversationRequest,
};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let list = state.run(identity, |s| s.conversations().list_for_caller()).await?;
    Ok(Json(list))
}

pub async fn search_conversations(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let hits = state
        .run(identity, move |s| s.conversations().search(&query.q))
        .await?;
    Ok(Json(hits))
}

/// Idempotent: returns the existing conversation when there is one.
pub async fn create_direct(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateDirectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation = state
        .run(identity, move |s| s.conversations().create_direct(req.peer_id))
        .await?;
    Ok(Json(conversation))
}

pub async fn create_group(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation = state
        .run(identity, move |s| {
            s.conversations()
                .create_group(req.name.as_deref(), req.avatar_ref.as_deref(), &req.member_ids)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state
        .run(identity, move |s| s.conversations().get(conversation_id))
        .await?;
    Ok(Json(detail))
}

pub async fn update_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<UpdateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation = state
        .run(identity, move |s| {
            s.conversations()
                .update_metadata(conversation_id, req.name.as_deref(), req.avatar_ref.as_deref())
        })
        .await?;
    Ok(Json(conversation))
}

pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .run(identity, move |s| s.conversations().delete(conversation_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_participant(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<AddParticipantRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .run(identity, move |s| s.conversations().add_participant(conversation_id, req.user_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_participant(
    State(state): State<AppState>,
    Path((conversation_id, user_id)): Path<(Uuid, Uuid)>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .run(identity, move |s| s.conversations().remove_participant(conversation_id, user_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mute(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<MuteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .run(identity, move |s| s.conversations().mute(conversation_id, req.until))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
