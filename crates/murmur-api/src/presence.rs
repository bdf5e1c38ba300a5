use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use murmur_core::Identity;
use murmur_types::api::{PresenceLookupRequest, UpdatePresenceRequest};

use crate::error::ApiError;
use crate::state::AppState;

/// Heartbeat for the caller's own status. Clients repeat it while active.
pub async fn update_presence(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<UpdatePresenceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let presence = state
        .run(identity, move |s| s.presence().update(req.is_online))
        .await?;
    Ok(Json(presence))
}

pub async fn get_presence(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let presence = state.run(identity, move |s| s.presence().of(user_id)).await?;
    Ok(Json(presence))
}

pub async fn lookup_presence(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<PresenceLookupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let presence = state
        .run(identity, move |s| s.presence().of_many(&req.user_ids))
        .await?;
    Ok(Json(presence))
}
