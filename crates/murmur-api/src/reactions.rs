use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use murmur_core::Identity;
use murmur_types::api::{ToggleOutcome, ToggleReactionRequest};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn toggle_reaction(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<ToggleReactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .run(identity, move |s| s.reactions().toggle(message_id, &req.emoji))
        .await?;
    Ok(Json(json!({ "outcome": outcome, "added": outcome == ToggleOutcome::Added })))
}

pub async fn list_reactions(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let reactions = state.run(identity, move |s| s.reactions().list(message_id)).await?;
    Ok(Json(reactions))
}
