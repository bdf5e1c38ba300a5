use axum::{Extension, Json, extract::State, response::IntoResponse};

use murmur_core::Identity;
use murmur_types::api::UpsertProfileRequest;

use crate::error::ApiError;
use crate::state::AppState;

/// Provisions or refreshes the caller's own profile row.
pub async fn upsert_own_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<UpsertProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .run(identity, move |s| {
            s.upsert_profile(req.display_name.as_deref(), req.handle.as_deref(), req.avatar_ref.as_deref())
        })
        .await?;
    Ok(Json(profile))
}
