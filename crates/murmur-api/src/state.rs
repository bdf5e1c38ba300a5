use std::sync::Arc;

use tracing::error;

use murmur_core::{Chat, Identity, Session};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub chat: Chat,
    pub jwt_secret: String,
}

impl AppStateInner {
    /// Runs one core operation for `identity` on the blocking pool. Every
    /// store call is synchronous, so none of them may run on the async runtime.
    pub async fn run<T, F>(self: &Arc<Self>, identity: Identity, op: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(Session<'_>) -> murmur_core::Result<T> + Send + 'static,
    {
        let state = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            let session = state.chat.session(&identity)?;
            op(session)
        })
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(ApiError::from)
    }
}
