use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use murmur_core::ChatError;

/// Error returned by every handler. Renders as
/// `{ "error": kind, "message": text, "retryable": bool }`.
#[derive(Debug)]
pub enum ApiError {
    Chat(ChatError),
    /// The blocking task running the operation panicked or was cancelled.
    Internal,
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        Self::Chat(err)
    }
}

pub(crate) fn status_for(err: &ChatError) -> StatusCode {
    match err {
        ChatError::Unauthenticated => StatusCode::UNAUTHORIZED,
        ChatError::Forbidden(_) => StatusCode::FORBIDDEN,
        ChatError::NotFound(_) => StatusCode::NOT_FOUND,
        ChatError::Conflict(_) => StatusCode::CONFLICT,
        ChatError::Invalid(_) => StatusCode::BAD_REQUEST,
        ChatError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message, retryable) = match &self {
            ApiError::Chat(err @ ChatError::StoreUnavailable(source)) => {
                error!("Store failure: {:#}", source);
                (status_for(err), err.kind(), "storage is temporarily unavailable".to_string(), true)
            }
            ApiError::Chat(err) => (status_for(err), err.kind(), err.to_string(), err.is_retryable()),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "internal server error".to_string(),
                false,
            ),
        };

        (status, Json(json!({ "error": kind, "message": message, "retryable": retryable }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_errors_map_to_statuses() {
        assert_eq!(status_for(&ChatError::Unauthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(&ChatError::Forbidden("x")), StatusCode::FORBIDDEN);
        assert_eq!(status_for(&ChatError::NotFound("x")), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&ChatError::Conflict("x")), StatusCode::CONFLICT);
        assert_eq!(status_for(&ChatError::Invalid("x".into())), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn store_failures_hide_details() {
        let err = ApiError::from(ChatError::StoreUnavailable(anyhow::anyhow!("database is locked")));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
