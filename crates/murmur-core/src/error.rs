use murmur_types::payload::PayloadError;

pub type Result<T> = std::result::Result<T, ChatError>;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("not authenticated")]
    Unauthenticated,
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("conflict: {0}")]
    Conflict(&'static str),
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("store unavailable")]
    StoreUnavailable(#[from] anyhow::Error),
}

impl ChatError {
    /// Stable machine-readable name, used as the `error` field over HTTP.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Invalid(_) => "invalid",
            Self::StoreUnavailable(_) => "store_unavailable",
        }
    }

    /// Only store failures are worth retrying; every other error is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<PayloadError> for ChatError {
    fn from(err: PayloadError) -> Self {
        Self::Invalid(err.to_string())
    }
}
