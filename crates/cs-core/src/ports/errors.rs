use thiserror::Error;

/// Marker the server puts in a 403 body when the account is out of storage.
pub const STORAGE_LIMIT_MARKER: &str = "storage_limit";

/// Failure of a remote API call, classified for the engine's policy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    /// 409: the server already has this entry.
    #[error("entry already exists on the server")]
    Conflict,

    #[error("authentication expired")]
    Unauthorized,

    #[error("storage limit reached")]
    StorageLimit,

    #[error("not found")]
    NotFound,

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The request could not be built from local state.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 => ApiError::Unauthorized,
            403 if body.to_ascii_lowercase().contains(STORAGE_LIMIT_MARKER) => {
                ApiError::StorageLimit
            }
            404 => ApiError::NotFound,
            409 => ApiError::Conflict,
            _ => ApiError::Server {
                status,
                message: body.chars().take(200).collect(),
            },
        }
    }

    /// Errors worth a later retry.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Timeout | ApiError::Network(_) => true,
            ApiError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Errors that need the user to act and are surfaced to the host.
    pub fn requires_attention(&self) -> bool {
        matches!(self, ApiError::Unauthorized | ApiError::StorageLimit)
    }
}

#[derive(Debug, Error)]
pub enum AppDirsError {
    #[error("platform data directory is unavailable")]
    DataLocalDirUnavailable,
}
