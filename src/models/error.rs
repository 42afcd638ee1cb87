use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Response for an error
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: u16,
    pub status: String,
    pub error: String,
}

impl ErrorResponse {
    pub fn with_status(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
        (status, Json(ErrorResponse {
            code: status.as_u16(),
            status: status.to_string(),
            error: error.into(),
        }))
    }
}

/// Failures of a single collaborative operation.
///
/// Every variant is local to the session that triggered it; the gateway
/// reports it back as an `error` message and never fans it out.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("File '{0}' is not a text file")]
    UnsupportedFile(String),

    #[error("Corrupt update for file '{file_id}': {reason}")]
    CorruptUpdate { file_id: String, reason: String },

    #[error("Failed to persist file '{file_id}': {reason}")]
    PersistenceFailure { file_id: String, reason: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl SyncError {
    /// HTTP status used when the error escapes through the REST surface.
    pub fn status_code(&self) -> StatusCode {
        match self {
            SyncError::Auth(_) => StatusCode::UNAUTHORIZED,
            SyncError::Unauthorized => StatusCode::FORBIDDEN,
            SyncError::UnsupportedFile(_) | SyncError::CorruptUpdate { .. } => StatusCode::BAD_REQUEST,
            SyncError::NotFound(_) => StatusCode::NOT_FOUND,
            SyncError::Upstream(_) => StatusCode::BAD_GATEWAY,
            SyncError::PersistenceFailure { .. } | SyncError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text safe to hand to a client. Storage paths and upstream URLs stay in the server log.
    pub fn client_message(&self) -> String {
        match self {
            SyncError::Storage(_) => "Storage error".to_string(),
            SyncError::Upstream(_) => "Upstream service unavailable".to_string(),
            SyncError::PersistenceFailure { file_id, .. } => format!("Failed to persist file '{}'", file_id),
            other => other.to_string(),
        }
    }
}

impl From<SyncError> for (StatusCode, Json<ErrorResponse>) {
    fn from(err: SyncError) -> Self {
        ErrorResponse::with_status(err.status_code(), err.client_message())
    }
}
