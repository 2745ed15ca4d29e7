//! Error types for the reading source, history store, queries and HTTP layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::models::{DateKey, DateKeyError};

// ---

/// Failure to obtain a reading. Distinct from "no data yet".
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("device returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("failed to parse device response: {0}")]
    Decode(String),
}

/// Failure to run a history query. An empty day is not an error.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("device returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("failed to parse history response: {0}")]
    Decode(String),
}

/// Failure to read or write the key-value blob store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("{date} is older than the retention window (oldest kept: {cutoff})")]
    OutsideRetention { date: DateKey, cutoff: DateKey },
}

/// Error from the history popup.
#[derive(Debug, thiserror::Error)]
pub enum PopupError {
    #[error("history popup is not open")]
    Closed,

    #[error(transparent)]
    Query(#[from] QueryError),
}

/// A poll interval of zero was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("poll interval must be a positive number of seconds")]
pub struct InvalidInterval;

/// Error surfaced by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<PopupError> for AppError {
    fn from(e: PopupError) -> Self {
        match e {
            PopupError::Closed => AppError::Conflict(PopupError::Closed.to_string()),
            PopupError::Query(q) => q.into(),
        }
    }
}

impl From<InvalidInterval> for AppError {
    fn from(e: InvalidInterval) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl From<DateKeyError> for AppError {
    fn from(e: DateKeyError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl From<QueryError> for AppError {
    fn from(e: QueryError) -> Self {
        AppError::Upstream(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // ---
        let (status, error_message) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Upstream(msg) => {
                tracing::error!("Upstream error: {msg}");
                (StatusCode::BAD_GATEWAY, format!("Upstream error: {msg}"))
            }
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
