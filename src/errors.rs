use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::{fmt, io};
use thiserror::Error;

use crate::db::RepositoryError;

/// Failure of an outbound call, classified at the point the call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The request went out but nothing usable came back.
    #[error("no response received: {0}")]
    NetworkUnavailable(String),

    /// The remote answered with a non-2xx status (or an unusable 2xx body).
    #[error("remote responded with {status}: {payload}")]
    RemoteRejected { status: u16, payload: String },

    /// The request could not be assembled locally.
    #[error("request setup failed: {0}")]
    RequestMalformed(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            return RemoteError::RequestMalformed(err.to_string());
        }
        match err.status() {
            Some(status) => RemoteError::RemoteRejected {
                status: status.as_u16(),
                payload: err.to_string(),
            },
            None => RemoteError::NetworkUnavailable(err.to_string()),
        }
    }
}

/// Errors surfaced by the storage pipeline (authorize, presign, upload, delete).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("storage authorization returned no S3 endpoint")]
    StorageUnavailable,
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StorageError::Remote(RemoteError::RequestMalformed(format!(
            "reading local media: {err}"
        )))
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "not authenticated")
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(_) => AppError::new(StatusCode::CONFLICT, err.to_string()),
            RepositoryError::Sqlx(_) => {
                tracing::error!(error = %err, "datastore failure");
                AppError::internal("datastore failure")
            }
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        tracing::error!(error = %err, "remote service failure");
        AppError::new(StatusCode::BAD_GATEWAY, "remote service failure")
    }
}

impl From<RemoteError> for AppError {
    fn from(err: RemoteError) -> Self {
        StorageError::Remote(err).into()
    }
}
