//! Error types shared by the stores and the HTTP layer

use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// The client sent something we cannot turn into a [`TodoItem`](crate::TodoItem)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("All fields are required")]
    MissingFields,

    #[error("Invalid date format")]
    InvalidDate(String),

    #[error("Invalid or empty todos array")]
    EmptyBatch,

    #[error("{0} is required")]
    MissingParameter(&'static str),

    #[error("Malformed payload")]
    MalformedPayload,

    /// Ids starting with an underscore are reserved by the database
    #[error("Invalid id")]
    ReservedId(String),
}

/// Something went wrong while reading or writing the backing medium
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unable to (de)serialize the collection: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("HTTP request to the database failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status code {status} from the database: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// Every error a request handler can end with
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Storage(err) => {
                log::error!("Storage error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            },
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        let resp = AppError::from(ValidationError::MissingFields).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = AppError::Unauthorized.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let resp = AppError::from(StorageError::io("database.json", io)).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
