use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("No such Profile.")]
    NotFound,

    #[error("No profiles found for this company.")]
    NoResults,

    #[error("Index {index} is out of range for a pipeline of length {len}.")]
    InvalidIndex { index: usize, len: usize },

    #[error("Index is required.")]
    MissingIndex,

    #[error("Experience {0} must not be empty.")]
    InvalidExperience(&'static str),

    #[error("Malformed payload")]
    MalformedPayload,

    #[error("Unauthorized.")]
    Unauthorized,

    #[error("Profile was modified concurrently, try again.")]
    Conflict,

    #[error("Internal error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("meilisearch: {0}")]
    Meili(#[from] meilisearch_sdk::errors::Error),

    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("corrupt profile document {0}")]
    Corrupt(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::NotFound | AppError::NoResults => StatusCode::NOT_FOUND,
            AppError::InvalidIndex { .. }
            | AppError::MissingIndex
            | AppError::InvalidExperience(_)
            | AppError::MalformedPayload => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Conflict => StatusCode::CONFLICT,
            AppError::Store(ref e) => {
                error!("Store failure: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
