use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::{StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Too many requests, please try again later")]
    RateLimited { retry_after: u64 },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = self.to_string();

        match self {
            AppError::Store(e) => {
                error!("Store failure: {e}");

                (status, Json(json!({ "error": "Internal server error" }))).into_response()
            }
            AppError::RateLimited { retry_after } => (
                status,
                [(RETRY_AFTER, retry_after.to_string())],
                Json(json!({ "error": message })),
            )
                .into_response(),
            _ => {
                debug!("Rejected request ({status}): {message}");

                (status, Json(json!({ "error": message }))).into_response()
            }
        }
    }
}
