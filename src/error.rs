//! Unified error handling with HTTP status mapping.
//!
//! Gateway and store failures map to 500 with a generic body; their internal
//! detail is logged server-side and never echoed to callers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

use crate::gateway::GatewayError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Gateway(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the caller.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(message) => message.clone(),
            AppError::Unauthorized(message) => message.clone(),
            AppError::NotFound(message) => message.clone(),
            AppError::Gateway(_) => "payment gateway request failed".to_string(),
            AppError::Store(_) => "internal storage error".to_string(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound("transaction not found".to_string()),
            other => AppError::Store(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = Json(serde_json::json!({ "error": self.public_message() }));
        (status, body).into_response()
    }
}
