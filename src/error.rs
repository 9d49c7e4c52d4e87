// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::ai::AiError;
use crate::store::StoreError;

/// Errors reported to callers of the core operations.
///
/// Each variant maps to a stable numeric code; internal causes are logged
/// where they are converted and never returned to the client.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("param missing")]
    ParamMissing,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error")]
    Internal(String),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn invalid(message: impl Into<String>) -> Self {
        AppError::InvalidArgument(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn internal(cause: impl std::fmt::Display) -> Self {
        AppError::Internal(cause.to_string())
    }

    /// Stable error code category
    pub fn code(&self) -> i32 {
        match self {
            AppError::Internal(_) => 10000,
            AppError::ParamMissing => 20001,
            AppError::InvalidArgument(_) => 20002,
            AppError::NotFound(_) => 20004,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ParamMissing | AppError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFound(what),
            other => {
                error!("Store error: {}", other);
                AppError::Internal(other.to_string())
            }
        }
    }
}

impl From<AiError> for AppError {
    fn from(err: AiError) -> Self {
        error!("AI completion error: {}", err);
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "success": false,
            "code": self.code(),
            "error": self.to_string(),
        });

        (self.status(), axum::Json(body)).into_response()
    }
}
