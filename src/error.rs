use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::database::DatabaseError;

/// Failure reported by the forecast source, status and body kept verbatim.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("upstream returned {status}: {message}")]
pub struct UpstreamError {
    pub status: u16,
    pub message: String,
}

impl UpstreamError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn malformed(err: serde_json::Error) -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY.as_u16(),
            format!("Malformed upstream payload: {}", err),
        )
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("{0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl AppError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Upstream(err) => {
                StatusCode::from_u16(err.status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "validation_error",
            AppError::Upstream(_) => "upstream_error",
            AppError::NotFound(_) => "not_found",
            AppError::Database(_) => "internal_error",
        }
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(what) => AppError::NotFound(what),
            DatabaseError::Query(e) => AppError::Database(e),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation("body", rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (detail, field) = match &self {
            AppError::Validation { field, message } => (message.clone(), Some(*field)),
            AppError::Upstream(err) => {
                tracing::warn!(status = err.status, "Forecast source failed: {}", err.message);
                (err.message.clone(), None)
            }
            AppError::NotFound(what) => (what.clone(), None),
            AppError::Database(e) => {
                tracing::error!("Database operation failed: {}", e);
                ("Internal server error".to_string(), None)
            }
        };

        let body = ErrorBody {
            error: self.kind(),
            detail,
            field,
        };
        (status, Json(body)).into_response()
    }
}
