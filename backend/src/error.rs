//! Error handling for the Buyer Lead Intake service
//!
//! Every error renders as `{ "error": message, "code": CODE, "details"?: ... }`

use axum::{
    extract::{multipart::MultipartError, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::ValidationErrors;
use thiserror::Error;

use crate::models::InvalidRow;

pub const CONFLICT_MESSAGE: &str = "This record has been modified. Please refresh and try again.";

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Request errors
    #[error("Validation failed")]
    Validation(#[from] ValidationErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("Validation errors in CSV data")]
    CsvRowsInvalid(Vec<InvalidRow>),

    // Access errors
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    // State errors
    #[error("{0}")]
    Conflict(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Too many requests. Please try again later.")]
    RateLimited,

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn stale_record() -> Self {
        AppError::Conflict(CONFLICT_MESSAGE.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) | AppError::CsvRowsInvalid(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::DuplicateEntry(_) => StatusCode::CONFLICT,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::DatabaseError(err) => database_status(err),
            AppError::Internal(_) | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::CsvRowsInvalid(_) => "CSV_VALIDATION_ERROR",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::DuplicateEntry(_) => "DUPLICATE_ENTRY",
            AppError::RateLimited => "RATE_LIMITED",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Internal(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }
}

/// Unique violations are duplicates, foreign-key violations bad references
fn database_status(err: &sqlx::Error) -> StatusCode {
    match err {
        sqlx::Error::RowNotFound => StatusCode::NOT_FOUND,
        sqlx::Error::Database(db) if db.is_unique_violation() => StatusCode::CONFLICT,
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error response structure
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ValidationErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_rows: Option<Vec<InvalidRow>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log the error for debugging
        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self);
        }

        let message = match &self {
            AppError::DatabaseError(_) => match status {
                StatusCode::CONFLICT => "Duplicate entry".to_string(),
                StatusCode::BAD_REQUEST => "Invalid reference".to_string(),
                StatusCode::NOT_FOUND => "Record not found".to_string(),
                _ => "A database error occurred".to_string(),
            },
            AppError::Internal(_) | AppError::InternalError(_) => "An internal server error occurred".to_string(),
            other => other.to_string(),
        };

        let code = self.code();
        let (details, invalid_rows) = match self {
            AppError::Validation(errors) => (Some(errors), None),
            AppError::CsvRowsInvalid(rows) => (None, Some(rows)),
            _ => (None, None),
        };

        (
            status,
            Json(ErrorResponse {
                error: message,
                code,
                details,
                invalid_rows,
            }),
        )
            .into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::BadRequest(format!("Invalid multipart body: {}", err))
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
