use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use validator::ValidationErrors;

use crate::mailer::MailError;

/// Key used for validation errors that do not belong to a single field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Field name -> list of human-readable messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// AppError
///
/// Application-level error type for HTTP handlers. Every variant renders as a JSON
/// body: validation failures as a field map, everything else as `{"detail": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation failed: {0:?}")]
    Validation(FieldErrors),

    /// The request body could not be parsed.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Credentials are missing or invalid.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The caller is known but not allowed to perform the action.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Mail delivery error: {0}")]
    Mail(#[from] MailError),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// A single validation message attached to `field`.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        AppError::Validation(errors)
    }

    /// A validation message that concerns the payload as a whole.
    pub fn non_field(message: impl Into<String>) -> Self {
        Self::field(NON_FIELD_ERRORS, message)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        for (field, errs) in errors.field_errors() {
            let messages = errs
                .iter()
                .map(|e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("Invalid value ({}).", e.code),
                })
                .collect();
            fields.insert(field.to_string(), messages);
        }
        AppError::Validation(fields)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Validation(fields) => (StatusCode::BAD_REQUEST, json!(fields)),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "detail": msg })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "detail": msg })),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "detail": msg })),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "detail": msg })),
            AppError::Database(err) => classify_sqlx_error(&err),
            AppError::Mail(err) => {
                tracing::error!(error = %err, "Confirmation mail could not be delivered");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "detail": "Failed to send the confirmation email." }),
                )
            }
            AppError::Token(err) => {
                tracing::error!(error = %err, "Access token could not be signed");
                internal_error()
            }
        };

        (status, Json(body)).into_response()
    }
}

fn internal_error() -> (StatusCode, serde_json::Value) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "detail": "An internal error occurred." }),
    )
}

/// Maps a sqlx error onto an HTTP status and body.
///
/// - `RowNotFound` maps to 404.
/// - Unique violations (SQLSTATE 23505) map to 400, the same as a failed uniqueness check.
/// - Everything else maps to 500 and is logged.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, serde_json::Value) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            json!({ "detail": "Resource not found." }),
        ),
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            let constraint = db_err.constraint().unwrap_or("unknown");
            (
                StatusCode::BAD_REQUEST,
                json!({ NON_FIELD_ERRORS: [format!("Duplicate value violates unique constraint: {constraint}")] }),
            )
        }
        other => {
            tracing::error!(error = %other, "Database error");
            internal_error()
        }
    }
}
