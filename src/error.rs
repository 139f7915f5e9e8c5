use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use std::fmt;
use thiserror::Error as ThisError;

use crate::codec::CodecError;
use crate::service::access_gate::Operation;

/// Which unique credential attribute collided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictField {
    Username,
    Email,
}

impl fmt::Display for ConflictField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictField::Username => f.write_str("username"),
            ConflictField::Email => f.write_str("email"),
        }
    }
}

#[derive(Debug, ThisError)]
pub enum RegistryError {
    #[error("missing or invalid caller identity")]
    Unauthenticated,

    #[error("not authorized to {0}")]
    Forbidden(Operation),

    #[error("{0} already exists")]
    Conflict(ConflictField),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("password does not match")]
    PasswordMismatch,

    #[error("too many attempts; retry later")]
    RateLimited,

    #[error("Database error: {0}")]
    Storage(#[from] SqlxError),

    #[error("Field codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),
}

impl RegistryError {
    pub fn validation(message: impl Into<String>) -> Self {
        RegistryError::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        RegistryError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Translate a write failure, surfacing UNIQUE index violations on the
    /// credentials table as conflicts on the offending field.
    pub fn from_write(err: SqlxError) -> Self {
        if let SqlxError::Database(db_err) = &err
            && db_err.is_unique_violation()
        {
            let message = db_err.message();
            if message.contains("credentials.username") {
                return RegistryError::Conflict(ConflictField::Username);
            }
            if message.contains("credentials.email") {
                return RegistryError::Conflict(ConflictField::Email);
            }
        }
        RegistryError::Storage(err)
    }

    fn status_and_body(&self) -> (StatusCode, ApiErrorBody) {
        match self {
            RegistryError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                ApiErrorBody::new("UNAUTHENTICATED", self.to_string()),
            ),
            RegistryError::Forbidden(_) => (
                StatusCode::FORBIDDEN,
                ApiErrorBody::new("FORBIDDEN", self.to_string()),
            ),
            RegistryError::Conflict(_) => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody::new("CONFLICT", self.to_string()),
            ),
            RegistryError::NotFound { .. } => (
                StatusCode::NOT_FOUND,
                ApiErrorBody::new("NOT_FOUND", self.to_string()),
            ),
            RegistryError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody::new("INVALID_REQUEST", self.to_string()),
            ),
            RegistryError::PasswordMismatch => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody::new("PASSWORD_MISMATCH", self.to_string()),
            ),
            RegistryError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                ApiErrorBody::new("RATE_LIMITED", self.to_string()),
            ),
            RegistryError::Storage(_)
            | RegistryError::Codec(_)
            | RegistryError::PasswordHash(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorBody::new("INTERNAL_ERROR", "An internal server error occurred."),
            ),
        }
    }
}

impl From<JsonRejection> for RegistryError {
    fn from(rejection: JsonRejection) -> Self {
        RegistryError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for RegistryError {
    fn from(rejection: QueryRejection) -> Self {
        RegistryError::Validation(rejection.body_text())
    }
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = self.status_and_body();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(ApiErrorResponse { error })).into_response()
    }
}

/// Standardized API error response body
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiErrorBody {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
