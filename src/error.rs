// src/error.rs

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Failure of a collaborator (quiz catalog, attempt store, notification sink).
/// Always transient from the engine's point of view.
#[derive(Debug)]
pub struct StoreError(pub String);

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store unavailable: {}", self.0)
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError(err.to_string())
    }
}

/// Typed outcome of the attempt engine.
#[derive(Debug)]
pub enum AttemptError {
    /// Quiz missing or unpublished.
    NotAvailable,

    /// Submitted attempts already reached the quiz cap.
    AttemptsExhausted,

    /// Attempt not found, already submitted, or race lost.
    InvalidAttempt,

    /// Submission arrived after the deadline. The attempt is abandoned.
    TimeLimitExceeded,

    Store(StoreError),
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::NotAvailable => f.write_str("quiz not available"),
            AttemptError::AttemptsExhausted => f.write_str("maximum attempts reached"),
            AttemptError::InvalidAttempt => f.write_str("invalid attempt"),
            AttemptError::TimeLimitExceeded => f.write_str("time limit exceeded"),
            AttemptError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AttemptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AttemptError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for AttemptError {
    fn from(err: StoreError) -> Self {
        AttemptError::Store(err)
    }
}

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

/// Malformed or mistyped request bodies.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Maps engine outcomes onto HTTP semantics.
impl From<AttemptError> for AppError {
    fn from(err: AttemptError) -> Self {
        match err {
            AttemptError::NotAvailable => AppError::NotFound("Quiz not available".to_string()),
            AttemptError::AttemptsExhausted => {
                AppError::Forbidden("Maximum attempts reached".to_string())
            }
            AttemptError::InvalidAttempt => AppError::BadRequest("Invalid attempt".to_string()),
            AttemptError::TimeLimitExceeded => {
                AppError::Forbidden("Time limit exceeded".to_string())
            }
            AttemptError::Store(e) => AppError::from(e),
        }
    }
}
