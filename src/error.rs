//! Error types, the soft-failure outcome, and their HTTP responses.
//!
//! Rental operations answer in three tiers:
//!
//! - `Ok(Outcome::Completed(_))`: the operation happened
//! - `Ok(Outcome::Declined)`: soft failure, nothing was written (disabled rider)
//! - `Err(AppError)`: a domain conflict (client side) or a fault (server side)

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Faults**: `Database` errors from the Postgres store, `Internal`
/// - **Lookups**: `UserNotFound`, `NotFound`
/// - **Domain conflicts**: `InvalidOperation`, `NotDriver`
/// - **Request errors**: `Declined`, `InvalidRequest`
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Store operation failed. The cause is kept for the logs only.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A value computed by the service fell outside what it can represent.
    #[error("Internal error: {0}")]
    Internal(String),

    /// The rider referenced by an operation does not exist.
    #[error("User {0} not found")]
    UserNotFound(i32),

    /// A queried resource does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// The request breaks a rental rule: active rental, unavailable vehicle,
    /// missing card, bad time ordering, full vehicle, no active trip.
    #[error("{0}")]
    InvalidOperation(String),

    /// Someone other than the recorded driver tried to end a carpool trip.
    #[error("Only the assigned driver can end the trip")]
    NotDriver,

    /// A soft failure reached the HTTP boundary.
    #[error("{0}")]
    Declined(String),

    /// Request body or parameters are invalid.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl AppError {
    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        AppError::InvalidOperation(reason.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        AppError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Result of a rental operation that may be softly declined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Completed(T),

    /// The rider is disabled; nothing was written.
    Declined,
}

impl<T> Outcome<T> {
    pub fn is_declined(&self) -> bool {
        matches!(self, Outcome::Declined)
    }

    /// Turn a soft failure into [`AppError::Declined`] for the HTTP layer.
    pub fn or_declined(self, message: &str) -> Result<T, AppError> {
        match self {
            Outcome::Completed(value) => Ok(value),
            Outcome::Declined => Err(AppError::Declined(message.to_string())),
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "invalid_operation",
///     "message": "Bike is not available"
///   }
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `InvalidOperation`, `Declined`, `InvalidRequest` → 400 Bad Request
/// - `NotDriver` → 403 Forbidden
/// - `UserNotFound`, `NotFound` → 404 Not Found
/// - `Database`, `Internal` → 500 Internal Server Error (details logged, hidden from client)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::InvalidOperation(ref reason) => {
                (StatusCode::BAD_REQUEST, "invalid_operation", reason.clone())
            }
            AppError::Declined(ref reason) => {
                (StatusCode::BAD_REQUEST, "operation_declined", reason.clone())
            }
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::NotDriver => (StatusCode::FORBIDDEN, "not_driver", self.to_string()),
            AppError::UserNotFound(_) => (StatusCode::NOT_FOUND, "user_not_found", self.to_string()),
            AppError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            AppError::Database(ref err) => {
                tracing::error!(error = %err, "store operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Internal(ref detail) => {
                tracing::error!(detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
