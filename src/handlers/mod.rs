//! HTTP request handlers (route handlers).
//!
//! Handlers only parse the request, call the rental manager and shape the
//! response; every rule lives in `services::rental_manager`.

/// Bike rental endpoints
pub mod bikes;
/// Service health endpoint
pub mod health;
/// Carpool endpoints
pub mod shared_vehicles;
/// Shuttle boarding endpoint
pub mod shuttles;
/// Rider history and status endpoints
pub mod users;

use crate::error::AppError;

/// Reject blank vehicle identifiers before they reach the rules.
pub fn require_id(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidRequest(format!("{field} must not be empty")));
    }
    Ok(())
}
