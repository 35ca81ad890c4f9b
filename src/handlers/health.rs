//! Health check endpoint for service monitoring.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{error::AppError, services::SharedManager};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,

    /// Store in use: "postgres" or "memory"
    pub store: String,

    pub timestamp: DateTime<Utc>,
}

/// Health check handler.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "status": "healthy",
///   "store": "postgres",
///   "timestamp": "2025-03-10T09:00:00Z"
/// }
/// ```
///
/// An unreachable database yields the standard 500 error body.
pub async fn health_check(
    State(manager): State<SharedManager>,
) -> Result<Json<HealthResponse>, AppError> {
    let store = manager.store();
    store.ping().await?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        store: store.backend().to_string(),
        timestamp: Utc::now(),
    }))
}
