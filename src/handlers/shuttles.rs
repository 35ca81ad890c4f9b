//! Shuttle boarding HTTP handler.

use axum::{Json, extract::State};

use crate::{
    error::AppError,
    handlers::require_id,
    models::transaction::{BoardShuttleRequest, BoardShuttleResponse},
    services::SharedManager,
};

/// Board a shuttle.
///
/// # Endpoint
///
/// `POST /api/v1/shuttles/board`
///
/// # Response (200)
///
/// ```json
/// {
///   "message": "Shuttle boarded successfully",
///   "boarding_time": "2025-03-10T09:00:00Z",
///   "trip_end_time": "2025-03-10T10:00:00Z"
/// }
/// ```
pub async fn board_shuttle(
    State(manager): State<SharedManager>,
    Json(request): Json<BoardShuttleRequest>,
) -> Result<Json<BoardShuttleResponse>, AppError> {
    require_id("shuttle_id", &request.shuttle_id)?;

    let boarding = manager
        .board_shuttle(request.user_id, &request.shuttle_id)
        .await?
        .or_declined("Shuttle boarding failed")?;

    let boarding_time = boarding.transaction.rental_start_time;
    Ok(Json(BoardShuttleResponse {
        message: "Shuttle boarded successfully".to_string(),
        boarding_time,
        trip_end_time: boarding.transaction.rental_end_time.unwrap_or(boarding_time),
    }))
}
