//! Bike rental HTTP handlers.
//!
//! - POST /api/v1/bikes/rent - Start a rental
//! - POST /api/v1/bikes/end - End a rental and bill it

use axum::{Json, extract::State};
use chrono::Utc;

use crate::{
    error::AppError,
    handlers::require_id,
    models::transaction::{
        EndBikeRentalRequest, EndBikeRentalResponse, RentBikeRequest, RentBikeResponse,
    },
    services::SharedManager,
};

/// Rent a bike.
///
/// # Request Body
///
/// ```json
/// { "user_id": 2, "bike_id": "BIKE001" }
/// ```
///
/// # Response (200)
///
/// ```json
/// {
///   "message": "Bike rented successfully",
///   "rental_start_time": "2025-03-10T09:00:00Z"
/// }
/// ```
pub async fn rent_bike(
    State(manager): State<SharedManager>,
    Json(request): Json<RentBikeRequest>,
) -> Result<Json<RentBikeResponse>, AppError> {
    require_id("bike_id", &request.bike_id)?;

    let rental_start_time = manager
        .rent_bike(request.user_id, &request.bike_id)
        .await?
        .or_declined("Bike rental failed")?;

    Ok(Json(RentBikeResponse {
        message: "Bike rented successfully".to_string(),
        rental_start_time,
    }))
}

/// End a bike rental.
///
/// The rental ends now unless the body carries `rental_end_time`.
///
/// # Response (200)
///
/// ```json
/// {
///   "message": "Bike rental ended successfully",
///   "rental_end_time": "2025-03-10T10:30:00Z",
///   "billed_hours": 2,
///   "amount_cents": 500
/// }
/// ```
pub async fn end_bike_rental(
    State(manager): State<SharedManager>,
    Json(request): Json<EndBikeRentalRequest>,
) -> Result<Json<EndBikeRentalResponse>, AppError> {
    require_id("bike_id", &request.bike_id)?;
    let rental_end_time = request.rental_end_time.unwrap_or_else(Utc::now);

    let receipt = manager
        .end_bike_rental(request.user_id, &request.bike_id, rental_end_time)
        .await?
        .or_declined("Ending the bike rental failed")?;

    Ok(Json(EndBikeRentalResponse {
        message: "Bike rental ended successfully".to_string(),
        rental_end_time: receipt.rental_end_time,
        billed_hours: receipt.billed_hours,
        amount_cents: receipt.amount_cents,
    }))
}
