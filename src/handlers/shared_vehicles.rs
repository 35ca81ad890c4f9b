//! Carpool HTTP handlers.
//!
//! - POST /api/v1/shared-vehicles/trips - Driver opens a trip
//! - POST /api/v1/shared-vehicles/rent - Passenger joins a trip
//! - POST /api/v1/shared-vehicles/end - Driver ends the trip for everyone
//! - GET /api/v1/shared-vehicles/{id}/passengers - Riders on board

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;

use crate::{
    error::AppError,
    handlers::require_id,
    models::{
        transaction::{
            CreateTripRequest, EndTripRequest, EndTripResponse, RentSharedVehicleRequest,
            SharedVehicleResponse,
        },
        vehicle::PassengersResponse,
    },
    services::SharedManager,
};

/// Open a carpool trip; the trip starts now.
pub async fn create_trip(
    State(manager): State<SharedManager>,
    Json(request): Json<CreateTripRequest>,
) -> Result<Json<SharedVehicleResponse>, AppError> {
    require_id("shared_vehicle_id", &request.shared_vehicle_id)?;

    let transaction = manager
        .create_shared_vehicle_trip(request.driver_id, &request.shared_vehicle_id, Utc::now())
        .await?
        .or_declined("Creating the shared vehicle trip failed")?;

    Ok(Json(SharedVehicleResponse {
        message: "Shared vehicle trip created successfully".to_string(),
        rental_start_time: transaction.rental_start_time,
        driver_id: request.driver_id,
    }))
}

/// Join a carpool trip as a passenger.
///
/// # Request Body
///
/// ```json
/// { "user_id": 2, "shared_vehicle_id": "SHARE001", "driver_id": 1 }
/// ```
pub async fn rent_shared_vehicle(
    State(manager): State<SharedManager>,
    Json(request): Json<RentSharedVehicleRequest>,
) -> Result<Json<SharedVehicleResponse>, AppError> {
    require_id("shared_vehicle_id", &request.shared_vehicle_id)?;

    let rental_start_time = manager
        .rent_shared_vehicle(request.user_id, &request.shared_vehicle_id, request.driver_id)
        .await?
        .or_declined("Shared vehicle rental failed")?;

    Ok(Json(SharedVehicleResponse {
        message: "Shared vehicle rented successfully".to_string(),
        rental_start_time,
        driver_id: request.driver_id,
    }))
}

/// End a carpool trip.
///
/// Returns 403 when the caller is not the vehicle's driver.
pub async fn end_trip(
    State(manager): State<SharedManager>,
    Json(request): Json<EndTripRequest>,
) -> Result<Json<EndTripResponse>, AppError> {
    require_id("shared_vehicle_id", &request.shared_vehicle_id)?;

    let closure = manager
        .end_shared_vehicle_rental(&request.shared_vehicle_id, request.driver_id)
        .await?;

    Ok(Json(EndTripResponse {
        message: "Shared vehicle trip ended successfully".to_string(),
        rental_end_time: closure.ended_at,
        closed_transactions: closure.closed_transactions,
    }))
}

/// List the riders currently on board, driver included.
pub async fn list_passengers(
    State(manager): State<SharedManager>,
    Path(vehicle_id): Path<String>,
) -> Result<Json<PassengersResponse>, AppError> {
    let (vehicle, passengers) = manager.shared_vehicle_passengers(&vehicle_id).await?;

    Ok(Json(PassengersResponse {
        shared_vehicle_id: vehicle.id,
        driver_id: vehicle.driver_id,
        capacity: vehicle.capacity,
        passengers,
    }))
}
