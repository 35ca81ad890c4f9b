//! Fleet models: bikes, shuttles and shared vehicles.
//!
//! Prices are stored as `i64` cents. A bike's price is per started hour,
//! shuttle and shared-vehicle prices are flat per trip.

use serde::Serialize;

/// A rentable bike.
///
/// Goes from available to rented when a rental starts and back when it ends.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct Bike {
    pub id: String,
    pub name: String,
    pub is_available: bool,

    /// Price per started hour, in cents
    pub price_cents: i64,
}

/// A campus shuttle line.
///
/// Boarding never changes availability: shuttles carry any number of riders.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct Shuttle {
    pub id: String,
    pub name: String,
    pub is_available: bool,

    /// Flat fare per boarding, in cents
    pub price_cents: i64,
}

/// A carpool vehicle.
///
/// # Trip States
///
/// - Available: no driver, nobody on board
/// - Active: a driver plus up to `capacity - 1` passengers, `is_available = false`
///
/// The riders on board live in the `shared_vehicle_passengers` join table,
/// not on this struct.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct SharedVehicle {
    pub id: String,
    pub name: String,
    pub is_available: bool,

    /// Flat fare per passenger, in cents
    pub price_cents: i64,

    /// Maximum number of riders on board, driver included
    pub capacity: i32,

    /// Current driver; `None` is the "no driver assigned" state
    pub driver_id: Option<i32>,
}

impl SharedVehicle {
    /// True when `driver_id` is the recorded driver of this vehicle.
    pub fn is_driven_by(&self, driver_id: i32) -> bool {
        self.driver_id == Some(driver_id)
    }
}

/// Response body for `GET /api/v1/shared-vehicles/{id}/passengers`.
#[derive(Debug, Serialize)]
pub struct PassengersResponse {
    pub shared_vehicle_id: String,
    pub driver_id: Option<i32>,
    pub capacity: i32,
    pub passengers: Vec<i32>,
}
