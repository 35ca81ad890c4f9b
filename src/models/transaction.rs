//! Transaction ledgers and the request/response bodies of the rental endpoints.
//!
//! This module defines:
//! - `TransportationTransaction`: one ride or rental of one vehicle by one user
//! - `PaymentTransaction`: the charge recorded alongside a ride
//! - Request and response types for the bike, shuttle and shared-vehicle endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::PaymentMethod;

/// Which kind of vehicle a transportation transaction refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RentalKind {
    Shuttle,
    Bike,
    SharedVehicle,
}

/// Reference to the vehicle a new transaction is for.
///
/// Exactly one vehicle id ends up set on the stored row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VehicleRef {
    Shuttle(String),
    Bike(String),
    SharedVehicle(String),
}

/// A ride or rental record.
///
/// # Database Table
///
/// Maps to `transportation_transactions`. Exactly one of `shuttle_id`,
/// `bike_id` and `shared_vehicle_id` is set (CHECK constraint).
///
/// # Lifecycle
///
/// - Bikes and shared vehicles: created open (`rental_end_time` NULL), closed
///   when the rental or trip ends
/// - Shuttles: created already closed, one allotment after boarding
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct TransportationTransaction {
    pub id: Uuid,
    pub user_id: i32,
    pub shuttle_id: Option<String>,
    pub bike_id: Option<String>,
    pub shared_vehicle_id: Option<String>,

    /// When the record was written
    pub date: DateTime<Utc>,

    pub rental_start_time: DateTime<Utc>,

    /// NULL while the rental is in progress
    pub rental_end_time: Option<DateTime<Utc>>,
}

impl TransportationTransaction {
    /// An open transaction is a rental still in progress.
    pub fn is_open(&self) -> bool {
        self.rental_end_time.is_none()
    }

    /// Kind discriminator derived from whichever vehicle id is set.
    pub fn kind(&self) -> Option<RentalKind> {
        if self.shuttle_id.is_some() {
            Some(RentalKind::Shuttle)
        } else if self.bike_id.is_some() {
            Some(RentalKind::Bike)
        } else if self.shared_vehicle_id.is_some() {
            Some(RentalKind::SharedVehicle)
        } else {
            None
        }
    }
}

/// Ride record as returned to clients, with its kind spelled out.
///
/// ```json
/// {
///   "id": "770e8400-e29b-41d4-a716-446655440002",
///   "user_id": 2,
///   "kind": "bike",
///   "vehicle_id": "BIKE001",
///   "date": "2025-03-10T09:00:00Z",
///   "rental_start_time": "2025-03-10T09:00:00Z",
///   "rental_end_time": null
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct TransportationTransactionResponse {
    pub id: Uuid,
    pub user_id: i32,
    pub kind: Option<RentalKind>,
    pub vehicle_id: Option<String>,
    pub date: DateTime<Utc>,
    pub rental_start_time: DateTime<Utc>,
    pub rental_end_time: Option<DateTime<Utc>>,
}

impl From<TransportationTransaction> for TransportationTransactionResponse {
    fn from(transaction: TransportationTransaction) -> Self {
        let kind = transaction.kind();
        Self {
            id: transaction.id,
            user_id: transaction.user_id,
            kind,
            vehicle_id: transaction
                .shuttle_id
                .or(transaction.bike_id)
                .or(transaction.shared_vehicle_id),
            date: transaction.date,
            rental_start_time: transaction.rental_start_time,
            rental_end_time: transaction.rental_end_time,
        }
    }
}

/// Values for a transportation transaction about to be inserted.
#[derive(Debug, Clone)]
pub struct NewTransportationTransaction {
    pub user_id: i32,
    pub vehicle: VehicleRef,
    pub date: DateTime<Utc>,
    pub rental_start_time: DateTime<Utc>,
    pub rental_end_time: Option<DateTime<Utc>>,
}

/// A payment recorded for a ride.
///
/// `amount_cents` is provisional for bikes (one hour) until the rental ends
/// and the real duration is billed.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub user_id: i32,
    pub amount_cents: i64,
    pub date: DateTime<Utc>,
    pub method: PaymentMethod,

    /// Set for state-funded riders
    pub is_refund: bool,
}

/// Values for a payment transaction about to be inserted.
#[derive(Debug, Clone)]
pub struct NewPaymentTransaction {
    pub user_id: i32,
    pub amount_cents: i64,
    pub date: DateTime<Utc>,
    pub method: PaymentMethod,
    pub is_refund: bool,
}

/// Final amount of a provisional payment, applied when a bike rental ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentRevision {
    pub payment_id: Uuid,
    pub amount_cents: i64,
}

/// Request to rent a bike.
///
/// ```json
/// { "user_id": 2, "bike_id": "BIKE001" }
/// ```
#[derive(Debug, Deserialize)]
pub struct RentBikeRequest {
    pub user_id: i32,
    pub bike_id: String,
}

/// Request to end a bike rental. Without `rental_end_time` the rental ends now.
#[derive(Debug, Deserialize)]
pub struct EndBikeRentalRequest {
    pub user_id: i32,
    pub bike_id: String,
    pub rental_end_time: Option<DateTime<Utc>>,
}

/// Request to board a shuttle.
#[derive(Debug, Deserialize)]
pub struct BoardShuttleRequest {
    pub user_id: i32,
    pub shuttle_id: String,
}

/// Request from a driver opening a carpool trip.
#[derive(Debug, Deserialize)]
pub struct CreateTripRequest {
    pub driver_id: i32,
    pub shared_vehicle_id: String,
}

/// Request to join a carpool trip as a passenger.
#[derive(Debug, Deserialize)]
pub struct RentSharedVehicleRequest {
    pub user_id: i32,
    pub shared_vehicle_id: String,
    pub driver_id: i32,
}

/// Request from the driver to end a carpool trip.
#[derive(Debug, Deserialize)]
pub struct EndTripRequest {
    pub shared_vehicle_id: String,
    pub driver_id: i32,
}

/// Returned when a bike rental starts.
#[derive(Debug, Serialize)]
pub struct RentBikeResponse {
    pub message: String,
    pub rental_start_time: DateTime<Utc>,
}

/// Returned when a bike rental ends, with the final bill.
#[derive(Debug, Serialize)]
pub struct EndBikeRentalResponse {
    pub message: String,
    pub rental_end_time: DateTime<Utc>,
    pub billed_hours: i64,
    pub amount_cents: i64,
}

/// Returned after boarding a shuttle.
#[derive(Debug, Serialize)]
pub struct BoardShuttleResponse {
    pub message: String,
    pub boarding_time: DateTime<Utc>,
    pub trip_end_time: DateTime<Utc>,
}

/// Returned when a carpool trip is opened or joined.
#[derive(Debug, Serialize)]
pub struct SharedVehicleResponse {
    pub message: String,
    pub rental_start_time: DateTime<Utc>,
    pub driver_id: i32,
}

/// Returned when a carpool trip ends.
#[derive(Debug, Serialize)]
pub struct EndTripResponse {
    pub message: String,
    pub rental_end_time: DateTime<Utc>,
    pub closed_transactions: usize,
}
