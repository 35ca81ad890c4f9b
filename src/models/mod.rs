//! Data models representing database entities and API bodies.

/// Ride and payment ledgers, endpoint bodies
pub mod transaction;
/// Riders and payment cards
pub mod user;
/// Bikes, shuttles and shared vehicles
pub mod vehicle;
