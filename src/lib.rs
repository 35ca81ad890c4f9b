//! Campus transportation rentals: shuttle boarding, bike rental and
//! carpooling, each tied to a payment.
//!
//! The rules live in [`services::rental_manager::RentalManager`]; the
//! binary wires it to a store and serves it over HTTP.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
