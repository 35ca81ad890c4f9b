//! Business logic services.
//!
//! Services hold the rental rules, separated from HTTP handlers and from
//! the store behind them.

pub mod billing;
pub mod locks;
pub mod rental_manager;

use std::sync::Arc;

/// Manager shared by every handler through axum `State`.
pub type SharedManager = Arc<rental_manager::RentalManager>;
