//! Bike rental billing.
//!
//! Rentals are billed per started hour: 61 minutes costs two hours, and
//! anything shorter than an hour costs one.

use chrono::{DateTime, Duration, Utc};

use crate::error::AppError;

/// Number of hours billed for a rental running from `start` to `end`.
///
/// # Errors
///
/// `InvalidOperation` when `end` is not strictly after `start`.
pub fn billed_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64, AppError> {
    let elapsed = end - start;
    if elapsed <= Duration::zero() {
        return Err(AppError::invalid_operation(
            "Rental end time must be after the start time",
        ));
    }

    let whole_hours = elapsed.num_hours();
    let started_hours = if elapsed > Duration::hours(whole_hours) {
        whole_hours + 1
    } else {
        whole_hours
    };

    Ok(started_hours.max(1))
}

/// Amount due for `hours` at `price_cents` per hour.
///
/// # Errors
///
/// `InvalidOperation` when the amount does not fit in cents.
pub fn rental_amount(price_cents: i64, hours: i64) -> Result<i64, AppError> {
    price_cents
        .checked_mul(hours)
        .ok_or_else(|| AppError::invalid_operation("Rental is too long to bill"))
}
