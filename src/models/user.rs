//! Rider and payment card models.
//!
//! - `User`: a campus rider, created outside this service
//! - `Card`: the single payment card attached to each user
//! - `PaymentMethod`: how a card settles payments

use serde::{Deserialize, Serialize};

/// A campus rider.
///
/// # Database Table
///
/// Maps to the `users` table. Each user owns exactly one card (`card_id` is
/// unique), and only the `is_disabled` flag is ever changed by this service.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct User {
    pub id: i32,

    pub name: String,

    /// Disabled users are refused every rental operation.
    pub is_disabled: bool,

    /// State-funded riders have their payments flagged as refunds.
    pub is_state_funded: bool,

    pub card_id: i32,
}

/// Payment card attached to a user.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct Card {
    pub id: i32,
    pub payment_method: PaymentMethod,
}

/// Settlement method of a card, stored as the Postgres enum `payment_method`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    BankTransfer,
    PrepaidBalance,
}

/// Request body for `PUT /api/v1/users/{id}/status`.
///
/// ```json
/// { "disabled": true }
/// ```
#[derive(Debug, Deserialize)]
pub struct UpdateUserStatusRequest {
    pub disabled: bool,
}
