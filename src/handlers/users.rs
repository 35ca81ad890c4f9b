//! Rider HTTP handlers.
//!
//! - GET /api/v1/users/{id}/transportation - Ride history, newest first
//! - GET /api/v1/users/{id}/payments - Payment history, newest first
//! - PUT /api/v1/users/{id}/status - Disable or re-enable a rider

use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    error::AppError,
    models::{
        transaction::{PaymentTransaction, TransportationTransactionResponse},
        user::{UpdateUserStatusRequest, User},
    },
    services::SharedManager,
};

/// Ride history of a rider. An empty list is a valid answer.
pub async fn list_transportation(
    State(manager): State<SharedManager>,
    Path(user_id): Path<i32>,
) -> Result<Json<Vec<TransportationTransactionResponse>>, AppError> {
    let rides = manager
        .user_transportation_transactions(user_id)
        .await?
        .or_declined("User is disabled")?;

    Ok(Json(rides.into_iter().map(Into::into).collect()))
}

/// Payment history of a rider.
pub async fn list_payments(
    State(manager): State<SharedManager>,
    Path(user_id): Path<i32>,
) -> Result<Json<Vec<PaymentTransaction>>, AppError> {
    let payments = manager
        .user_payment_transactions(user_id)
        .await?
        .or_declined("User is disabled")?;

    Ok(Json(payments))
}

/// Disable or re-enable a rider.
///
/// # Request Body
///
/// ```json
/// { "disabled": true }
/// ```
pub async fn update_status(
    State(manager): State<SharedManager>,
    Path(user_id): Path<i32>,
    Json(request): Json<UpdateUserStatusRequest>,
) -> Result<Json<User>, AppError> {
    let user = manager.set_user_disabled(user_id, request.disabled).await?;
    Ok(Json(user))
}
