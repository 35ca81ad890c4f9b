//! Router assembly.

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

use crate::{handlers, services::SharedManager};

/// Build the HTTP router over a shared rental manager.
pub fn router(manager: SharedManager) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        // Bikes
        .route("/api/v1/bikes/rent", post(handlers::bikes::rent_bike))
        .route("/api/v1/bikes/end", post(handlers::bikes::end_bike_rental))
        // Shuttles
        .route("/api/v1/shuttles/board", post(handlers::shuttles::board_shuttle))
        // Shared vehicles
        .route(
            "/api/v1/shared-vehicles/trips",
            post(handlers::shared_vehicles::create_trip),
        )
        .route(
            "/api/v1/shared-vehicles/rent",
            post(handlers::shared_vehicles::rent_shared_vehicle),
        )
        .route(
            "/api/v1/shared-vehicles/end",
            post(handlers::shared_vehicles::end_trip),
        )
        .route(
            "/api/v1/shared-vehicles/{id}/passengers",
            get(handlers::shared_vehicles::list_passengers),
        )
        // Riders
        .route(
            "/api/v1/users/{id}/transportation",
            get(handlers::users::list_transportation),
        )
        .route(
            "/api/v1/users/{id}/payments",
            get(handlers::users::list_payments),
        )
        .route("/api/v1/users/{id}/status", put(handlers::users::update_status))
        .layer(TraceLayer::new_for_http())
        .with_state(manager)
}
