//! Campus Transit Service - Main Application Entry Point
//!
//! REST API for campus transportation: shuttle boarding, bike rental and
//! carpooling, each recorded with its payment.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Rules**: `RentalManager` over an injected `RentalStore`
//! - **Database**: PostgreSQL with sqlx, or an in-memory store when no database is configured
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Pick the store (Postgres pool + migrations, or the seeded memory store)
//! 3. Build the rental manager and the HTTP router
//! 4. Start server on configured port

use std::sync::Arc;

use campus_transit_service::{
    config, db, routes,
    services::rental_manager::RentalManager,
    store::{MemoryStore, PgStore, RentalStore},
};
use chrono::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    let store: Arc<dyn RentalStore> = match config.database_url.as_deref() {
        Some(database_url) => {
            let pool = db::create_pool(database_url).await?;
            tracing::info!("Database pool created");

            db::run_migrations(&pool).await?;
            tracing::info!("Database migrations complete");

            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory campus fleet");
            Arc::new(MemoryStore::with_campus_fleet())
        }
    };

    let shuttle_trip = Duration::minutes(i64::from(config.shuttle_trip_minutes));
    let manager = RentalManager::new(store, shuttle_trip);
    let app = routes::router(Arc::new(manager));

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
