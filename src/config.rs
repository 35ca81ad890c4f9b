//! Application configuration management.
//!
//! Configuration is read from environment variables with the `envy` crate,
//! after an optional `.env` file has been loaded.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (optional): PostgreSQL connection string. When missing the
///   service runs on the in-memory store seeded with the campus fleet.
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `SHUTTLE_TRIP_MINUTES` (optional): length of the fixed shuttle allotment,
///   1 to 1440, defaults to 60
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_shuttle_trip_minutes")]
    pub shuttle_trip_minutes: u32,
}

/// Longest shuttle allotment accepted: one day.
const MAX_SHUTTLE_TRIP_MINUTES: u32 = 24 * 60;

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

/// Shuttle boardings are closed one hour after they start unless configured otherwise.
fn default_shuttle_trip_minutes() -> u32 {
    60
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed into
    /// its expected type (e.g. `SERVER_PORT=abc`), or is out of range.
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are converted automatically: database_url -> DATABASE_URL
        envy::from_env::<Config>()?.validated()
    }

    /// Reject values the service cannot run with.
    pub fn validated(self) -> Result<Self, envy::Error> {
        if !(1..=MAX_SHUTTLE_TRIP_MINUTES).contains(&self.shuttle_trip_minutes) {
            return Err(envy::Error::Custom(format!(
                "SHUTTLE_TRIP_MINUTES must be between 1 and {MAX_SHUTTLE_TRIP_MINUTES}, got {}",
                self.shuttle_trip_minutes
            )));
        }
        Ok(self)
    }
}
