//! Persistence seam of the rental manager.
//!
//! The manager only sees [`RentalStore`]; `main` picks the implementation:
//! - [`PgStore`] when `DATABASE_URL` is set
//! - [`MemoryStore`] otherwise, seeded with the campus fleet

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        transaction::{
            NewPaymentTransaction, NewTransportationTransaction, PaymentRevision,
            PaymentTransaction, TransportationTransaction,
        },
        user::{Card, User},
        vehicle::{Bike, SharedVehicle, Shuttle},
    },
};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, AppError>;

/// Lookups and predicate queries used by the rental rules, plus one write
/// method per rule outcome.
///
/// Every write method is a unit of work: it applies all of its rows or none
/// of them. Implementations do no rule checking of their own; every
/// check-then-act sequence is serialized by the manager's entity locks.
#[async_trait]
pub trait RentalStore: Send + Sync {
    // Riders
    async fn user_by_id(&self, user_id: i32) -> StoreResult<Option<User>>;
    async fn card_by_id(&self, card_id: i32) -> StoreResult<Option<Card>>;
    async fn set_user_disabled(&self, user_id: i32, disabled: bool) -> StoreResult<Option<User>>;

    // Fleet
    async fn bike_by_id(&self, bike_id: &str) -> StoreResult<Option<Bike>>;
    async fn shuttle_by_id(&self, shuttle_id: &str) -> StoreResult<Option<Shuttle>>;
    async fn shared_vehicle_by_id(&self, vehicle_id: &str) -> StoreResult<Option<SharedVehicle>>;
    async fn passengers(&self, vehicle_id: &str) -> StoreResult<Vec<i32>>;

    // Transportation ledger
    async fn active_transaction_for_user(
        &self,
        user_id: i32,
    ) -> StoreResult<Option<TransportationTransaction>>;
    async fn latest_transaction_for_bike(
        &self,
        bike_id: &str,
    ) -> StoreResult<Option<TransportationTransaction>>;
    async fn transactions_for_shared_vehicle(
        &self,
        vehicle_id: &str,
    ) -> StoreResult<Vec<TransportationTransaction>>;
    async fn transactions_for_user(&self, user_id: i32) -> StoreResult<Vec<TransportationTransaction>>;

    // Payment ledger
    async fn latest_payment_for_user(&self, user_id: i32) -> StoreResult<Option<PaymentTransaction>>;
    async fn payments_for_user(&self, user_id: i32) -> StoreResult<Vec<PaymentTransaction>>;

    // Units of work

    /// Record a shuttle ride together with its payment.
    async fn record_boarding(
        &self,
        ride: NewTransportationTransaction,
        payment: NewPaymentTransaction,
    ) -> StoreResult<(TransportationTransaction, PaymentTransaction)>;

    /// Open a bike rental, charge its provisional payment and mark the bike taken.
    async fn start_bike_rental(
        &self,
        bike_id: &str,
        rental: NewTransportationTransaction,
        payment: NewPaymentTransaction,
    ) -> StoreResult<TransportationTransaction>;

    /// Close a bike rental, apply the final bill and release the bike.
    async fn finish_bike_rental(
        &self,
        bike_id: &str,
        rental_id: Uuid,
        end_time: DateTime<Utc>,
        revision: Option<PaymentRevision>,
    ) -> StoreResult<()>;

    /// Assign the driver, take the vehicle off the market, seat the driver and
    /// open the driver's ride.
    async fn open_trip(
        &self,
        vehicle_id: &str,
        driver_id: i32,
        ride: NewTransportationTransaction,
    ) -> StoreResult<TransportationTransaction>;

    /// Record the driver, seat the passenger and open their paid ride. The
    /// vehicle's availability is left as it is.
    async fn join_trip(
        &self,
        vehicle_id: &str,
        driver_id: i32,
        ride: NewTransportationTransaction,
        payment: NewPaymentTransaction,
    ) -> StoreResult<TransportationTransaction>;

    /// Close the given rides, empty the vehicle and put it back on the market
    /// with no driver. Returns the number of rides closed.
    async fn close_trip(
        &self,
        vehicle_id: &str,
        ride_ids: &[Uuid],
        end_time: DateTime<Utc>,
    ) -> StoreResult<usize>;

    /// Connectivity probe for the health endpoint.
    async fn ping(&self) -> StoreResult<()>;

    /// Short label reported by the health endpoint.
    fn backend(&self) -> &'static str;
}
