//! Rental transaction manager - the business rules of campus transportation.
//!
//! This service handles:
//! - Rider eligibility (disabled riders are softly declined)
//! - The one-open-rental-per-rider invariant
//! - Bike, shuttle and shared-vehicle state transitions
//! - Transportation and payment records with the right amounts
//!
//! # Check Order
//!
//! Every mutating operation checks the rider's disabled flag first and
//! their open rental second, before touching any vehicle. All checks run
//! before the first write, under the entity locks of the rider and vehicle.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    error::{AppError, Outcome},
    models::{
        transaction::{
            NewPaymentTransaction, NewTransportationTransaction, PaymentRevision,
            PaymentTransaction, TransportationTransaction, VehicleRef,
        },
        user::{Card, User},
        vehicle::SharedVehicle,
    },
    services::{
        billing,
        locks::{EntityLocks, LockKey},
    },
    store::RentalStore,
};

/// A completed shuttle boarding.
#[derive(Debug, Clone)]
pub struct ShuttleBoarding {
    pub transaction: TransportationTransaction,
    pub payment: PaymentTransaction,
}

/// Final bill of a bike rental.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BikeReceipt {
    pub transaction_id: Uuid,
    pub rental_end_time: DateTime<Utc>,
    pub billed_hours: i64,
    pub amount_cents: i64,
}

/// Result of a driver ending a carpool trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripClosure {
    pub ended_at: DateTime<Utc>,
    pub closed_transactions: usize,
}

/// Enforces the rental rules over an injected [`RentalStore`].
pub struct RentalManager {
    store: Arc<dyn RentalStore>,
    locks: EntityLocks,
    shuttle_trip: Duration,
}

impl RentalManager {
    /// Build a manager. `shuttle_trip` is the fixed allotment after which a
    /// shuttle boarding counts as ended.
    pub fn new(store: Arc<dyn RentalStore>, shuttle_trip: Duration) -> Self {
        Self {
            store,
            locks: EntityLocks::new(),
            shuttle_trip,
        }
    }

    pub fn store(&self) -> &dyn RentalStore {
        self.store.as_ref()
    }

    // ---- Eligibility ------------------------------------------------------

    /// Whether the rider is disabled.
    ///
    /// # Errors
    ///
    /// `UserNotFound` when the rider does not exist.
    pub async fn is_user_disabled(&self, user_id: i32) -> Result<bool, AppError> {
        Ok(self.load_user(user_id).await?.is_disabled)
    }

    /// Whether the rider's payments are flagged as refunds.
    pub async fn is_user_state_funded(&self, user_id: i32) -> Result<bool, AppError> {
        Ok(self.load_user(user_id).await?.is_state_funded)
    }

    /// Whether the rider has an open transportation transaction.
    pub async fn has_active_rental(&self, user_id: i32) -> Result<bool, AppError> {
        Ok(self.store.active_transaction_for_user(user_id).await?.is_some())
    }

    async fn load_user(&self, user_id: i32) -> Result<User, AppError> {
        self.store
            .user_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound(user_id))
    }

    /// The rider, or `None` when they are disabled and the operation is declined.
    async fn enabled_user(&self, user_id: i32, operation: &str) -> Result<Option<User>, AppError> {
        let user = self.load_user(user_id).await?;
        if user.is_disabled {
            tracing::warn!(user_id, operation, "declined: user is disabled");
            return Ok(None);
        }
        Ok(Some(user))
    }

    async fn ensure_no_active_rental(&self, user_id: i32) -> Result<(), AppError> {
        if self.has_active_rental(user_id).await? {
            return Err(AppError::invalid_operation(
                "User must end the current rental before starting a new one",
            ));
        }
        Ok(())
    }

    async fn card_of(&self, user: &User) -> Result<Card, AppError> {
        self.store
            .card_by_id(user.card_id)
            .await?
            .ok_or_else(|| AppError::invalid_operation("User has no associated card"))
    }

    fn charge(user: &User, card: &Card, amount_cents: i64) -> NewPaymentTransaction {
        NewPaymentTransaction {
            user_id: user.id,
            amount_cents,
            date: Utc::now(),
            method: card.payment_method,
            is_refund: user.is_state_funded,
        }
    }

    // ---- Shuttles ---------------------------------------------------------

    /// Board a shuttle. The ride is recorded already closed, one allotment
    /// after boarding, and charged the shuttle's flat fare. Shuttle
    /// availability is left untouched.
    pub async fn board_shuttle(
        &self,
        user_id: i32,
        shuttle_id: &str,
    ) -> Result<Outcome<ShuttleBoarding>, AppError> {
        let _locks = self.locks.acquire([LockKey::User(user_id)]).await;

        let Some(user) = self.enabled_user(user_id, "board_shuttle").await? else {
            return Ok(Outcome::Declined);
        };
        self.ensure_no_active_rental(user_id).await?;

        let shuttle = self
            .store
            .shuttle_by_id(shuttle_id)
            .await?
            .filter(|s| s.is_available)
            .ok_or_else(|| AppError::invalid_operation("Shuttle is not available"))?;
        let card = self.card_of(&user).await?;

        let boarded_at = Utc::now();
        let trip_end = boarded_at
            .checked_add_signed(self.shuttle_trip)
            .filter(|end| *end > boarded_at)
            .ok_or_else(|| {
                AppError::Internal(format!("invalid shuttle allotment: {}", self.shuttle_trip))
            })?;
        let (transaction, payment) = self
            .store
            .record_boarding(
                NewTransportationTransaction {
                    user_id,
                    vehicle: VehicleRef::Shuttle(shuttle.id.clone()),
                    date: boarded_at,
                    rental_start_time: boarded_at,
                    rental_end_time: Some(trip_end),
                },
                Self::charge(&user, &card, shuttle.price_cents),
            )
            .await?;

        tracing::info!(user_id, shuttle_id, amount_cents = payment.amount_cents, "shuttle boarded");

        Ok(Outcome::Completed(ShuttleBoarding {
            transaction,
            payment,
        }))
    }

    // ---- Bikes ------------------------------------------------------------

    /// Start a bike rental and return its start time.
    ///
    /// One hour is charged up front; the real amount is billed when the
    /// rental ends.
    pub async fn rent_bike(
        &self,
        user_id: i32,
        bike_id: &str,
    ) -> Result<Outcome<DateTime<Utc>>, AppError> {
        let _locks = self
            .locks
            .acquire([LockKey::User(user_id), LockKey::Bike(bike_id.to_string())])
            .await;

        let Some(user) = self.enabled_user(user_id, "rent_bike").await? else {
            return Ok(Outcome::Declined);
        };
        self.ensure_no_active_rental(user_id).await?;

        let bike = self
            .store
            .bike_by_id(bike_id)
            .await?
            .filter(|b| b.is_available)
            .ok_or_else(|| AppError::invalid_operation("Bike is not available or already rented"))?;

        // Availability flag and ledger must agree
        let still_rented = self
            .store
            .latest_transaction_for_bike(bike_id)
            .await?
            .is_some_and(|t| t.is_open());
        if still_rented {
            return Err(AppError::invalid_operation(
                "Bike is not available or already rented",
            ));
        }

        let card = self.card_of(&user).await?;

        let rental_start_time = Utc::now();
        self.store
            .start_bike_rental(
                &bike.id,
                NewTransportationTransaction {
                    user_id,
                    vehicle: VehicleRef::Bike(bike.id.clone()),
                    date: rental_start_time,
                    rental_start_time,
                    rental_end_time: None,
                },
                Self::charge(&user, &card, bike.price_cents),
            )
            .await?;

        tracing::info!(user_id, bike_id, "bike rented");

        Ok(Outcome::Completed(rental_start_time))
    }

    /// End a bike rental at `rental_end_time` and bill the started hours.
    pub async fn end_bike_rental(
        &self,
        user_id: i32,
        bike_id: &str,
        rental_end_time: DateTime<Utc>,
    ) -> Result<Outcome<BikeReceipt>, AppError> {
        let _locks = self
            .locks
            .acquire([LockKey::User(user_id), LockKey::Bike(bike_id.to_string())])
            .await;

        if self.enabled_user(user_id, "end_bike_rental").await?.is_none() {
            return Ok(Outcome::Declined);
        }

        let bike = self
            .store
            .bike_by_id(bike_id)
            .await?
            .ok_or_else(|| AppError::invalid_operation("Bike does not exist"))?;

        let rental = self
            .store
            .latest_transaction_for_bike(bike_id)
            .await?
            .filter(|t| t.is_open() && t.user_id == user_id)
            .ok_or_else(|| {
                AppError::invalid_operation("No active rental found for this user and bike")
            })?;

        let billed_hours = billing::billed_hours(rental.rental_start_time, rental_end_time)?;
        let amount_cents = billing::rental_amount(bike.price_cents, billed_hours)?;

        // The provisional charge is the rider's latest payment: no other
        // payment can be recorded while the rental is open.
        let revision = self
            .store
            .latest_payment_for_user(user_id)
            .await?
            .map(|payment| PaymentRevision {
                payment_id: payment.id,
                amount_cents,
            });
        self.store
            .finish_bike_rental(&bike.id, rental.id, rental_end_time, revision)
            .await?;

        tracing::info!(user_id, bike_id, billed_hours, amount_cents, "bike rental ended");

        Ok(Outcome::Completed(BikeReceipt {
            transaction_id: rental.id,
            rental_end_time,
            billed_hours,
            amount_cents,
        }))
    }

    // ---- Shared vehicles --------------------------------------------------

    /// Open a carpool trip with `driver_id` at the wheel.
    ///
    /// The driver rides free: an open transportation transaction is recorded
    /// but no payment.
    pub async fn create_shared_vehicle_trip(
        &self,
        driver_id: i32,
        vehicle_id: &str,
        rental_start_time: DateTime<Utc>,
    ) -> Result<Outcome<TransportationTransaction>, AppError> {
        let _locks = self
            .locks
            .acquire([
                LockKey::User(driver_id),
                LockKey::SharedVehicle(vehicle_id.to_string()),
            ])
            .await;

        if self
            .enabled_user(driver_id, "create_shared_vehicle_trip")
            .await?
            .is_none()
        {
            return Ok(Outcome::Declined);
        }
        self.ensure_no_active_rental(driver_id).await?;

        let vehicle = self.existing_shared_vehicle(vehicle_id).await?;
        if !vehicle.is_available {
            return Err(AppError::invalid_operation("Shared vehicle is not available"));
        }
        self.ensure_seat_free(&vehicle).await?;

        let transaction = self
            .store
            .open_trip(
                &vehicle.id,
                driver_id,
                NewTransportationTransaction {
                    user_id: driver_id,
                    vehicle: VehicleRef::SharedVehicle(vehicle.id.clone()),
                    date: Utc::now(),
                    rental_start_time,
                    rental_end_time: None,
                },
            )
            .await?;

        tracing::info!(driver_id, vehicle_id, "shared vehicle trip created");

        Ok(Outcome::Completed(transaction))
    }

    /// Join a carpool trip as a passenger and return the boarding time.
    ///
    /// A vehicle can be joined while fewer riders than its capacity are on
    /// board. `driver_id` is recorded as the vehicle's driver, which also
    /// covers a driver assigned after the first passengers joined.
    pub async fn rent_shared_vehicle(
        &self,
        user_id: i32,
        vehicle_id: &str,
        driver_id: i32,
    ) -> Result<Outcome<DateTime<Utc>>, AppError> {
        let _locks = self
            .locks
            .acquire([
                LockKey::User(user_id),
                LockKey::SharedVehicle(vehicle_id.to_string()),
            ])
            .await;

        let Some(user) = self.enabled_user(user_id, "rent_shared_vehicle").await? else {
            return Ok(Outcome::Declined);
        };
        self.ensure_no_active_rental(user_id).await?;

        let vehicle = self.existing_shared_vehicle(vehicle_id).await?;
        if self.store.user_by_id(driver_id).await?.is_none() {
            return Err(AppError::invalid_operation("Driver does not exist"));
        }
        self.ensure_seat_free(&vehicle).await?;

        let card = self.card_of(&user).await?;

        let rental_start_time = Utc::now();
        self.store
            .join_trip(
                &vehicle.id,
                driver_id,
                NewTransportationTransaction {
                    user_id,
                    vehicle: VehicleRef::SharedVehicle(vehicle.id.clone()),
                    date: rental_start_time,
                    rental_start_time,
                    rental_end_time: None,
                },
                Self::charge(&user, &card, vehicle.price_cents),
            )
            .await?;

        tracing::info!(user_id, vehicle_id, driver_id, "shared vehicle joined");

        Ok(Outcome::Completed(rental_start_time))
    }

    /// End a carpool trip. Only the recorded driver may do this; every open
    /// transaction on the vehicle is closed, passengers' included, and the
    /// vehicle goes back to available with no driver.
    pub async fn end_shared_vehicle_rental(
        &self,
        vehicle_id: &str,
        driver_id: i32,
    ) -> Result<TripClosure, AppError> {
        let _locks = self
            .locks
            .acquire([
                LockKey::User(driver_id),
                LockKey::SharedVehicle(vehicle_id.to_string()),
            ])
            .await;

        let vehicle = self.existing_shared_vehicle(vehicle_id).await?;
        if !vehicle.is_driven_by(driver_id) {
            return Err(AppError::NotDriver);
        }

        let open: Vec<TransportationTransaction> = self
            .store
            .transactions_for_shared_vehicle(&vehicle.id)
            .await?
            .into_iter()
            .filter(TransportationTransaction::is_open)
            .collect();
        if open.is_empty() {
            return Err(AppError::invalid_operation("No active trip in progress"));
        }

        let ended_at = Utc::now();
        let ride_ids: Vec<Uuid> = open.iter().map(|t| t.id).collect();
        let closed_transactions = self.store.close_trip(&vehicle.id, &ride_ids, ended_at).await?;

        tracing::info!(
            driver_id,
            vehicle_id,
            closed = closed_transactions,
            "shared vehicle trip ended"
        );

        Ok(TripClosure {
            ended_at,
            closed_transactions,
        })
    }

    /// The vehicle and the riders currently on board.
    pub async fn shared_vehicle_passengers(
        &self,
        vehicle_id: &str,
    ) -> Result<(SharedVehicle, Vec<i32>), AppError> {
        let vehicle = self
            .store
            .shared_vehicle_by_id(vehicle_id)
            .await?
            .ok_or_else(|| AppError::not_found("Shared vehicle", vehicle_id))?;
        let passengers = self.store.passengers(&vehicle.id).await?;
        Ok((vehicle, passengers))
    }

    /// The driver counts as a rider: a trip seats at most `capacity` people.
    async fn ensure_seat_free(&self, vehicle: &SharedVehicle) -> Result<(), AppError> {
        let on_board = self.store.passengers(&vehicle.id).await?;
        if on_board.len() >= usize::try_from(vehicle.capacity).unwrap_or(0) {
            return Err(AppError::invalid_operation(
                "Shared vehicle has reached its maximum capacity",
            ));
        }
        Ok(())
    }

    async fn existing_shared_vehicle(&self, vehicle_id: &str) -> Result<SharedVehicle, AppError> {
        self.store
            .shared_vehicle_by_id(vehicle_id)
            .await?
            .ok_or_else(|| AppError::invalid_operation("Shared vehicle does not exist"))
    }

    // ---- Riders -----------------------------------------------------------

    /// All rides of a rider, newest first.
    pub async fn user_transportation_transactions(
        &self,
        user_id: i32,
    ) -> Result<Outcome<Vec<TransportationTransaction>>, AppError> {
        if self.is_user_disabled(user_id).await? {
            return Ok(Outcome::Declined);
        }
        Ok(Outcome::Completed(self.store.transactions_for_user(user_id).await?))
    }

    /// All payments of a rider, newest first.
    pub async fn user_payment_transactions(
        &self,
        user_id: i32,
    ) -> Result<Outcome<Vec<PaymentTransaction>>, AppError> {
        if self.is_user_disabled(user_id).await? {
            return Ok(Outcome::Declined);
        }
        Ok(Outcome::Completed(self.store.payments_for_user(user_id).await?))
    }

    /// Disable or re-enable a rider.
    pub async fn set_user_disabled(&self, user_id: i32, disabled: bool) -> Result<User, AppError> {
        let _locks = self.locks.acquire([LockKey::User(user_id)]).await;

        let user = self
            .store
            .set_user_disabled(user_id, disabled)
            .await?
            .ok_or(AppError::UserNotFound(user_id))?;

        tracing::info!(user_id, disabled, "user status changed");

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            user::PaymentMethod,
            vehicle::{Bike, Shuttle},
        },
        store::MemoryStore,
    };

    fn manager_over(store: Arc<MemoryStore>) -> RentalManager {
        RentalManager::new(store, Duration::hours(1))
    }

    fn campus() -> (Arc<MemoryStore>, RentalManager) {
        let store = Arc::new(MemoryStore::with_campus_fleet());
        let manager = manager_over(store.clone());
        (store, manager)
    }

    fn rider(id: i32, card_id: i32, is_state_funded: bool) -> User {
        User {
            id,
            name: format!("Rider {id}"),
            is_disabled: false,
            is_state_funded,
            card_id,
        }
    }

    fn carpool(id: &str, capacity: i32) -> SharedVehicle {
        SharedVehicle {
            id: id.to_string(),
            name: format!("Carpool {id}"),
            is_available: true,
            price_cents: 300,
            capacity,
            driver_id: None,
        }
    }

    async fn ledger_sizes(store: &MemoryStore, user_id: i32) -> (usize, usize) {
        (
            store.transactions_for_user(user_id).await.unwrap().len(),
            store.payments_for_user(user_id).await.unwrap().len(),
        )
    }

    #[tokio::test]
    async fn disabled_user_is_declined_without_writes() {
        let (store, manager) = campus();

        assert!(manager.board_shuttle(3, "SHUT001").await.unwrap().is_declined());
        assert!(manager.rent_bike(3, "BIKE001").await.unwrap().is_declined());
        assert!(
            manager
                .end_bike_rental(3, "BIKE001", Utc::now())
                .await
                .unwrap()
                .is_declined()
        );
        assert!(
            manager
                .create_shared_vehicle_trip(3, "SHARE001", Utc::now())
                .await
                .unwrap()
                .is_declined()
        );
        assert!(
            manager
                .rent_shared_vehicle(3, "SHARE001", 1)
                .await
                .unwrap()
                .is_declined()
        );

        assert_eq!(ledger_sizes(&store, 3).await, (0, 0));
        assert!(store.bike_by_id("BIKE001").await.unwrap().unwrap().is_available);
        let vehicle = store.shared_vehicle_by_id("SHARE001").await.unwrap().unwrap();
        assert!(vehicle.is_available);
        assert_eq!(vehicle.driver_id, None);
        assert!(store.passengers("SHARE001").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let (_, manager) = campus();

        assert!(matches!(
            manager.rent_bike(99, "BIKE001").await,
            Err(AppError::UserNotFound(99))
        ));
        assert!(matches!(
            manager.is_user_disabled(99).await,
            Err(AppError::UserNotFound(99))
        ));
    }

    #[tokio::test]
    async fn eligibility_checks_report_user_flags() {
        let (_, manager) = campus();

        assert!(manager.is_user_disabled(3).await.unwrap());
        assert!(!manager.is_user_disabled(2).await.unwrap());
        assert!(manager.is_user_state_funded(1).await.unwrap());
        assert!(!manager.is_user_state_funded(2).await.unwrap());
        assert!(!manager.has_active_rental(2).await.unwrap());
    }

    #[tokio::test]
    async fn second_rental_conflicts_until_the_first_ends() {
        let (store, manager) = campus();

        let started = manager.rent_bike(2, "BIKE001").await.unwrap();
        assert!(matches!(started, Outcome::Completed(_)));
        assert!(manager.has_active_rental(2).await.unwrap());

        assert!(matches!(
            manager.rent_bike(2, "BIKE002").await,
            Err(AppError::InvalidOperation(_))
        ));
        assert!(matches!(
            manager.board_shuttle(2, "SHUT001").await,
            Err(AppError::InvalidOperation(_))
        ));
        assert!(matches!(
            manager.rent_shared_vehicle(2, "SHARE001", 1).await,
            Err(AppError::InvalidOperation(_))
        ));

        let open: Vec<_> = store
            .transactions_for_user(2)
            .await
            .unwrap()
            .into_iter()
            .filter(TransportationTransaction::is_open)
            .collect();
        assert_eq!(open.len(), 1);
        assert!(store.bike_by_id("BIKE002").await.unwrap().unwrap().is_available);
    }

    #[tokio::test]
    async fn rent_then_end_round_trip() {
        let (store, manager) = campus();

        let Outcome::Completed(start) = manager.rent_bike(2, "BIKE002").await.unwrap() else {
            panic!("rental was declined");
        };
        assert!(!store.bike_by_id("BIKE002").await.unwrap().unwrap().is_available);

        let provisional = store.latest_payment_for_user(2).await.unwrap().unwrap();
        assert_eq!(provisional.amount_cents, 400);
        assert_eq!(provisional.method, PaymentMethod::BankTransfer);

        let end = start + Duration::minutes(90);
        let Outcome::Completed(receipt) = manager.end_bike_rental(2, "BIKE002", end).await.unwrap()
        else {
            panic!("end was declined");
        };
        assert_eq!(receipt.billed_hours, 2);
        assert_eq!(receipt.amount_cents, 800);

        assert!(store.bike_by_id("BIKE002").await.unwrap().unwrap().is_available);
        let rental = store.latest_transaction_for_bike("BIKE002").await.unwrap().unwrap();
        let closed_at = rental.rental_end_time.unwrap();
        assert!(closed_at >= rental.rental_start_time);
        assert!(!manager.has_active_rental(2).await.unwrap());
        assert_eq!(
            store.latest_payment_for_user(2).await.unwrap().unwrap().amount_cents,
            800
        );
    }

    #[tokio::test]
    async fn bike_rental_billed_in_started_hours() {
        let store = Arc::new(MemoryStore::new());
        store.insert_card(Card {
            id: 1,
            payment_method: PaymentMethod::CreditCard,
        });
        store.insert_user(rider(1, 1, false));
        store.insert_bike(Bike {
            id: "B1".to_string(),
            name: "Bike".to_string(),
            is_available: true,
            price_cents: 250,
        });
        let manager = manager_over(store.clone());

        let Outcome::Completed(start) = manager.rent_bike(1, "B1").await.unwrap() else {
            panic!("rental was declined");
        };
        let end = start + Duration::hours(3) + Duration::minutes(1);
        let Outcome::Completed(receipt) = manager.end_bike_rental(1, "B1", end).await.unwrap() else {
            panic!("end was declined");
        };

        assert_eq!(receipt.billed_hours, 4);
        assert_eq!(receipt.amount_cents, 1000);

        let payment = store.latest_payment_for_user(1).await.unwrap().unwrap();
        assert_eq!(payment.amount_cents, 1000);
        assert!(!payment.is_refund);
        assert_eq!(payment.method, PaymentMethod::CreditCard);
    }

    #[tokio::test]
    async fn end_before_start_is_rejected_without_writes() {
        let (store, manager) = campus();

        let Outcome::Completed(start) = manager.rent_bike(2, "BIKE001").await.unwrap() else {
            panic!("rental was declined");
        };

        for end in [start, start - Duration::minutes(10)] {
            assert!(matches!(
                manager.end_bike_rental(2, "BIKE001", end).await,
                Err(AppError::InvalidOperation(_))
            ));
        }

        let rental = store.latest_transaction_for_bike("BIKE001").await.unwrap().unwrap();
        assert!(rental.is_open());
        assert_eq!(
            store.latest_payment_for_user(2).await.unwrap().unwrap().amount_cents,
            250
        );
        assert!(!store.bike_by_id("BIKE001").await.unwrap().unwrap().is_available);
    }

    #[tokio::test]
    async fn only_the_renter_can_end_a_bike_rental() {
        let (_, manager) = campus();

        manager.rent_bike(2, "BIKE001").await.unwrap();

        assert!(matches!(
            manager.end_bike_rental(4, "BIKE001", Utc::now()).await,
            Err(AppError::InvalidOperation(_))
        ));
        assert!(matches!(
            manager.end_bike_rental(2, "BIKE404", Utc::now()).await,
            Err(AppError::InvalidOperation(_))
        ));
    }

    #[tokio::test]
    async fn unavailable_or_unknown_bike_conflicts() {
        let (store, manager) = campus();

        store.insert_bike(Bike {
            is_available: false,
            ..store.bike_by_id("BIKE001").await.unwrap().unwrap()
        });
        assert!(matches!(
            manager.rent_bike(2, "BIKE001").await,
            Err(AppError::InvalidOperation(_))
        ));
        assert!(matches!(
            manager.rent_bike(2, "BIKE404").await,
            Err(AppError::InvalidOperation(_))
        ));
    }

    #[tokio::test]
    async fn bike_with_open_rental_conflicts_even_if_flagged_available() {
        let (store, manager) = campus();

        manager.rent_bike(2, "BIKE001").await.unwrap();
        store.insert_bike(Bike {
            is_available: true,
            ..store.bike_by_id("BIKE001").await.unwrap().unwrap()
        });

        assert!(matches!(
            manager.rent_bike(4, "BIKE001").await,
            Err(AppError::InvalidOperation(_))
        ));
        assert_eq!(ledger_sizes(&store, 4).await, (0, 0));
    }

    #[tokio::test]
    async fn failed_payment_leaves_no_rental_behind() {
        let store = Arc::new(MemoryStore::with_campus_fleet());
        store.insert_bike(Bike {
            id: "BROKEN".to_string(),
            name: "Mispriced bike".to_string(),
            is_available: true,
            price_cents: -1,
        });
        let manager = manager_over(store.clone());

        assert!(manager.rent_bike(2, "BROKEN").await.is_err());

        assert!(!manager.has_active_rental(2).await.unwrap());
        assert_eq!(ledger_sizes(&store, 2).await, (0, 0));
        assert!(store.bike_by_id("BROKEN").await.unwrap().unwrap().is_available);

        // The rider is not stuck and can rent another bike
        assert!(matches!(
            manager.rent_bike(2, "BIKE001").await.unwrap(),
            Outcome::Completed(_)
        ));
    }

    #[tokio::test]
    async fn rider_without_card_conflicts() {
        let store = Arc::new(MemoryStore::with_campus_fleet());
        store.insert_user(rider(10, 77, false));
        let manager = manager_over(store.clone());

        assert!(matches!(
            manager.rent_bike(10, "BIKE001").await,
            Err(AppError::InvalidOperation(_))
        ));
        assert!(matches!(
            manager.board_shuttle(10, "SHUT001").await,
            Err(AppError::InvalidOperation(_))
        ));
        assert_eq!(ledger_sizes(&store, 10).await, (0, 0));
        assert!(store.bike_by_id("BIKE001").await.unwrap().unwrap().is_available);
    }

    #[tokio::test]
    async fn state_funded_shuttle_ride_is_a_refund() {
        let (store, manager) = campus();

        let Outcome::Completed(boarding) = manager.board_shuttle(1, "SHUT001").await.unwrap() else {
            panic!("boarding was declined");
        };

        assert!(boarding.payment.is_refund);
        assert_eq!(boarding.payment.amount_cents, 150);
        assert_eq!(boarding.payment.method, PaymentMethod::CreditCard);
        assert_eq!(
            boarding.transaction.rental_end_time,
            Some(boarding.transaction.rental_start_time + Duration::hours(1))
        );

        // Pre-closed ride leaves the rider free and the shuttle open
        assert!(!manager.has_active_rental(1).await.unwrap());
        assert!(store.shuttle_by_id("SHUT001").await.unwrap().unwrap().is_available);
        assert!(matches!(
            manager.board_shuttle(4, "SHUT001").await.unwrap(),
            Outcome::Completed(_)
        ));
    }

    #[tokio::test]
    async fn shuttle_allotment_must_move_time_forward() {
        for allotment in [Duration::minutes(-30), Duration::zero(), Duration::MAX] {
            let store = Arc::new(MemoryStore::with_campus_fleet());
            let manager = RentalManager::new(store.clone(), allotment);

            assert!(matches!(
                manager.board_shuttle(2, "SHUT001").await,
                Err(AppError::Internal(_))
            ));
            assert_eq!(ledger_sizes(&store, 2).await, (0, 0));
        }
    }

    #[tokio::test]
    async fn unavailable_shuttle_conflicts() {
        let store = Arc::new(MemoryStore::with_campus_fleet());
        store.insert_shuttle(Shuttle {
            id: "SHUT009".to_string(),
            name: "Night Shuttle".to_string(),
            is_available: false,
            price_cents: 100,
        });
        let manager = manager_over(store.clone());

        assert!(matches!(
            manager.board_shuttle(2, "SHUT009").await,
            Err(AppError::InvalidOperation(_))
        ));
        assert!(matches!(
            manager.board_shuttle(2, "SHUT404").await,
            Err(AppError::InvalidOperation(_))
        ));
        assert_eq!(ledger_sizes(&store, 2).await, (0, 0));
    }

    #[tokio::test]
    async fn driver_opens_trip_without_payment() {
        let (store, manager) = campus();
        let start = Utc::now();

        let Outcome::Completed(transaction) = manager
            .create_shared_vehicle_trip(1, "SHARE001", start)
            .await
            .unwrap()
        else {
            panic!("trip was declined");
        };
        assert!(transaction.is_open());
        assert_eq!(transaction.rental_start_time, start);

        let vehicle = store.shared_vehicle_by_id("SHARE001").await.unwrap().unwrap();
        assert!(!vehicle.is_available);
        assert_eq!(vehicle.driver_id, Some(1));
        assert_eq!(store.passengers("SHARE001").await.unwrap(), vec![1]);
        assert_eq!(ledger_sizes(&store, 1).await, (1, 0));

        assert!(matches!(
            manager.create_shared_vehicle_trip(2, "SHARE001", start).await,
            Err(AppError::InvalidOperation(_))
        ));
    }

    #[tokio::test]
    async fn passenger_pays_the_vehicle_price() {
        let (store, manager) = campus();

        manager
            .create_shared_vehicle_trip(1, "SHARE001", Utc::now())
            .await
            .unwrap();
        let joined = manager.rent_shared_vehicle(2, "SHARE001", 1).await.unwrap();
        assert!(matches!(joined, Outcome::Completed(_)));

        let payment = store.latest_payment_for_user(2).await.unwrap().unwrap();
        assert_eq!(payment.amount_cents, 300);
        assert!(!payment.is_refund);
        assert!(manager.has_active_rental(2).await.unwrap());
        assert_eq!(store.passengers("SHARE001").await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn full_vehicle_rejects_passengers() {
        let store = Arc::new(MemoryStore::with_campus_fleet());
        store.insert_shared_vehicle(carpool("DUO", 2));
        let manager = manager_over(store.clone());

        manager.create_shared_vehicle_trip(1, "DUO", Utc::now()).await.unwrap();
        manager.rent_shared_vehicle(2, "DUO", 1).await.unwrap();

        assert!(matches!(
            manager.rent_shared_vehicle(4, "DUO", 1).await,
            Err(AppError::InvalidOperation(_))
        ));
        assert_eq!(ledger_sizes(&store, 4).await, (0, 0));
        assert_eq!(store.passengers("DUO").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn late_driver_cannot_overfill_the_vehicle() {
        let store = Arc::new(MemoryStore::with_campus_fleet());
        store.insert_shared_vehicle(carpool("DUO", 2));
        let manager = manager_over(store.clone());

        manager.rent_shared_vehicle(2, "DUO", 1).await.unwrap();
        manager.rent_shared_vehicle(4, "DUO", 1).await.unwrap();

        assert!(matches!(
            manager.create_shared_vehicle_trip(1, "DUO", Utc::now()).await,
            Err(AppError::InvalidOperation(_))
        ));
        assert_eq!(store.passengers("DUO").await.unwrap(), vec![2, 4]);
        assert_eq!(ledger_sizes(&store, 1).await, (0, 0));
        assert!(store.shared_vehicle_by_id("DUO").await.unwrap().unwrap().is_available);
    }

    #[tokio::test]
    async fn only_the_driver_ends_the_trip() {
        let (store, manager) = campus();

        manager
            .create_shared_vehicle_trip(1, "SHARE001", Utc::now())
            .await
            .unwrap();
        manager.rent_shared_vehicle(2, "SHARE001", 1).await.unwrap();

        assert!(matches!(
            manager.end_shared_vehicle_rental("SHARE001", 2).await,
            Err(AppError::NotDriver)
        ));
        assert!(manager.has_active_rental(1).await.unwrap());
        assert!(!store.shared_vehicle_by_id("SHARE001").await.unwrap().unwrap().is_available);
    }

    #[tokio::test]
    async fn ending_a_trip_closes_every_rider() {
        let (store, manager) = campus();

        manager
            .create_shared_vehicle_trip(1, "SHARE002", Utc::now())
            .await
            .unwrap();
        manager.rent_shared_vehicle(2, "SHARE002", 1).await.unwrap();
        manager.rent_shared_vehicle(4, "SHARE002", 1).await.unwrap();

        let closure = manager.end_shared_vehicle_rental("SHARE002", 1).await.unwrap();
        assert_eq!(closure.closed_transactions, 3);

        for user_id in [1, 2, 4] {
            assert!(!manager.has_active_rental(user_id).await.unwrap());
        }
        let vehicle = store.shared_vehicle_by_id("SHARE002").await.unwrap().unwrap();
        assert!(vehicle.is_available);
        assert_eq!(vehicle.driver_id, None);
        assert!(store.passengers("SHARE002").await.unwrap().is_empty());

        // Vehicle is reusable once reset
        assert!(matches!(
            manager
                .create_shared_vehicle_trip(2, "SHARE002", Utc::now())
                .await
                .unwrap(),
            Outcome::Completed(_)
        ));
    }

    #[tokio::test]
    async fn ending_without_active_trip_conflicts() {
        let store = Arc::new(MemoryStore::with_campus_fleet());
        store.insert_shared_vehicle(SharedVehicle {
            driver_id: Some(1),
            ..carpool("IDLE", 4)
        });
        let manager = manager_over(store);

        assert!(matches!(
            manager.end_shared_vehicle_rental("IDLE", 1).await,
            Err(AppError::InvalidOperation(_))
        ));
        assert!(matches!(
            manager.end_shared_vehicle_rental("NOPE", 1).await,
            Err(AppError::InvalidOperation(_))
        ));
    }

    #[tokio::test]
    async fn passenger_can_name_a_late_driver() {
        let (store, manager) = campus();

        manager.rent_shared_vehicle(2, "SHARE001", 4).await.unwrap();
        let vehicle = store.shared_vehicle_by_id("SHARE001").await.unwrap().unwrap();
        assert_eq!(vehicle.driver_id, Some(4));

        let closure = manager.end_shared_vehicle_rental("SHARE001", 4).await.unwrap();
        assert_eq!(closure.closed_transactions, 1);
        assert!(!manager.has_active_rental(2).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_driver_conflicts_without_writes() {
        let (store, manager) = campus();

        assert!(matches!(
            manager.rent_shared_vehicle(2, "SHARE001", 42).await,
            Err(AppError::InvalidOperation(_))
        ));
        assert_eq!(ledger_sizes(&store, 2).await, (0, 0));
        let vehicle = store.shared_vehicle_by_id("SHARE001").await.unwrap().unwrap();
        assert_eq!(vehicle.driver_id, None);
    }

    #[tokio::test]
    async fn history_is_newest_first() {
        let (_, manager) = campus();

        manager.board_shuttle(2, "SHUT001").await.unwrap();
        let Outcome::Completed(start) = manager.rent_bike(2, "BIKE001").await.unwrap() else {
            panic!("rental was declined");
        };
        manager
            .end_bike_rental(2, "BIKE001", start + Duration::minutes(20))
            .await
            .unwrap();

        let Outcome::Completed(rides) = manager.user_transportation_transactions(2).await.unwrap()
        else {
            panic!("history was declined");
        };
        assert_eq!(rides.len(), 2);
        assert!(rides[0].date >= rides[1].date);
        assert!(rides[0].bike_id.is_some());

        let Outcome::Completed(payments) = manager.user_payment_transactions(2).await.unwrap() else {
            panic!("history was declined");
        };
        assert_eq!(payments.len(), 2);
        assert!(payments[0].date >= payments[1].date);
    }

    #[tokio::test]
    async fn history_queries_respect_user_status() {
        let (_, manager) = campus();

        let Outcome::Completed(empty) = manager.user_payment_transactions(4).await.unwrap() else {
            panic!("history was declined");
        };
        assert!(empty.is_empty());

        assert!(
            manager
                .user_transportation_transactions(3)
                .await
                .unwrap()
                .is_declined()
        );
        assert!(matches!(
            manager.user_payment_transactions(99).await,
            Err(AppError::UserNotFound(99))
        ));
    }

    #[tokio::test]
    async fn disabling_a_user_blocks_new_rentals() {
        let (_, manager) = campus();

        let user = manager.set_user_disabled(2, true).await.unwrap();
        assert!(user.is_disabled);
        assert!(manager.rent_bike(2, "BIKE001").await.unwrap().is_declined());

        manager.set_user_disabled(2, false).await.unwrap();
        assert!(matches!(
            manager.rent_bike(2, "BIKE001").await.unwrap(),
            Outcome::Completed(_)
        ));

        assert!(matches!(
            manager.set_user_disabled(99, true).await,
            Err(AppError::UserNotFound(99))
        ));
    }

    #[tokio::test]
    async fn concurrent_rentals_of_one_bike_admit_one_rider() {
        let (store, manager) = campus();
        let manager = Arc::new(manager);

        let first = tokio::spawn({
            let manager = manager.clone();
            async move { manager.rent_bike(2, "BIKE001").await }
        });
        let second = tokio::spawn({
            let manager = manager.clone();
            async move { manager.rent_bike(4, "BIKE001").await }
        });

        let results = [first.await.unwrap(), second.await.unwrap()];
        let admitted = results
            .iter()
            .filter(|r| matches!(r, Ok(Outcome::Completed(_))))
            .count();
        let rejected = results
            .iter()
            .filter(|r| matches!(r, Err(AppError::InvalidOperation(_))))
            .count();
        assert_eq!((admitted, rejected), (1, 1));

        let mut open_rentals = 0;
        for user_id in [2, 4] {
            if store.active_transaction_for_user(user_id).await.unwrap().is_some() {
                open_rentals += 1;
            }
        }
        assert_eq!(open_rentals, 1);
    }
}
