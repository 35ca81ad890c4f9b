//! In-memory implementation of [`RentalStore`].
//!
//! Used when no database is configured and as the store behind the rule tests.

use std::sync::{PoisonError, RwLock, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::{RentalStore, StoreResult};
use crate::{
    error::AppError,
    models::{
        transaction::{
            NewPaymentTransaction, NewTransportationTransaction, PaymentRevision,
            PaymentTransaction, TransportationTransaction, VehicleRef,
        },
        user::{Card, PaymentMethod, User},
        vehicle::{Bike, SharedVehicle, Shuttle},
    },
};

/// Entity tables in `DashMap`s, the two ledgers as append-only vectors in
/// insertion order.
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<i32, User>,
    cards: DashMap<i32, Card>,
    bikes: DashMap<String, Bike>,
    shuttles: DashMap<String, Shuttle>,
    shared_vehicles: DashMap<String, SharedVehicle>,
    passengers: DashMap<String, Vec<i32>>,
    transactions: RwLock<Vec<TransportationTransaction>>,
    payments: RwLock<Vec<PaymentTransaction>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with the demo riders and fleet, mirroring the seed migration.
    pub fn with_campus_fleet() -> Self {
        let store = Self::new();

        let cards = [
            (1, PaymentMethod::CreditCard),
            (2, PaymentMethod::BankTransfer),
            (3, PaymentMethod::CreditCard),
            (4, PaymentMethod::BankTransfer),
        ];
        for (id, payment_method) in cards {
            store.insert_card(Card { id, payment_method });
        }

        let users = [
            (1, "Jean Martin", false, true),
            (2, "Marie Dubois", false, false),
            (3, "Paul Bernard", true, true),
            (4, "Sophie Lambert", false, true),
        ];
        for (id, name, is_disabled, is_state_funded) in users {
            store.insert_user(User {
                id,
                name: name.to_string(),
                is_disabled,
                is_state_funded,
                card_id: id,
            });
        }

        store.insert_bike(bike("BIKE001", "Classic Bike 1", 250));
        store.insert_bike(bike("BIKE002", "Electric Bike 1", 400));

        store.insert_shuttle(shuttle("SHUT001", "Campus-Downtown Shuttle", 150));
        store.insert_shuttle(shuttle("SHUT002", "Campus-Station Shuttle", 200));

        store.insert_shared_vehicle(shared_vehicle("SHARE001", "Campus Carpool 1", 300, 4));
        store.insert_shared_vehicle(shared_vehicle("SHARE002", "Campus Carpool 2", 300, 6));

        store
    }

    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn insert_card(&self, card: Card) {
        self.cards.insert(card.id, card);
    }

    pub fn insert_bike(&self, bike: Bike) {
        self.bikes.insert(bike.id.clone(), bike);
    }

    pub fn insert_shuttle(&self, shuttle: Shuttle) {
        self.shuttles.insert(shuttle.id.clone(), shuttle);
    }

    pub fn insert_shared_vehicle(&self, vehicle: SharedVehicle) {
        self.shared_vehicles.insert(vehicle.id.clone(), vehicle);
    }

    /// Write section over both ledgers, always taken in this order.
    fn ledgers(
        &self,
    ) -> (
        RwLockWriteGuard<'_, Vec<TransportationTransaction>>,
        RwLockWriteGuard<'_, Vec<PaymentTransaction>>,
    ) {
        let transactions = self.transactions.write().unwrap_or_else(PoisonError::into_inner);
        let payments = self.payments.write().unwrap_or_else(PoisonError::into_inner);
        (transactions, payments)
    }

    fn seat(&self, vehicle_id: &str, user_id: i32) {
        let mut on_board = self.passengers.entry(vehicle_id.to_string()).or_default();
        if !on_board.contains(&user_id) {
            on_board.push(user_id);
        }
    }

    fn matching_transactions(
        &self,
        keep: impl Fn(&TransportationTransaction) -> bool,
    ) -> Vec<TransportationTransaction> {
        let transactions = self.transactions.read().unwrap_or_else(PoisonError::into_inner);
        transactions.iter().filter(|t| keep(t)).cloned().collect()
    }

    fn matching_payments(&self, keep: impl Fn(&PaymentTransaction) -> bool) -> Vec<PaymentTransaction> {
        let payments = self.payments.read().unwrap_or_else(PoisonError::into_inner);
        payments.iter().filter(|p| keep(p)).cloned().collect()
    }
}

fn bike(id: &str, name: &str, price_cents: i64) -> Bike {
    Bike {
        id: id.to_string(),
        name: name.to_string(),
        is_available: true,
        price_cents,
    }
}

fn shuttle(id: &str, name: &str, price_cents: i64) -> Shuttle {
    Shuttle {
        id: id.to_string(),
        name: name.to_string(),
        is_available: true,
        price_cents,
    }
}

fn shared_vehicle(id: &str, name: &str, price_cents: i64, capacity: i32) -> SharedVehicle {
    SharedVehicle {
        id: id.to_string(),
        name: name.to_string(),
        is_available: true,
        price_cents,
        capacity,
        driver_id: None,
    }
}

/// Newest first; among equal dates the later insertion comes first.
fn newest_first<T>(mut records: Vec<T>, date: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    records.reverse();
    records.sort_by_key(|r| std::cmp::Reverse(date(r)));
    records
}

#[async_trait]
impl RentalStore for MemoryStore {
    async fn user_by_id(&self, user_id: i32) -> StoreResult<Option<User>> {
        Ok(self.users.get(&user_id).map(|u| u.clone()))
    }

    async fn card_by_id(&self, card_id: i32) -> StoreResult<Option<Card>> {
        Ok(self.cards.get(&card_id).map(|c| c.clone()))
    }

    async fn set_user_disabled(&self, user_id: i32, disabled: bool) -> StoreResult<Option<User>> {
        Ok(self.users.get_mut(&user_id).map(|mut user| {
            user.is_disabled = disabled;
            user.clone()
        }))
    }

    async fn bike_by_id(&self, bike_id: &str) -> StoreResult<Option<Bike>> {
        Ok(self.bikes.get(bike_id).map(|b| b.clone()))
    }

    async fn shuttle_by_id(&self, shuttle_id: &str) -> StoreResult<Option<Shuttle>> {
        Ok(self.shuttles.get(shuttle_id).map(|s| s.clone()))
    }

    async fn shared_vehicle_by_id(&self, vehicle_id: &str) -> StoreResult<Option<SharedVehicle>> {
        Ok(self.shared_vehicles.get(vehicle_id).map(|v| v.clone()))
    }

    async fn passengers(&self, vehicle_id: &str) -> StoreResult<Vec<i32>> {
        Ok(self
            .passengers
            .get(vehicle_id)
            .map(|p| p.clone())
            .unwrap_or_default())
    }

    async fn active_transaction_for_user(
        &self,
        user_id: i32,
    ) -> StoreResult<Option<TransportationTransaction>> {
        Ok(self
            .matching_transactions(|t| t.user_id == user_id && t.is_open())
            .into_iter()
            .next())
    }

    async fn latest_transaction_for_bike(
        &self,
        bike_id: &str,
    ) -> StoreResult<Option<TransportationTransaction>> {
        let for_bike = self.matching_transactions(|t| t.bike_id.as_deref() == Some(bike_id));
        Ok(newest_first(for_bike, |t| t.date).into_iter().next())
    }

    async fn transactions_for_shared_vehicle(
        &self,
        vehicle_id: &str,
    ) -> StoreResult<Vec<TransportationTransaction>> {
        Ok(self.matching_transactions(|t| t.shared_vehicle_id.as_deref() == Some(vehicle_id)))
    }

    async fn transactions_for_user(&self, user_id: i32) -> StoreResult<Vec<TransportationTransaction>> {
        let for_user = self.matching_transactions(|t| t.user_id == user_id);
        Ok(newest_first(for_user, |t| t.date))
    }

    async fn latest_payment_for_user(&self, user_id: i32) -> StoreResult<Option<PaymentTransaction>> {
        let for_user = self.matching_payments(|p| p.user_id == user_id);
        Ok(newest_first(for_user, |p| p.date).into_iter().next())
    }

    async fn payments_for_user(&self, user_id: i32) -> StoreResult<Vec<PaymentTransaction>> {
        let for_user = self.matching_payments(|p| p.user_id == user_id);
        Ok(newest_first(for_user, |p| p.date))
    }

    async fn record_boarding(
        &self,
        ride: NewTransportationTransaction,
        payment: NewPaymentTransaction,
    ) -> StoreResult<(TransportationTransaction, PaymentTransaction)> {
        check_payment(&payment)?;

        let (mut transactions, mut payments) = self.ledgers();
        let ride = transaction_record(ride);
        let payment = payment_record(payment);
        transactions.push(ride.clone());
        payments.push(payment.clone());

        Ok((ride, payment))
    }

    async fn start_bike_rental(
        &self,
        bike_id: &str,
        rental: NewTransportationTransaction,
        payment: NewPaymentTransaction,
    ) -> StoreResult<TransportationTransaction> {
        check_payment(&payment)?;
        let mut bike = self
            .bikes
            .get_mut(bike_id)
            .ok_or_else(|| AppError::not_found("Bike", bike_id))?;

        let (mut transactions, mut payments) = self.ledgers();
        let rental = transaction_record(rental);
        transactions.push(rental.clone());
        payments.push(payment_record(payment));
        bike.is_available = false;

        Ok(rental)
    }

    async fn finish_bike_rental(
        &self,
        bike_id: &str,
        rental_id: Uuid,
        end_time: DateTime<Utc>,
        revision: Option<PaymentRevision>,
    ) -> StoreResult<()> {
        let mut bike = self
            .bikes
            .get_mut(bike_id)
            .ok_or_else(|| AppError::not_found("Bike", bike_id))?;

        let (mut transactions, mut payments) = self.ledgers();
        let rental = position_of_transaction(&transactions, rental_id)?;
        let payment = revision
            .map(|r| {
                payments
                    .iter()
                    .position(|p| p.id == r.payment_id)
                    .map(|index| (index, r.amount_cents))
                    .ok_or_else(|| AppError::not_found("Payment", r.payment_id))
            })
            .transpose()?;

        transactions[rental].rental_end_time = Some(end_time);
        if let Some((index, amount_cents)) = payment {
            payments[index].amount_cents = amount_cents;
        }
        bike.is_available = true;

        Ok(())
    }

    async fn open_trip(
        &self,
        vehicle_id: &str,
        driver_id: i32,
        ride: NewTransportationTransaction,
    ) -> StoreResult<TransportationTransaction> {
        let mut vehicle = self
            .shared_vehicles
            .get_mut(vehicle_id)
            .ok_or_else(|| AppError::not_found("Shared vehicle", vehicle_id))?;

        let (mut transactions, _payments) = self.ledgers();
        let ride = transaction_record(ride);
        transactions.push(ride.clone());
        self.seat(vehicle_id, driver_id);
        vehicle.driver_id = Some(driver_id);
        vehicle.is_available = false;

        Ok(ride)
    }

    async fn join_trip(
        &self,
        vehicle_id: &str,
        driver_id: i32,
        ride: NewTransportationTransaction,
        payment: NewPaymentTransaction,
    ) -> StoreResult<TransportationTransaction> {
        check_payment(&payment)?;
        let mut vehicle = self
            .shared_vehicles
            .get_mut(vehicle_id)
            .ok_or_else(|| AppError::not_found("Shared vehicle", vehicle_id))?;

        let (mut transactions, mut payments) = self.ledgers();
        let ride = transaction_record(ride);
        let passenger = ride.user_id;
        transactions.push(ride.clone());
        payments.push(payment_record(payment));
        self.seat(vehicle_id, passenger);
        vehicle.driver_id = Some(driver_id);

        Ok(ride)
    }

    async fn close_trip(
        &self,
        vehicle_id: &str,
        ride_ids: &[Uuid],
        end_time: DateTime<Utc>,
    ) -> StoreResult<usize> {
        let mut vehicle = self
            .shared_vehicles
            .get_mut(vehicle_id)
            .ok_or_else(|| AppError::not_found("Shared vehicle", vehicle_id))?;

        let (mut transactions, _payments) = self.ledgers();
        let rides = ride_ids
            .iter()
            .map(|id| position_of_transaction(&transactions, *id))
            .collect::<StoreResult<Vec<usize>>>()?;

        for &index in &rides {
            transactions[index].rental_end_time = Some(end_time);
        }
        self.passengers.remove(vehicle_id);
        vehicle.driver_id = None;
        vehicle.is_available = true;

        Ok(rides.len())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

fn transaction_record(new: NewTransportationTransaction) -> TransportationTransaction {
    let mut record = TransportationTransaction {
        id: Uuid::new_v4(),
        user_id: new.user_id,
        shuttle_id: None,
        bike_id: None,
        shared_vehicle_id: None,
        date: new.date,
        rental_start_time: new.rental_start_time,
        rental_end_time: new.rental_end_time,
    };
    match new.vehicle {
        VehicleRef::Shuttle(id) => record.shuttle_id = Some(id),
        VehicleRef::Bike(id) => record.bike_id = Some(id),
        VehicleRef::SharedVehicle(id) => record.shared_vehicle_id = Some(id),
    }
    record
}

fn payment_record(new: NewPaymentTransaction) -> PaymentTransaction {
    PaymentTransaction {
        id: Uuid::new_v4(),
        user_id: new.user_id,
        amount_cents: new.amount_cents,
        date: new.date,
        method: new.method,
        is_refund: new.is_refund,
    }
}

/// Same rule as the `amount_cents >= 0` column check.
fn check_payment(payment: &NewPaymentTransaction) -> StoreResult<()> {
    if payment.amount_cents < 0 {
        return Err(AppError::invalid_operation("Payment amount must not be negative"));
    }
    Ok(())
}

fn position_of_transaction(
    transactions: &[TransportationTransaction],
    transaction_id: Uuid,
) -> StoreResult<usize> {
    transactions
        .iter()
        .position(|t| t.id == transaction_id)
        .ok_or_else(|| AppError::not_found("Transportation transaction", transaction_id))
}
