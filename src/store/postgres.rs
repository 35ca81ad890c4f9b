//! Postgres implementation of [`RentalStore`] on top of sqlx.
//!
//! Each write method runs in one database transaction; a missing row rolls
//! it back and reports `NotFound`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::{RentalStore, StoreResult};
use crate::{
    db::DbPool,
    error::AppError,
    models::{
        transaction::{
            NewPaymentTransaction, NewTransportationTransaction, PaymentRevision,
            PaymentTransaction, TransportationTransaction, VehicleRef,
        },
        user::{Card, User},
        vehicle::{Bike, SharedVehicle, Shuttle},
    },
};

/// Store backed by Postgres; the schema lives in `migrations/`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RentalStore for PgStore {
    async fn user_by_id(&self, user_id: i32) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, is_disabled, is_state_funded, card_id FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn card_by_id(&self, card_id: i32) -> StoreResult<Option<Card>> {
        let card = sqlx::query_as::<_, Card>("SELECT id, payment_method FROM cards WHERE id = $1")
            .bind(card_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(card)
    }

    async fn set_user_disabled(&self, user_id: i32, disabled: bool) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET is_disabled = $1
            WHERE id = $2
            RETURNING id, name, is_disabled, is_state_funded, card_id
            "#,
        )
        .bind(disabled)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn bike_by_id(&self, bike_id: &str) -> StoreResult<Option<Bike>> {
        let bike = sqlx::query_as::<_, Bike>(
            "SELECT id, name, is_available, price_cents FROM bikes WHERE id = $1",
        )
        .bind(bike_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(bike)
    }

    async fn shuttle_by_id(&self, shuttle_id: &str) -> StoreResult<Option<Shuttle>> {
        let shuttle = sqlx::query_as::<_, Shuttle>(
            "SELECT id, name, is_available, price_cents FROM shuttles WHERE id = $1",
        )
        .bind(shuttle_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(shuttle)
    }

    async fn shared_vehicle_by_id(&self, vehicle_id: &str) -> StoreResult<Option<SharedVehicle>> {
        let vehicle = sqlx::query_as::<_, SharedVehicle>(
            r#"
            SELECT id, name, is_available, price_cents, capacity, driver_id
            FROM shared_vehicles
            WHERE id = $1
            "#,
        )
        .bind(vehicle_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(vehicle)
    }

    async fn passengers(&self, vehicle_id: &str) -> StoreResult<Vec<i32>> {
        let passengers = sqlx::query_scalar::<_, i32>(
            "SELECT user_id FROM shared_vehicle_passengers WHERE vehicle_id = $1 ORDER BY joined_at",
        )
        .bind(vehicle_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(passengers)
    }

    async fn active_transaction_for_user(
        &self,
        user_id: i32,
    ) -> StoreResult<Option<TransportationTransaction>> {
        let transaction = sqlx::query_as::<_, TransportationTransaction>(
            r#"
            SELECT * FROM transportation_transactions
            WHERE user_id = $1 AND rental_end_time IS NULL
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(transaction)
    }

    async fn latest_transaction_for_bike(
        &self,
        bike_id: &str,
    ) -> StoreResult<Option<TransportationTransaction>> {
        let transaction = sqlx::query_as::<_, TransportationTransaction>(
            r#"
            SELECT * FROM transportation_transactions
            WHERE bike_id = $1
            ORDER BY date DESC, rental_start_time DESC
            LIMIT 1
            "#,
        )
        .bind(bike_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(transaction)
    }

    async fn transactions_for_shared_vehicle(
        &self,
        vehicle_id: &str,
    ) -> StoreResult<Vec<TransportationTransaction>> {
        let transactions = sqlx::query_as::<_, TransportationTransaction>(
            "SELECT * FROM transportation_transactions WHERE shared_vehicle_id = $1",
        )
        .bind(vehicle_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }

    async fn transactions_for_user(&self, user_id: i32) -> StoreResult<Vec<TransportationTransaction>> {
        let transactions = sqlx::query_as::<_, TransportationTransaction>(
            "SELECT * FROM transportation_transactions WHERE user_id = $1 ORDER BY date DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }

    async fn latest_payment_for_user(&self, user_id: i32) -> StoreResult<Option<PaymentTransaction>> {
        let payment = sqlx::query_as::<_, PaymentTransaction>(
            r#"
            SELECT * FROM payment_transactions
            WHERE user_id = $1
            ORDER BY date DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    async fn payments_for_user(&self, user_id: i32) -> StoreResult<Vec<PaymentTransaction>> {
        let payments = sqlx::query_as::<_, PaymentTransaction>(
            "SELECT * FROM payment_transactions WHERE user_id = $1 ORDER BY date DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    async fn record_boarding(
        &self,
        ride: NewTransportationTransaction,
        payment: NewPaymentTransaction,
    ) -> StoreResult<(TransportationTransaction, PaymentTransaction)> {
        let mut tx = self.pool.begin().await?;

        let ride = insert_ride(&mut tx, ride).await?;
        let payment = insert_payment(&mut tx, payment).await?;

        tx.commit().await?;

        Ok((ride, payment))
    }

    async fn start_bike_rental(
        &self,
        bike_id: &str,
        rental: NewTransportationTransaction,
        payment: NewPaymentTransaction,
    ) -> StoreResult<TransportationTransaction> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE bikes SET is_available = FALSE WHERE id = $1")
            .bind(bike_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if updated == 0 {
            tx.rollback().await?;
            return Err(AppError::not_found("Bike", bike_id));
        }

        let rental = insert_ride(&mut tx, rental).await?;
        insert_payment(&mut tx, payment).await?;

        tx.commit().await?;

        Ok(rental)
    }

    async fn finish_bike_rental(
        &self,
        bike_id: &str,
        rental_id: Uuid,
        end_time: DateTime<Utc>,
        revision: Option<PaymentRevision>,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let closed = close_ride(&mut tx, rental_id, end_time).await?;
        if closed == 0 {
            tx.rollback().await?;
            return Err(AppError::not_found("Transportation transaction", rental_id));
        }

        if let Some(revision) = revision {
            let revised = sqlx::query("UPDATE payment_transactions SET amount_cents = $1 WHERE id = $2")
                .bind(revision.amount_cents)
                .bind(revision.payment_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            if revised == 0 {
                tx.rollback().await?;
                return Err(AppError::not_found("Payment", revision.payment_id));
            }
        }

        let released = sqlx::query("UPDATE bikes SET is_available = TRUE WHERE id = $1")
            .bind(bike_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if released == 0 {
            tx.rollback().await?;
            return Err(AppError::not_found("Bike", bike_id));
        }

        tx.commit().await?;

        Ok(())
    }

    async fn open_trip(
        &self,
        vehicle_id: &str,
        driver_id: i32,
        ride: NewTransportationTransaction,
    ) -> StoreResult<TransportationTransaction> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE shared_vehicles SET driver_id = $1, is_available = FALSE WHERE id = $2",
        )
        .bind(driver_id)
        .bind(vehicle_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if updated == 0 {
            tx.rollback().await?;
            return Err(AppError::not_found("Shared vehicle", vehicle_id));
        }

        seat(&mut tx, vehicle_id, driver_id).await?;
        let ride = insert_ride(&mut tx, ride).await?;

        tx.commit().await?;

        Ok(ride)
    }

    async fn join_trip(
        &self,
        vehicle_id: &str,
        driver_id: i32,
        ride: NewTransportationTransaction,
        payment: NewPaymentTransaction,
    ) -> StoreResult<TransportationTransaction> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE shared_vehicles SET driver_id = $1 WHERE id = $2")
            .bind(driver_id)
            .bind(vehicle_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if updated == 0 {
            tx.rollback().await?;
            return Err(AppError::not_found("Shared vehicle", vehicle_id));
        }

        let ride = insert_ride(&mut tx, ride).await?;
        insert_payment(&mut tx, payment).await?;
        seat(&mut tx, vehicle_id, ride.user_id).await?;

        tx.commit().await?;

        Ok(ride)
    }

    async fn close_trip(
        &self,
        vehicle_id: &str,
        ride_ids: &[Uuid],
        end_time: DateTime<Utc>,
    ) -> StoreResult<usize> {
        let mut tx = self.pool.begin().await?;

        for &ride_id in ride_ids {
            if close_ride(&mut tx, ride_id, end_time).await? == 0 {
                tx.rollback().await?;
                return Err(AppError::not_found("Transportation transaction", ride_id));
            }
        }

        sqlx::query("DELETE FROM shared_vehicle_passengers WHERE vehicle_id = $1")
            .bind(vehicle_id)
            .execute(&mut *tx)
            .await?;

        let released = sqlx::query(
            "UPDATE shared_vehicles SET driver_id = NULL, is_available = TRUE WHERE id = $1",
        )
        .bind(vehicle_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if released == 0 {
            tx.rollback().await?;
            return Err(AppError::not_found("Shared vehicle", vehicle_id));
        }

        tx.commit().await?;

        Ok(ride_ids.len())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

async fn insert_ride(
    tx: &mut Transaction<'_, Postgres>,
    ride: NewTransportationTransaction,
) -> StoreResult<TransportationTransaction> {
    let (shuttle_id, bike_id, shared_vehicle_id) = match ride.vehicle {
        VehicleRef::Shuttle(id) => (Some(id), None, None),
        VehicleRef::Bike(id) => (None, Some(id), None),
        VehicleRef::SharedVehicle(id) => (None, None, Some(id)),
    };

    let inserted = sqlx::query_as::<_, TransportationTransaction>(
        r#"
        INSERT INTO transportation_transactions (
            user_id,
            shuttle_id,
            bike_id,
            shared_vehicle_id,
            date,
            rental_start_time,
            rental_end_time
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(ride.user_id)
    .bind(shuttle_id)
    .bind(bike_id)
    .bind(shared_vehicle_id)
    .bind(ride.date)
    .bind(ride.rental_start_time)
    .bind(ride.rental_end_time)
    .fetch_one(&mut **tx)
    .await?;

    Ok(inserted)
}

async fn insert_payment(
    tx: &mut Transaction<'_, Postgres>,
    payment: NewPaymentTransaction,
) -> StoreResult<PaymentTransaction> {
    let inserted = sqlx::query_as::<_, PaymentTransaction>(
        r#"
        INSERT INTO payment_transactions (user_id, amount_cents, date, method, is_refund)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(payment.user_id)
    .bind(payment.amount_cents)
    .bind(payment.date)
    .bind(payment.method)
    .bind(payment.is_refund)
    .fetch_one(&mut **tx)
    .await?;

    Ok(inserted)
}

/// Rows closed: 0 when the ride does not exist.
async fn close_ride(
    tx: &mut Transaction<'_, Postgres>,
    ride_id: Uuid,
    end_time: DateTime<Utc>,
) -> StoreResult<u64> {
    let closed = sqlx::query("UPDATE transportation_transactions SET rental_end_time = $1 WHERE id = $2")
        .bind(end_time)
        .bind(ride_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();

    Ok(closed)
}

async fn seat(tx: &mut Transaction<'_, Postgres>, vehicle_id: &str, user_id: i32) -> StoreResult<()> {
    // A driver re-joining as passenger keeps a single row
    sqlx::query(
        r#"
        INSERT INTO shared_vehicle_passengers (vehicle_id, user_id)
        VALUES ($1, $2)
        ON CONFLICT (vehicle_id, user_id) DO NOTHING
        "#,
    )
    .bind(vehicle_id)
    .bind(user_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
