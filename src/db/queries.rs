//! Postgres-backed resource and booking store

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::booking::calendar::DateRange;
use crate::booking::models::{Booking, BookingStatus, Resource};
use crate::booking::store::{
    insert_outcome, BookingStore, InsertOutcome, ResourceStore, StoreError,
};

use super::models::{BookingRow, ResourceRow};

/// Columns decoded by [`BookingRow`]
const BOOKING_COLUMNS: &str = r#"
    id,
    resource_id,
    user_id,
    start_date,
    end_date,
    occupancy,
    units,
    price,
    status,
    payment_intent_id,
    payment_status,
    created_at,
    updated_at,
    cancelled_at
"#;

/// Live bookings on resource `$1` overlapping `[$2, $3)`
const OVERLAPPING: &str = r#"
    WHERE resource_id = $1
      AND status <> 'cancelled'
      AND start_date < $3
      AND end_date > $2
"#;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

fn to_bookings(rows: Vec<BookingRow>) -> Result<Vec<Booking>, StoreError> {
    rows.into_iter().map(Booking::try_from).collect()
}

fn to_i32(value: u32, what: &str) -> Result<i32, StoreError> {
    i32::try_from(value)
        .map_err(|_| StoreError::Corrupt(format!("{} {} out of range", what, value)))
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Serialize writers for one resource until the transaction ends
    async fn lock_resource(
        tx: &mut Transaction<'_, Postgres>,
        resource_id: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(resource_id.to_string())
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for PgStore {
    async fn find_resource(&self, id: Uuid) -> Result<Option<Resource>, StoreError> {
        let row = sqlx::query_as::<_, ResourceRow>(
            r#"
            SELECT
                id,
                owner_id,
                kind,
                name,
                capacity,
                currency,
                pricing,
                attributes,
                active
            FROM resources
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Resource::try_from).transpose()
    }
}

#[async_trait]
impl BookingStore for PgStore {
    async fn find_overlapping(
        &self,
        resource_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<Booking>, StoreError> {
        let sql = format!("SELECT {} FROM bookings {}", BOOKING_COLUMNS, OVERLAPPING);
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(resource_id)
            .bind(range.start())
            .bind(range.end())
            .fetch_all(&self.pool)
            .await?;

        to_bookings(rows)
    }

    async fn insert_if_available(
        &self,
        booking: &Booking,
        capacity: u32,
    ) -> Result<InsertOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_resource(&mut tx, booking.resource_id).await?;

        let sql = format!("SELECT {} FROM bookings {}", BOOKING_COLUMNS, OVERLAPPING);
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(booking.resource_id)
            .bind(booking.range.start())
            .bind(booking.range.end())
            .fetch_all(&mut *tx)
            .await?;
        let existing = to_bookings(rows)?;

        let outcome = insert_outcome(&existing, booking, capacity);
        if let InsertOutcome::NoCapacity(_) = outcome {
            tx.rollback().await?;
            return Ok(outcome);
        }

        sqlx::query(
            r#"
            INSERT INTO bookings (
                id,
                resource_id,
                user_id,
                start_date,
                end_date,
                occupancy,
                units,
                price,
                total_amount,
                currency,
                status,
                payment_intent_id,
                payment_status,
                created_at,
                updated_at,
                cancelled_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(booking.id)
        .bind(booking.resource_id)
        .bind(&booking.user_id)
        .bind(booking.range.start())
        .bind(booking.range.end())
        .bind(Json(&booking.occupancy))
        .bind(to_i32(booking.units, "units")?)
        .bind(Json(&booking.price))
        .bind(booking.price.total)
        .bind(&booking.price.currency)
        .bind(booking.status.as_str())
        .bind(&booking.payment_intent_id)
        .bind(booking.payment_status.as_str())
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .bind(booking.cancelled_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!("Inserted booking {} for resource {}", booking.id, booking.resource_id);
        Ok(InsertOutcome::Inserted)
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let sql = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Booking::try_from).transpose()
    }

    async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Booking>, StoreError> {
        let sql = format!(
            "SELECT {} FROM bookings WHERE payment_intent_id = $1",
            BOOKING_COLUMNS
        );
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(payment_intent_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Booking::try_from).transpose()
    }

    async fn update_booking(
        &self,
        booking: &Booking,
        expected: BookingStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = $2,
                payment_status = $3,
                updated_at = $4,
                cancelled_at = $5
            WHERE id = $1
              AND status = $6
            "#,
        )
        .bind(booking.id)
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(booking.updated_at)
        .bind(booking.cancelled_at)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 && self.find_booking(booking.id).await?.is_none() {
            return Err(StoreError::MissingBooking(booking.id));
        }
        Ok(result.rows_affected() == 1)
    }
}
