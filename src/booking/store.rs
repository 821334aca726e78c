//! Storage collaborator traits
//!
//! The orchestrator only sees these traits, so it has no dependency on a
//! specific database. Implementations: [`PgStore`](crate::db::PgStore) and
//! [`InMemoryStore`](super::memory::InMemoryStore).

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;

use super::availability::{evaluate, Availability};
use super::calendar::{DateRange, ReservationCalendar};
use super::models::{Booking, BookingStatus, Resource};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Stored record is invalid: {0}")]
    Corrupt(String),

    #[error("Booking {0} does not exist")]
    MissingBooking(Uuid),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        tracing::error!("Storage error: {}", err);
        AppError::Service("Booking storage is unavailable".to_string())
    }
}

/// Result of a conditional insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Capacity was taken between the availability check and the write
    NoCapacity(Availability),
}

/// Decide a conditional insert against the bookings already stored
pub fn insert_outcome(existing: &[Booking], candidate: &Booking, capacity: u32) -> InsertOutcome {
    let calendar = ReservationCalendar::from_bookings(existing);
    let availability = evaluate(&calendar, &candidate.range, candidate.units, capacity);
    if availability.available {
        InsertOutcome::Inserted
    } else {
        InsertOutcome::NoCapacity(availability)
    }
}

/// Resource lookup
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Find a resource by id, including deactivated ones
    async fn find_resource(&self, id: Uuid) -> Result<Option<Resource>, StoreError>;
}

/// Reservation queries and writes
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Non-cancelled bookings of `resource_id` overlapping `range`
    async fn find_overlapping(
        &self,
        resource_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<Booking>, StoreError>;

    /// Insert `booking` only if `capacity` still covers it.
    ///
    /// The capacity re-check and the write are atomic with respect to other
    /// inserts for the same resource.
    async fn insert_if_available(
        &self,
        booking: &Booking,
        capacity: u32,
    ) -> Result<InsertOutcome, StoreError>;

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError>;

    async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Booking>, StoreError>;

    /// Overwrite status and payment fields if the stored status is still
    /// `expected`. Returns `false` when another writer got there first.
    async fn update_booking(
        &self,
        booking: &Booking,
        expected: BookingStatus,
    ) -> Result<bool, StoreError>;
}
