//! In-memory store
//!
//! Backs local development (no `DATABASE_URL`) and tests. State lives inside
//! the store instance, never in module-level globals.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::calendar::DateRange;
use super::models::{Booking, BookingStatus, Resource};
use super::store::{insert_outcome, BookingStore, InsertOutcome, ResourceStore, StoreError};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    resources: RwLock<HashMap<Uuid, Resource>>,
    bookings: RwLock<HashMap<Uuid, Booking>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a resource
    pub async fn put_resource(&self, resource: Resource) {
        self.resources.write().await.insert(resource.id, resource);
    }

    /// Insert a booking without any capacity check
    pub async fn put_booking(&self, booking: Booking) {
        self.bookings.write().await.insert(booking.id, booking);
    }

    pub async fn booking_count(&self) -> usize {
        self.bookings.read().await.len()
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn find_resource(&self, id: Uuid) -> Result<Option<Resource>, StoreError> {
        Ok(self.resources.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn find_overlapping(
        &self,
        resource_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<Booking>, StoreError> {
        let bookings = self.bookings.read().await;
        Ok(bookings
            .values()
            .filter(|b| {
                b.resource_id == resource_id && b.holds_capacity() && b.range.overlaps(&range)
            })
            .cloned()
            .collect())
    }

    async fn insert_if_available(
        &self,
        booking: &Booking,
        capacity: u32,
    ) -> Result<InsertOutcome, StoreError> {
        // Write lock held across the re-check and the insert
        let mut bookings = self.bookings.write().await;

        let existing: Vec<Booking> = bookings
            .values()
            .filter(|b| {
                b.resource_id == booking.resource_id
                    && b.holds_capacity()
                    && b.range.overlaps(&booking.range)
            })
            .cloned()
            .collect();

        let outcome = insert_outcome(&existing, booking, capacity);
        if outcome == InsertOutcome::Inserted {
            bookings.insert(booking.id, booking.clone());
        }
        Ok(outcome)
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Booking>, StoreError> {
        Ok(self
            .bookings
            .read()
            .await
            .values()
            .find(|b| b.payment_intent_id == payment_intent_id)
            .cloned())
    }

    async fn update_booking(
        &self,
        booking: &Booking,
        expected: BookingStatus,
    ) -> Result<bool, StoreError> {
        let mut bookings = self.bookings.write().await;
        let stored = bookings
            .get_mut(&booking.id)
            .ok_or(StoreError::MissingBooking(booking.id))?;

        if stored.status != expected {
            return Ok(false);
        }

        stored.status = booking.status;
        stored.payment_status = booking.payment_status;
        stored.updated_at = booking.updated_at;
        stored.cancelled_at = booking.cancelled_at;
        Ok(true)
    }
}
