//! Booking orchestration.
//!
//! `create_booking` runs validate → resource lookup → availability → price →
//! payment intent → conditional insert, failing fast at each stage. The
//! per-resource lock is held from the availability check until the insert
//! returns, and the store re-checks capacity atomically, so concurrent
//! requests for the last unit cannot both succeed.
//!
//! The payment intent is created before the booking is written: a processor
//! failure never leaves a stored booking. A crash between the two leaves an
//! unreferenced intent, which expires on the processor side.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::time::timeout;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::payments::{PaymentGateway, PaymentIntent, PaymentIntentRequest, RefundRequest};
use crate::pricing::models::{Occupancy, PriceBreakdown};
use crate::pricing::services::compute_price;

use super::availability::{check_availability, Availability};
use super::calendar::DateRange;
use super::locks::ResourceLocks;
use super::models::{
    Actor, ActorRole, Booking, BookingRequest, BookingStatus, PaymentStatus, Resource,
    ResourceKind,
};
use super::store::{BookingStore, InsertOutcome, ResourceStore};
use super::transitions::check_transition;

/// Writes attempted when recording a refund against a booking that keeps changing
const REFUND_RECORD_ATTEMPTS: usize = 3;

/// Price quote for a prospective booking
#[derive(Debug, Clone)]
pub struct Quote {
    pub resource: Resource,
    pub range: DateRange,
    pub availability: Availability,
    pub price: PriceBreakdown,
}

pub struct BookingService {
    resources: Arc<dyn ResourceStore>,
    bookings: Arc<dyn BookingStore>,
    payments: Arc<dyn PaymentGateway>,
    locks: ResourceLocks,
    payment_timeout: Duration,
}

impl BookingService {
    pub fn new(
        resources: Arc<dyn ResourceStore>,
        bookings: Arc<dyn BookingStore>,
        payments: Arc<dyn PaymentGateway>,
        payment_timeout: Duration,
    ) -> Self {
        Self {
            resources,
            bookings,
            payments,
            locks: ResourceLocks::new(),
            payment_timeout,
        }
    }

    async fn load_resource(&self, id: Uuid) -> Result<Resource> {
        self.resources
            .find_resource(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Resource {} not found", id)))
    }

    async fn load_booking(&self, id: Uuid) -> Result<Booking> {
        self.bookings
            .find_booking(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Booking {} not found", id)))
    }

    /// Check whether `occupancy` fits on the resource, returning the resolved
    /// range alongside the result
    #[instrument(skip(self, occupancy))]
    pub async fn check_availability(
        &self,
        resource_id: Uuid,
        start: NaiveDate,
        end: Option<NaiveDate>,
        occupancy: &Occupancy,
    ) -> Result<(DateRange, Availability)> {
        let resource = self.load_resource(resource_id).await?;
        let range = resource.kind.resolve_range(start, end)?;
        let requested = resource.kind.units_held(occupancy);
        let availability =
            check_availability(self.bookings.as_ref(), &resource, range, requested).await?;
        Ok((range, availability))
    }

    /// Availability and price for a prospective booking, without side effects
    #[instrument(skip(self, occupancy))]
    pub async fn quote(
        &self,
        resource_id: Uuid,
        start: NaiveDate,
        end: Option<NaiveDate>,
        occupancy: &Occupancy,
    ) -> Result<Quote> {
        let resource = self.load_resource(resource_id).await?;
        let range = resource.kind.resolve_range(start, end)?;
        let requested = resource.kind.units_held(occupancy);
        let availability =
            check_availability(self.bookings.as_ref(), &resource, range, requested).await?;
        let price = compute_price(
            &resource.pricing,
            &resource.currency,
            range.start(),
            range.end(),
            occupancy,
        )?;

        Ok(Quote {
            resource,
            range,
            availability,
            price,
        })
    }

    /// Create a pending booking with a payment intent
    #[instrument(
        skip(self, request),
        fields(resource_id = %request.resource_id, user_id = %request.user_id)
    )]
    pub async fn create_booking(&self, request: BookingRequest) -> Result<Booking> {
        if let Some(end) = request.end_date {
            DateRange::new(request.start_date, end)?;
        }

        let resource = self.load_resource(request.resource_id).await?;
        if !resource.active {
            return Err(AppError::conflict(format!(
                "{} is not accepting bookings",
                resource.name
            )));
        }

        let range = resource.kind.resolve_range(request.start_date, request.end_date)?;
        let units = resource.kind.units_held(&request.occupancy);
        if units == 0 {
            return Err(AppError::validation("Booking must hold at least one unit"));
        }

        let _guard = self.locks.acquire(resource.id).await;

        let availability =
            check_availability(self.bookings.as_ref(), &resource, range, units).await?;
        if !availability.available {
            info!(
                held = availability.units_held,
                capacity = availability.capacity,
                "No capacity for {}",
                range
            );
            return Err(AppError::conflict(
                "Resource is not available for the selected dates",
            ));
        }

        let price = compute_price(
            &resource.pricing,
            &resource.currency,
            range.start(),
            range.end(),
            &request.occupancy,
        )?;

        let booking_id = Uuid::new_v4();
        let intent = self
            .create_payment_intent(booking_id, &resource, range, &price)
            .await?;

        let booking = Booking::pending(
            booking_id,
            &resource,
            request.user_id,
            range,
            request.occupancy,
            price,
            intent.id.clone(),
        );

        match self
            .bookings
            .insert_if_available(&booking, resource.capacity)
            .await
        {
            Ok(InsertOutcome::Inserted) => {
                info!(booking_id = %booking.id, total = %booking.price.total, "Booking created");
                Ok(booking)
            }
            Ok(InsertOutcome::NoCapacity(availability)) => {
                warn!(
                    held = availability.units_held,
                    "Capacity taken by a concurrent writer for {}", range
                );
                self.release_intent(&intent.id).await;
                Err(AppError::conflict(
                    "Resource is not available for the selected dates",
                ))
            }
            Err(err) => {
                self.release_intent(&intent.id).await;
                Err(err.into())
            }
        }
    }

    /// Fetch a booking visible to `actor`
    pub async fn get_booking(&self, actor: &Actor, id: Uuid) -> Result<Booking> {
        let booking = self.load_booking(id).await?;
        let resource = self.load_resource(booking.resource_id).await?;
        actor
            .role_for(&booking, &resource)
            .ok_or_else(|| AppError::forbidden("Not permitted to view this booking"))?;
        Ok(booking)
    }

    /// Move a booking to `requested`, refunding on cancellation when needed
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn update_status(
        &self,
        actor: &Actor,
        id: Uuid,
        requested: BookingStatus,
    ) -> Result<Booking> {
        let booking = self.load_booking(id).await?;
        let resource = self.load_resource(booking.resource_id).await?;
        let role = actor
            .role_for(&booking, &resource)
            .ok_or_else(|| AppError::forbidden("Not permitted to modify this booking"))?;

        let _guard = self.locks.acquire(resource.id).await;
        let mut booking = self.load_booking(id).await?;

        if requested == BookingStatus::Cancelled && booking.status == BookingStatus::Cancelled {
            return Ok(booking);
        }

        check_transition(resource.kind, booking.status, requested, role)?;

        let expected = booking.status;
        let paid_before = booking.payment_status;
        let now = Utc::now();
        if requested == BookingStatus::Cancelled {
            self.settle_payment_for_cancellation(&mut booking).await?;
            booking.cancelled_at = Some(now);
        }
        booking.status = requested;
        booking.updated_at = now;

        if !self.bookings.update_booking(&booking, expected).await? {
            if paid_before == PaymentStatus::Captured
                && booking.payment_status == PaymentStatus::Refunded
            {
                return self.record_refund(resource.kind, role, id).await;
            }
            return Err(AppError::conflict("Booking was modified concurrently"));
        }

        info!(from = %expected, to = %requested, ?role, "Booking {} updated", booking.id);
        Ok(booking)
    }

    /// Persist a refund whose cancellation lost the optimistic write.
    ///
    /// The cancellation is re-applied against the fresh status when `role`
    /// may still cancel; otherwise only the refund is recorded.
    async fn record_refund(
        &self,
        kind: ResourceKind,
        role: ActorRole,
        id: Uuid,
    ) -> Result<Booking> {
        for _ in 0..REFUND_RECORD_ATTEMPTS {
            let mut current = self.load_booking(id).await?;
            let expected = current.status;
            let now = Utc::now();

            let cancel = expected != BookingStatus::Cancelled
                && check_transition(kind, expected, BookingStatus::Cancelled, role).is_ok();
            if cancel {
                current.status = BookingStatus::Cancelled;
                current.cancelled_at = Some(now);
            }
            current.payment_status = PaymentStatus::Refunded;
            current.updated_at = now;

            if !self.bookings.update_booking(&current, expected).await? {
                continue;
            }
            if current.status == BookingStatus::Cancelled {
                info!("Booking {} cancelled after a concurrent update", id);
                return Ok(current);
            }
            warn!("Refund recorded on booking {} which is now {}", id, current.status);
            return Err(AppError::conflict(
                "Booking was modified concurrently; the payment was refunded",
            ));
        }

        error!("Could not record refund for booking {}", id);
        Err(AppError::conflict(
            "Booking was modified concurrently; the payment was refunded",
        ))
    }

    pub async fn cancel_booking(&self, actor: &Actor, id: Uuid) -> Result<Booking> {
        self.update_status(actor, id, BookingStatus::Cancelled).await
    }

    /// Hook for the payment webhook layer: the intent was captured or failed
    #[instrument(skip(self))]
    pub async fn record_payment_status(
        &self,
        payment_intent_id: &str,
        status: PaymentStatus,
    ) -> Result<Booking> {
        if !matches!(status, PaymentStatus::Captured | PaymentStatus::Failed) {
            return Err(AppError::validation(format!(
                "Payment status '{}' cannot be reported by the processor",
                status.as_str()
            )));
        }

        let booking = self
            .bookings
            .find_by_payment_intent(payment_intent_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("No booking for payment intent {}", payment_intent_id))
            })?;

        let _guard = self.locks.acquire(booking.resource_id).await;
        let mut booking = self.load_booking(booking.id).await?;

        let cancelled = booking.status == BookingStatus::Cancelled;
        if booking.payment_status == status
            || (cancelled
                && status == PaymentStatus::Captured
                && booking.payment_status == PaymentStatus::Refunded)
        {
            return Ok(booking);
        }

        // The intent release on cancellation is best-effort, so a capture can
        // still arrive for a booking whose payment was marked cancelled
        let late_capture = cancelled
            && status == PaymentStatus::Captured
            && booking.payment_status == PaymentStatus::Cancelled;
        if booking.payment_status != PaymentStatus::Pending && !late_capture {
            return Err(AppError::conflict(format!(
                "Payment is already {}",
                booking.payment_status.as_str()
            )));
        }

        booking.payment_status = status;
        if cancelled && status == PaymentStatus::Captured {
            warn!("Payment captured for cancelled booking {}", booking.id);
            self.settle_payment_for_cancellation(&mut booking).await?;
        }
        booking.updated_at = Utc::now();

        let expected = booking.status;
        if !self.bookings.update_booking(&booking, expected).await? {
            return Err(AppError::conflict("Booking was modified concurrently"));
        }

        info!("Payment {} recorded for booking {}", status.as_str(), booking.id);
        Ok(booking)
    }

    async fn create_payment_intent(
        &self,
        booking_id: Uuid,
        resource: &Resource,
        range: DateRange,
        price: &PriceBreakdown,
    ) -> Result<PaymentIntent> {
        let request = PaymentIntentRequest {
            reference: booking_id.to_string(),
            amount_minor: price.total_minor_units,
            currency: price.currency.clone(),
            description: format!("{} {}", resource.name, range),
        };

        match timeout(self.payment_timeout, self.payments.create_intent(&request)).await {
            Ok(Ok(intent)) => Ok(intent),
            Ok(Err(err)) => Err(err.into()),
            Err(_) => {
                error!(
                    "Payment intent creation timed out after {:?}",
                    self.payment_timeout
                );
                Err(AppError::service("Payment processor timed out"))
            }
        }
    }

    /// Best-effort cancel of an intent that will never be paid
    async fn release_intent(&self, payment_intent_id: &str) {
        let release = self.payments.cancel_intent(payment_intent_id);
        match timeout(self.payment_timeout, release).await {
            Ok(Ok(())) => info!("Released payment intent {}", payment_intent_id),
            Ok(Err(err)) => warn!(
                "Failed to release payment intent {}: {}",
                payment_intent_id, err
            ),
            Err(_) => warn!("Timed out releasing payment intent {}", payment_intent_id),
        }
    }

    /// Refund a captured payment or release a pending one.
    ///
    /// A failed refund leaves the booking untouched.
    async fn settle_payment_for_cancellation(&self, booking: &mut Booking) -> Result<()> {
        match booking.payment_status {
            PaymentStatus::Captured => {
                let request = RefundRequest {
                    payment_intent_id: booking.payment_intent_id.clone(),
                    amount_minor: None,
                    idempotency_key: format!("refund-{}", booking.id),
                };
                match timeout(self.payment_timeout, self.payments.refund(&request)).await {
                    Ok(Ok(refund)) => {
                        info!("Refund {} issued for booking {}", refund.id, booking.id);
                        booking.payment_status = PaymentStatus::Refunded;
                        Ok(())
                    }
                    Ok(Err(err)) => {
                        error!("Refund for booking {} failed: {}", booking.id, err);
                        Err(AppError::RefundFailed(
                            "Refund could not be issued; the booking was not cancelled".to_string(),
                        ))
                    }
                    Err(_) => {
                        error!("Refund for booking {} timed out", booking.id);
                        Err(AppError::RefundFailed(
                            "Refund timed out; the booking was not cancelled".to_string(),
                        ))
                    }
                }
            }
            PaymentStatus::Pending => {
                self.release_intent(&booking.payment_intent_id).await;
                booking.payment_status = PaymentStatus::Cancelled;
                Ok(())
            }
            PaymentStatus::Refunded | PaymentStatus::Failed | PaymentStatus::Cancelled => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::memory::InMemoryStore;
    use crate::payments::fake::FakeGateway;
    use crate::pricing::models::{NightlyRates, ParticipantRates, PricingTable, TieredRates};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::booking::store::StoreError;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn room(capacity: u32) -> Resource {
        Resource {
            id: Uuid::new_v4(),
            owner_id: "owner-1".to_string(),
            kind: ResourceKind::Room,
            name: "Ocean View Double".to_string(),
            capacity,
            currency: "USD".to_string(),
            pricing: PricingTable::Nightly(NightlyRates {
                nightly_rate: dec!(100),
                cleaning_fee: None,
                tax_rate: None,
                max_guests_per_unit: None,
            }),
            attributes: serde_json::json!({"category": "double"}),
            active: true,
        }
    }

    fn car() -> Resource {
        Resource {
            id: Uuid::new_v4(),
            owner_id: "owner-2".to_string(),
            kind: ResourceKind::Vehicle,
            name: "Compact".to_string(),
            capacity: 1,
            currency: "USD".to_string(),
            pricing: PricingTable::Tiered(TieredRates {
                daily: Some(dec!(10)),
                weekly: None,
                monthly: Some(dec!(200)),
                insurance_per_day: None,
                deposit: None,
                tax_rate: None,
            }),
            attributes: serde_json::Value::Null,
            active: true,
        }
    }

    fn tour(seats: u32) -> Resource {
        Resource {
            id: Uuid::new_v4(),
            owner_id: "guide-1".to_string(),
            kind: ResourceKind::TourSlot,
            name: "Reef Snorkel".to_string(),
            capacity: seats,
            currency: "USD".to_string(),
            pricing: PricingTable::Participants(ParticipantRates {
                base_price: dec!(100),
                child_discount: dec!(0.30),
                senior_discount: dec!(0.20),
                tax_rate: dec!(0.10),
                max_participants: None,
            }),
            attributes: serde_json::Value::Null,
            active: true,
        }
    }

    fn request(
        resource: &Resource,
        user: &str,
        start: &str,
        end: Option<&str>,
        occupancy: Occupancy,
    ) -> BookingRequest {
        BookingRequest {
            resource_id: resource.id,
            user_id: user.to_string(),
            start_date: date(start),
            end_date: end.map(date),
            occupancy,
        }
    }

    /// Single-unit request from `start` to `end`
    fn stay(resource: &Resource, user: &str, start: &str, end: &str) -> BookingRequest {
        request(resource, user, start, Some(end), Occupancy::single())
    }

    struct Fixture {
        store: Arc<InMemoryStore>,
        gateway: Arc<FakeGateway>,
        service: Arc<BookingService>,
    }

    async fn fixture_with(gateway: FakeGateway, resources: Vec<Resource>) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        for resource in resources {
            store.put_resource(resource).await;
        }
        let gateway = Arc::new(gateway);
        let service = Arc::new(BookingService::new(
            store.clone(),
            store.clone(),
            gateway.clone(),
            Duration::from_millis(200),
        ));
        Fixture {
            store,
            gateway,
            service,
        }
    }

    /// Wraps the in-memory store, counting inserts, optionally hiding
    /// existing bookings from the availability read, and optionally letting
    /// another writer move the booking just before the next status write
    struct SpyStore {
        inner: Arc<InMemoryStore>,
        inserts: AtomicUsize,
        stale_reads: bool,
        interfere: Mutex<Option<BookingStatus>>,
    }

    impl SpyStore {
        fn new(inner: Arc<InMemoryStore>, stale_reads: bool) -> Self {
            Self {
                inner,
                inserts: AtomicUsize::new(0),
                stale_reads,
                interfere: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl BookingStore for SpyStore {
        async fn find_overlapping(
            &self,
            resource_id: Uuid,
            range: DateRange,
        ) -> std::result::Result<Vec<Booking>, StoreError> {
            if self.stale_reads {
                return Ok(Vec::new());
            }
            self.inner.find_overlapping(resource_id, range).await
        }

        async fn insert_if_available(
            &self,
            booking: &Booking,
            capacity: u32,
        ) -> std::result::Result<InsertOutcome, StoreError> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            self.inner.insert_if_available(booking, capacity).await
        }

        async fn find_booking(&self, id: Uuid) -> std::result::Result<Option<Booking>, StoreError> {
            self.inner.find_booking(id).await
        }

        async fn find_by_payment_intent(
            &self,
            payment_intent_id: &str,
        ) -> std::result::Result<Option<Booking>, StoreError> {
            self.inner.find_by_payment_intent(payment_intent_id).await
        }

        async fn update_booking(
            &self,
            booking: &Booking,
            expected: BookingStatus,
        ) -> std::result::Result<bool, StoreError> {
            let concurrent = self.interfere.lock().unwrap().take();
            if let Some(status) = concurrent {
                let mut other = self.inner.find_booking(booking.id).await?.unwrap();
                let before = other.status;
                other.status = status;
                assert!(self.inner.update_booking(&other, before).await?);
            }
            self.inner.update_booking(booking, expected).await
        }
    }

    // ==================== create_booking tests ====================

    #[tokio::test]
    async fn test_create_booking_happy_path() {
        let resource = room(2);
        let f = fixture_with(FakeGateway::new(), vec![resource.clone()]).await;

        let booking = f
            .service
            .create_booking(stay(&resource, "guest-1", "2025-05-01", "2025-05-04"))
            .await
            .unwrap();

        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.payment_status, PaymentStatus::Pending);
        assert_eq!(booking.price.total, dec!(300));
        assert_eq!(booking.price.total_minor_units, 30000);
        assert!(booking.payment_intent_id.starts_with("pi_"));
        assert_eq!(f.gateway.created(), 1);
        assert_eq!(f.store.booking_count().await, 1);
    }

    #[tokio::test]
    async fn test_capacity_invariant_rejects_extra_booking() {
        let resource = room(2);
        let f = fixture_with(FakeGateway::new(), vec![resource.clone()]).await;

        for guest in ["a", "b"] {
            f.service
                .create_booking(stay(&resource, guest, "2025-05-01", "2025-05-02"))
                .await
                .unwrap();
        }

        let (_, availability) = f
            .service
            .check_availability(
                resource.id,
                date("2025-05-01"),
                Some(date("2025-05-02")),
                &Occupancy::single(),
            )
            .await
            .unwrap();
        assert!(!availability.available);
        assert_eq!(availability.conflicting_count, 2);

        let err = f
            .service
            .create_booking(stay(&resource, "c", "2025-05-01", "2025-05-02"))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "conflict");
        // No intent opened for the rejected request
        assert_eq!(f.gateway.created(), 2);
    }

    #[tokio::test]
    async fn test_back_to_back_bookings_succeed() {
        let resource = car();
        let f = fixture_with(FakeGateway::new(), vec![resource.clone()]).await;

        f.service
            .create_booking(stay(&resource, "a", "2025-05-01", "2025-05-05"))
            .await
            .unwrap();
        f.service
            .create_booking(stay(&resource, "b", "2025-05-05", "2025-05-09"))
            .await
            .unwrap();

        assert_eq!(f.store.booking_count().await, 2);
    }

    #[tokio::test]
    async fn test_tiered_price_is_frozen_on_booking() {
        let resource = car();
        let f = fixture_with(FakeGateway::new(), vec![resource.clone()]).await;

        let booking = f
            .service
            .create_booking(stay(&resource, "a", "2025-01-01", "2025-02-05"))
            .await
            .unwrap();

        assert_eq!(booking.price.total, dec!(250));
    }

    #[tokio::test]
    async fn test_tour_seats_count_participants() {
        let resource = tour(4);
        let f = fixture_with(FakeGateway::new(), vec![resource.clone()]).await;

        let booking = f
            .service
            .create_booking(request(&resource, "a", "2025-07-01", None, Occupancy::new(1, 2, 1, 0)))
            .await
            .unwrap();
        assert_eq!(booking.units, 3);
        assert_eq!(booking.price.total, dec!(297.00));

        let err = f
            .service
            .create_booking(request(&resource, "b", "2025-07-01", None, Occupancy::new(1, 2, 0, 0)))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "conflict");

        f.service
            .create_booking(request(&resource, "c", "2025-07-01", None, Occupancy::new(1, 1, 0, 0)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_and_inactive_resources() {
        let mut inactive = room(1);
        inactive.active = false;
        let f = fixture_with(FakeGateway::new(), vec![inactive.clone()]).await;

        let err = f
            .service
            .create_booking(stay(&room(1), "a", "2025-05-01", "2025-05-02"))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "not_found");

        let err = f
            .service
            .create_booking(stay(&inactive, "a", "2025-05-01", "2025-05-02"))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "conflict");
    }

    #[tokio::test]
    async fn test_invalid_dates_rejected_before_lookup() {
        let f = fixture_with(FakeGateway::new(), vec![]).await;

        let err = f
            .service
            .create_booking(stay(&room(1), "a", "2025-05-02", "2025-05-02"))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "validation_error");
    }

    #[tokio::test]
    async fn test_oversized_booking_is_rejected_without_intent() {
        let resource = room(500);
        let f = fixture_with(FakeGateway::new(), vec![resource.clone()]).await;

        let err = f
            .service
            .create_booking(BookingRequest {
                resource_id: resource.id,
                user_id: "a".to_string(),
                start_date: date("2025-01-01"),
                end_date: Some(NaiveDate::from_ymd_opt(200_000, 1, 1).unwrap()),
                occupancy: Occupancy::new(100, 1, 0, 0),
            })
            .await
            .unwrap_err();

        assert_eq!(err.reason(), "validation_error");
        assert_eq!(f.gateway.created(), 0);
        assert_eq!(f.store.booking_count().await, 0);
    }

    #[tokio::test]
    async fn test_payment_failure_never_persists() {
        let resource = room(1);
        let inner = Arc::new(InMemoryStore::new());
        inner.put_resource(resource.clone()).await;
        let spy = Arc::new(SpyStore::new(inner.clone(), false));
        let service = BookingService::new(
            inner.clone(),
            spy.clone(),
            Arc::new(FakeGateway::failing()),
            Duration::from_millis(200),
        );

        let err = service
            .create_booking(stay(&resource, "a", "2025-05-01", "2025-05-02"))
            .await
            .unwrap_err();

        assert_eq!(err.reason(), "service_unavailable");
        assert!(err.is_retryable());
        assert_eq!(spy.inserts.load(Ordering::SeqCst), 0);
        assert_eq!(inner.booking_count().await, 0);
    }

    #[tokio::test]
    async fn test_payment_timeout_is_service_error() {
        let resource = room(1);
        let store = Arc::new(InMemoryStore::new());
        store.put_resource(resource.clone()).await;
        let service = BookingService::new(
            store.clone(),
            store.clone(),
            Arc::new(FakeGateway::slow(Duration::from_millis(500))),
            Duration::from_millis(20),
        );

        let err = service
            .create_booking(stay(&resource, "a", "2025-05-01", "2025-05-02"))
            .await
            .unwrap_err();

        assert_eq!(err, AppError::service("Payment processor timed out"));
        assert_eq!(store.booking_count().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_requests_for_last_unit() {
        let resource = room(1);
        let f = fixture_with(FakeGateway::new(), vec![resource.clone()]).await;

        let mut handles = Vec::new();
        for i in 0..10 {
            let service = f.service.clone();
            let req = stay(&resource, &format!("guest-{}", i), "2025-05-01", "2025-05-03");
            handles.push(tokio::spawn(async move { service.create_booking(req).await }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(f.store.booking_count().await, 1);
    }

    #[tokio::test]
    async fn test_conditional_insert_rejects_stale_check() {
        let resource = room(1);
        let inner = Arc::new(InMemoryStore::new());
        inner.put_resource(resource.clone()).await;

        // Another instance already holds the only room
        let gateway = Arc::new(FakeGateway::new());
        let timeout = Duration::from_millis(200);
        let other = BookingService::new(inner.clone(), inner.clone(), gateway.clone(), timeout);
        other
            .create_booking(stay(&resource, "a", "2025-05-01", "2025-05-03"))
            .await
            .unwrap();

        let spy = Arc::new(SpyStore::new(inner.clone(), true));
        let service = BookingService::new(inner.clone(), spy.clone(), gateway.clone(), timeout);

        let err = service
            .create_booking(stay(&resource, "b", "2025-05-02", "2025-05-04"))
            .await
            .unwrap_err();

        assert_eq!(err.reason(), "conflict");
        assert_eq!(spy.inserts.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.cancelled(), 1);
        assert_eq!(inner.booking_count().await, 1);
    }

    // ==================== status tests ====================

    #[tokio::test]
    async fn test_owner_progression_and_stranger_forbidden() {
        let resource = room(1);
        let f = fixture_with(FakeGateway::new(), vec![resource.clone()]).await;
        let booking = f
            .service
            .create_booking(stay(&resource, "guest-1", "2025-05-01", "2025-05-02"))
            .await
            .unwrap();

        let owner = Actor::user("owner-1");
        let confirmed = f
            .service
            .update_status(&owner, booking.id, BookingStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);

        let err = f
            .service
            .update_status(&Actor::user("stranger"), booking.id, BookingStatus::CheckedIn)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "forbidden");

        let err = f
            .service
            .get_booking(&Actor::user("stranger"), booking.id)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "forbidden");
    }

    #[tokio::test]
    async fn test_requester_cannot_cancel_after_check_in() {
        let resource = room(1);
        let f = fixture_with(FakeGateway::new(), vec![resource.clone()]).await;
        let booking = f
            .service
            .create_booking(stay(&resource, "guest-1", "2025-05-01", "2025-05-02"))
            .await
            .unwrap();

        let owner = Actor::user("owner-1");
        for status in [BookingStatus::Confirmed, BookingStatus::CheckedIn] {
            f.service
                .update_status(&owner, booking.id, status)
                .await
                .unwrap();
        }

        let err = f
            .service
            .cancel_booking(&Actor::user("guest-1"), booking.id)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "conflict");

        let stored = f.service.get_booking(&owner, booking.id).await.unwrap();
        assert_eq!(stored.status, BookingStatus::CheckedIn);
    }

    #[tokio::test]
    async fn test_cancel_pending_releases_intent() {
        let resource = room(1);
        let f = fixture_with(FakeGateway::new(), vec![resource.clone()]).await;
        let booking = f
            .service
            .create_booking(stay(&resource, "guest-1", "2025-05-01", "2025-05-02"))
            .await
            .unwrap();

        let cancelled = f
            .service
            .cancel_booking(&Actor::user("guest-1"), booking.id)
            .await
            .unwrap();

        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.payment_status, PaymentStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());
        assert_eq!(f.gateway.cancelled(), 1);
        assert_eq!(f.gateway.refunds(), 0);

        // Capacity is free again
        f.service
            .create_booking(stay(&resource, "guest-2", "2025-05-01", "2025-05-02"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancel_captured_refunds_once() {
        let resource = room(1);
        let f = fixture_with(FakeGateway::new(), vec![resource.clone()]).await;
        let booking = f
            .service
            .create_booking(stay(&resource, "guest-1", "2025-05-01", "2025-05-02"))
            .await
            .unwrap();
        f.service
            .record_payment_status(&booking.payment_intent_id, PaymentStatus::Captured)
            .await
            .unwrap();

        let guest = Actor::user("guest-1");
        let first = f.service.cancel_booking(&guest, booking.id).await.unwrap();
        assert_eq!(first.payment_status, PaymentStatus::Refunded);

        let second = f.service.cancel_booking(&guest, booking.id).await.unwrap();
        assert_eq!(second.status, BookingStatus::Cancelled);
        assert_eq!(f.gateway.refunds(), 1);
    }

    #[tokio::test]
    async fn test_refund_failure_blocks_cancellation() {
        let resource = room(1);
        let f = fixture_with(FakeGateway::new(), vec![resource.clone()]).await;
        let booking = f
            .service
            .create_booking(stay(&resource, "guest-1", "2025-05-01", "2025-05-02"))
            .await
            .unwrap();
        f.service
            .record_payment_status(&booking.payment_intent_id, PaymentStatus::Captured)
            .await
            .unwrap();
        f.gateway.fail_refunds.store(true, Ordering::SeqCst);

        let guest = Actor::user("guest-1");
        let err = f.service.cancel_booking(&guest, booking.id).await.unwrap_err();
        assert_eq!(err.reason(), "refund_failed");

        let stored = f.service.get_booking(&guest, booking.id).await.unwrap();
        assert_eq!(stored.status, BookingStatus::Pending);
        assert_eq!(stored.payment_status, PaymentStatus::Captured);
    }

    #[tokio::test]
    async fn test_refund_survives_concurrent_status_change() {
        let resource = room(1);
        let inner = Arc::new(InMemoryStore::new());
        inner.put_resource(resource.clone()).await;
        let spy = Arc::new(SpyStore::new(inner.clone(), false));
        let gateway = Arc::new(FakeGateway::new());
        let service = BookingService::new(
            inner.clone(),
            spy.clone(),
            gateway.clone(),
            Duration::from_millis(200),
        );

        let booking = service
            .create_booking(stay(&resource, "guest-1", "2025-05-01", "2025-05-02"))
            .await
            .unwrap();
        service
            .record_payment_status(&booking.payment_intent_id, PaymentStatus::Captured)
            .await
            .unwrap();

        // Another instance confirms the booking while the refund is in flight
        *spy.interfere.lock().unwrap() = Some(BookingStatus::Confirmed);
        let cancelled = service
            .cancel_booking(&Actor::user("guest-1"), booking.id)
            .await
            .unwrap();

        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);
        assert_eq!(gateway.refunds(), 1);
        let stored = inner.find_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Cancelled);
        assert_eq!(stored.payment_status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn test_refund_recorded_when_booking_started_concurrently() {
        let resource = room(1);
        let inner = Arc::new(InMemoryStore::new());
        inner.put_resource(resource.clone()).await;
        let spy = Arc::new(SpyStore::new(inner.clone(), false));
        let gateway = Arc::new(FakeGateway::new());
        let service = BookingService::new(
            inner.clone(),
            spy.clone(),
            gateway.clone(),
            Duration::from_millis(200),
        );

        let booking = service
            .create_booking(stay(&resource, "guest-1", "2025-05-01", "2025-05-02"))
            .await
            .unwrap();
        service
            .record_payment_status(&booking.payment_intent_id, PaymentStatus::Captured)
            .await
            .unwrap();
        service
            .update_status(&Actor::user("owner-1"), booking.id, BookingStatus::Confirmed)
            .await
            .unwrap();

        // The owner checks the guest in on another instance before the cancel is written
        *spy.interfere.lock().unwrap() = Some(BookingStatus::CheckedIn);
        let err = service
            .cancel_booking(&Actor::user("guest-1"), booking.id)
            .await
            .unwrap_err();

        assert_eq!(err.reason(), "conflict");
        assert_eq!(gateway.refunds(), 1);
        let stored = inner.find_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::CheckedIn);
        assert_eq!(stored.payment_status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn test_admin_override_cancel_in_progress() {
        let resource = car();
        let f = fixture_with(FakeGateway::new(), vec![resource.clone()]).await;
        let booking = f
            .service
            .create_booking(stay(&resource, "driver", "2025-05-01", "2025-05-03"))
            .await
            .unwrap();

        let owner = Actor::user("owner-2");
        for status in [BookingStatus::Confirmed, BookingStatus::InProgress] {
            f.service
                .update_status(&owner, booking.id, status)
                .await
                .unwrap();
        }

        let err = f.service.cancel_booking(&owner, booking.id).await.unwrap_err();
        assert_eq!(err.reason(), "forbidden");

        let cancelled = f
            .service
            .cancel_booking(&Actor::admin("ops"), booking.id)
            .await
            .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
    }

    // ==================== payment status tests ====================

    #[tokio::test]
    async fn test_record_payment_status_is_idempotent() {
        let resource = room(1);
        let f = fixture_with(FakeGateway::new(), vec![resource.clone()]).await;
        let booking = f
            .service
            .create_booking(stay(&resource, "guest-1", "2025-05-01", "2025-05-02"))
            .await
            .unwrap();

        for _ in 0..2 {
            let updated = f
                .service
                .record_payment_status(&booking.payment_intent_id, PaymentStatus::Captured)
                .await
                .unwrap();
            assert_eq!(updated.payment_status, PaymentStatus::Captured);
        }

        let err = f
            .service
            .record_payment_status(&booking.payment_intent_id, PaymentStatus::Failed)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "conflict");

        let err = f
            .service
            .record_payment_status("pi_unknown", PaymentStatus::Captured)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "not_found");
    }

    #[tokio::test]
    async fn test_capture_after_cancellation_is_refunded() {
        let resource = room(1);
        let f = fixture_with(FakeGateway::new(), vec![resource.clone()]).await;
        let booking = f
            .service
            .create_booking(stay(&resource, "guest-1", "2025-05-01", "2025-05-02"))
            .await
            .unwrap();
        f.service
            .cancel_booking(&Actor::user("guest-1"), booking.id)
            .await
            .unwrap();

        for _ in 0..2 {
            let updated = f
                .service
                .record_payment_status(&booking.payment_intent_id, PaymentStatus::Captured)
                .await
                .unwrap();
            assert_eq!(updated.status, BookingStatus::Cancelled);
            assert_eq!(updated.payment_status, PaymentStatus::Refunded);
        }
        assert_eq!(f.gateway.refunds(), 1);
    }

    #[tokio::test]
    async fn test_quote_has_no_side_effects() {
        let resource = room(1);
        let f = fixture_with(FakeGateway::new(), vec![resource.clone()]).await;

        let quote = f
            .service
            .quote(
                resource.id,
                date("2025-05-01"),
                Some(date("2025-05-03")),
                &Occupancy::single(),
            )
            .await
            .unwrap();

        assert!(quote.availability.available);
        assert_eq!(quote.price.total, dec!(200));
        assert_eq!(quote.range.days(), 2);
        assert_eq!(f.gateway.created(), 0);
        assert_eq!(f.store.booking_count().await, 0);
    }
}
