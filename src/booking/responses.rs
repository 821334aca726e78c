//! Response DTOs for booking API endpoints.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::pricing::models::{Occupancy, PriceBreakdown};
use crate::pricing::responses::MoneyResponse;

use super::availability::Availability;
use super::calendar::DateRange;
use super::models::{Booking, BookingStatus, PaymentStatus};

/// Booking as returned to callers
#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub user_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: u32,
    pub occupancy: Occupancy,
    pub units: u32,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_intent_id: String,
    pub total: MoneyResponse,
    pub price: PriceBreakdown,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            resource_id: booking.resource_id,
            user_id: booking.user_id,
            start_date: booking.range.start(),
            end_date: booking.range.end(),
            days: booking.range.days(),
            occupancy: booking.occupancy,
            units: booking.units,
            status: booking.status,
            payment_status: booking.payment_status,
            payment_intent_id: booking.payment_intent_id,
            total: MoneyResponse::total_of(&booking.price),
            price: booking.price,
            created_at: booking.created_at,
            updated_at: booking.updated_at,
            cancelled_at: booking.cancelled_at,
        }
    }
}

/// Response for an availability check
#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub resource_id: Uuid,
    pub range: DateRange,
    #[serde(flatten)]
    pub availability: Availability,
    pub remaining_units: u32,
}

impl AvailabilityResponse {
    pub fn new(resource_id: Uuid, range: DateRange, availability: Availability) -> Self {
        Self {
            resource_id,
            range,
            remaining_units: availability.remaining(),
            availability,
        }
    }
}
