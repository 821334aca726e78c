//! Request DTOs for booking API endpoints.

use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::pricing::models::Occupancy;

use super::models::BookingRequest;

fn default_one() -> u32 {
    1
}

/// Request to create a booking
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_create_dates"))]
pub struct CreateBookingRequest {
    pub resource_id: Uuid,
    pub start_date: NaiveDate,
    /// Checkout or return date; optional for tours and transfers
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_one")]
    #[validate(range(min = 1, max = 500))]
    pub units: u32,
    #[serde(default = "default_one")]
    #[validate(range(max = 100))]
    pub adults: u32,
    #[serde(default)]
    #[validate(range(max = 100))]
    pub children: u32,
    #[serde(default)]
    #[validate(range(max = 100))]
    pub seniors: u32,
}

fn validate_create_dates(request: &CreateBookingRequest) -> Result<(), ValidationError> {
    validate_dates(request.start_date, request.end_date)
}

pub(crate) fn validate_dates(
    start: NaiveDate,
    end: Option<NaiveDate>,
) -> Result<(), ValidationError> {
    match end {
        Some(end) if end <= start => {
            let mut err = ValidationError::new("date_order");
            err.message = Some("end_date must be after start_date".into());
            Err(err)
        }
        _ => Ok(()),
    }
}

impl CreateBookingRequest {
    pub fn occupancy(&self) -> Occupancy {
        Occupancy::new(self.units, self.adults, self.children, self.seniors)
    }

    /// Typed request on behalf of `user_id`
    pub fn into_request(self, user_id: String) -> BookingRequest {
        BookingRequest {
            resource_id: self.resource_id,
            user_id,
            start_date: self.start_date,
            end_date: self.end_date,
            occupancy: self.occupancy(),
        }
    }
}

/// Query string for availability checks
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_query_dates"))]
pub struct AvailabilityQuery {
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_one")]
    #[validate(range(min = 1, max = 500))]
    pub units: u32,
    #[serde(default = "default_one")]
    #[validate(range(max = 100))]
    pub adults: u32,
    #[serde(default)]
    #[validate(range(max = 100))]
    pub children: u32,
    #[serde(default)]
    #[validate(range(max = 100))]
    pub seniors: u32,
}

fn validate_query_dates(query: &AvailabilityQuery) -> Result<(), ValidationError> {
    validate_dates(query.start_date, query.end_date)
}

impl AvailabilityQuery {
    pub fn occupancy(&self) -> Occupancy {
        Occupancy::new(self.units, self.adults, self.children, self.seniors)
    }
}

/// Request to move a booking to another status
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    #[validate(length(min = 1, max = 32))]
    pub status: String,
}

/// Processor-reported payment outcome
#[derive(Debug, Deserialize, Validate)]
pub struct PaymentStatusRequest {
    #[validate(length(min = 1, max = 32))]
    pub status: String,
}
