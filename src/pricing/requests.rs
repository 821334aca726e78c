//! Request DTOs for pricing API endpoints.

use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::booking::requests::validate_dates;

use super::models::Occupancy;

fn default_one() -> u32 {
    1
}

/// Request to quote a prospective booking
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_quote_dates"))]
pub struct QuoteRequest {
    pub resource_id: Uuid,
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

fn validate_quote_dates(request: &QuoteRequest) -> Result<(), ValidationError> {
    validate_dates(request.start_date, request.end_date)
}

impl QuoteRequest {
    pub fn occupancy(&self) -> Occupancy {
        Occupancy::new(self.units, self.adults, self.children, self.seniors)
    }
}
