//! Response DTOs for pricing API endpoints.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::booking::service::Quote;

use super::models::PriceBreakdown;

/// Money value for JSON responses
#[derive(Debug, Clone, Serialize)]
pub struct MoneyResponse {
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub currency: String,
    /// Amount in the currency's smallest unit, as sent to the processor
    pub minor_units: i64,
}

impl MoneyResponse {
    pub fn total_of(breakdown: &PriceBreakdown) -> Self {
        Self {
            amount: breakdown.total,
            currency: breakdown.currency.clone(),
            minor_units: breakdown.total_minor_units,
        }
    }
}

/// Response for a price quote
#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub resource_id: Uuid,
    pub resource_kind: &'static str,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: u32,
    pub available: bool,
    pub remaining_units: u32,
    pub total: MoneyResponse,
    pub breakdown: PriceBreakdown,
}

impl From<Quote> for QuoteResponse {
    fn from(quote: Quote) -> Self {
        Self {
            resource_id: quote.resource.id,
            resource_kind: quote.resource.kind.as_str(),
            start_date: quote.range.start(),
            end_date: quote.range.end(),
            days: quote.range.days(),
            available: quote.availability.available,
            remaining_units: quote.availability.remaining(),
            total: MoneyResponse::total_of(&quote.price),
            breakdown: quote.price,
        }
    }
}
