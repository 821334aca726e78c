//! Price computation for every rate table kind.
//!
//! `compute_price` validates the occupancy against the table, builds the
//! itemised base lines and fees, and hands them to
//! [`summarize`](super::calculators::summarize) for tax and totals.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::AppError;

use super::calculators::{line, participant_lines, split_into_tiers, summarize};
use super::models::{
    FeeKind, FeeLine, NightlyRates, Occupancy, ParticipantRates, PriceBreakdown, PricingTable,
    TieredRates, TransferRates,
};

/// Pricing calculation error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PricingError {
    #[error("End date {end} must be after start date {start}")]
    InvalidDuration { start: NaiveDate, end: NaiveDate },

    #[error("Invalid occupancy: {0}")]
    InvalidOccupancy(String),

    #[error("No {tier} rate configured to price {days} remaining day(s)")]
    MissingRate { tier: &'static str, days: u32 },

    #[error("Requested {requested} {what} exceeds the limit of {limit}")]
    LimitExceeded {
        what: &'static str,
        limit: u32,
        requested: u32,
    },

    #[error("Amount {amount} is out of range")]
    AmountOutOfRange { amount: Decimal },

    #[error("Too many {what} to price ({count} x {units} units)")]
    QuantityOverflow {
        what: &'static str,
        count: u32,
        units: u32,
    },
}

impl From<PricingError> for AppError {
    fn from(err: PricingError) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Compute the price breakdown for `occupancy` over `[start, end)`.
pub fn compute_price(
    table: &PricingTable,
    currency: &str,
    start: NaiveDate,
    end: NaiveDate,
    occupancy: &Occupancy,
) -> Result<PriceBreakdown, PricingError> {
    let days = duration_days(start, end)?;

    if occupancy.units == 0 {
        return Err(PricingError::InvalidOccupancy(
            "at least one unit is required".to_string(),
        ));
    }
    if occupancy.participants() == 0 {
        return Err(PricingError::InvalidOccupancy(
            "at least one participant is required".to_string(),
        ));
    }

    match table {
        PricingTable::Nightly(rates) => price_nightly(rates, currency, days, occupancy),
        PricingTable::Tiered(rates) => price_tiered(rates, currency, days, occupancy),
        PricingTable::Participants(rates) => price_participants(rates, currency, occupancy),
        PricingTable::Transfer(rates) => price_transfer(rates, currency, occupancy),
    }
}

fn duration_days(start: NaiveDate, end: NaiveDate) -> Result<u32, PricingError> {
    let days = (end - start).num_days();
    if days <= 0 {
        return Err(PricingError::InvalidDuration { start, end });
    }
    u32::try_from(days).map_err(|_| PricingError::InvalidDuration { start, end })
}

/// `count` periods for each of `units` units
fn quantity(what: &'static str, count: u32, units: u32) -> Result<u32, PricingError> {
    count
        .checked_mul(units)
        .ok_or(PricingError::QuantityOverflow { what, count, units })
}

fn check_limit(what: &'static str, limit: Option<u32>, requested: u32) -> Result<(), PricingError> {
    match limit {
        Some(limit) if requested > limit => Err(PricingError::LimitExceeded {
            what,
            limit,
            requested,
        }),
        _ => Ok(()),
    }
}

fn price_nightly(
    rates: &NightlyRates,
    currency: &str,
    nights: u32,
    occupancy: &Occupancy,
) -> Result<PriceBreakdown, PricingError> {
    let guest_limit = rates
        .max_guests_per_unit
        .map(|per_unit| per_unit.saturating_mul(occupancy.units));
    check_limit("guests", guest_limit, occupancy.participants())?;

    let night_count = quantity("nights", nights, occupancy.units)?;
    let base_lines = line("Night", night_count, rates.nightly_rate)
        .into_iter()
        .collect();

    let mut fees = Vec::new();
    if let Some(cleaning) = rates.cleaning_fee {
        fees.push(FeeLine {
            kind: FeeKind::Cleaning,
            description: "Cleaning fee".to_string(),
            amount: cleaning * Decimal::from(occupancy.units),
        });
    }

    summarize(
        currency,
        base_lines,
        fees,
        rates.tax_rate.unwrap_or(Decimal::ZERO),
    )
}

fn price_tiered(
    rates: &TieredRates,
    currency: &str,
    days: u32,
    occupancy: &Occupancy,
) -> Result<PriceBreakdown, PricingError> {
    let periods = split_into_tiers(days, rates.weekly.is_some(), rates.monthly.is_some());
    let units = occupancy.units;

    let mut base_lines = Vec::new();
    if let Some(monthly) = rates.monthly {
        base_lines.extend(line("Month", quantity("months", periods.months, units)?, monthly));
    }
    if let Some(weekly) = rates.weekly {
        base_lines.extend(line("Week", quantity("weeks", periods.weeks, units)?, weekly));
    }
    if periods.days > 0 {
        let daily = rates.daily.ok_or(PricingError::MissingRate {
            tier: "daily",
            days: periods.days,
        })?;
        base_lines.extend(line("Day", quantity("days", periods.days, units)?, daily));
    }

    let mut fees = Vec::new();
    if let Some(insurance) = rates.insurance_per_day {
        fees.push(FeeLine {
            kind: FeeKind::Insurance,
            description: format!("Insurance ({} days)", days),
            amount: insurance * Decimal::from(quantity("insurance days", days, units)?),
        });
    }
    if let Some(deposit) = rates.deposit {
        fees.push(FeeLine {
            kind: FeeKind::Deposit,
            description: "Security deposit".to_string(),
            amount: deposit * Decimal::from(units),
        });
    }

    summarize(
        currency,
        base_lines,
        fees,
        rates.tax_rate.unwrap_or(Decimal::ZERO),
    )
}

fn price_participants(
    rates: &ParticipantRates,
    currency: &str,
    occupancy: &Occupancy,
) -> Result<PriceBreakdown, PricingError> {
    check_limit(
        "participants",
        rates.max_participants,
        occupancy.participants(),
    )?;

    summarize(
        currency,
        participant_lines(rates, occupancy),
        Vec::new(),
        rates.tax_rate,
    )
}

fn price_transfer(
    rates: &TransferRates,
    currency: &str,
    occupancy: &Occupancy,
) -> Result<PriceBreakdown, PricingError> {
    let units = occupancy.units;
    let passengers = occupancy.participants();
    check_limit(
        "passengers",
        rates
            .max_passengers
            .map(|per_vehicle| per_vehicle.saturating_mul(units)),
        passengers,
    )?;

    let base_lines = line("Vehicle", units, rates.base_fare).into_iter().collect();

    let mut fees = Vec::new();
    let extra = passengers.saturating_sub(rates.included_passengers.saturating_mul(units));
    if extra > 0 && rates.per_extra_passenger > Decimal::ZERO {
        fees.push(FeeLine {
            kind: FeeKind::Surcharge,
            description: format!("{} extra passenger(s)", extra),
            amount: rates.per_extra_passenger * Decimal::from(extra),
        });
    }

    summarize(
        currency,
        base_lines,
        fees,
        rates.tax_rate.unwrap_or(Decimal::ZERO),
    )
}
