//! Core pricing calculation functions.
//!
//! Pure functions for pricing math - no store access.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;

use super::models::{FeeLine, Occupancy, ParticipantRates, PriceBreakdown, PriceLine};
use super::services::PricingError;

/// Days counted as one month by the tiered rental rule
pub const DAYS_PER_MONTH: u32 = 30;
/// Days counted as one week by the tiered rental rule
pub const DAYS_PER_WEEK: u32 = 7;

/// Currencies without a minor unit (amounts are sent to the processor as-is)
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "BIF", "CLP", "DJF", "GNF", "JPY", "KMF", "KRW", "MGA", "PYG", "RWF", "UGX", "VND", "VUV",
    "XAF", "XOF", "XPF",
];

/// Round to specified decimal places using banker's rounding (ROUND_HALF_EVEN).
///
/// Banker's rounding rounds to the nearest even number when the value is exactly
/// halfway between two possibilities. This reduces cumulative rounding bias.
///
/// # Examples
/// ```
/// use rust_decimal_macros::dec;
/// use booking_engine::pricing::round_money;
///
/// assert_eq!(round_money(dec!(2.5), 0), dec!(2));   // rounds to even
/// assert_eq!(round_money(dec!(3.5), 0), dec!(4));   // rounds to even
/// assert_eq!(round_money(dec!(1.234), 2), dec!(1.23));
/// ```
pub fn round_money(amount: Decimal, places: u32) -> Decimal {
    amount.round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven)
}

/// Number of decimal places of the currency's minor unit
pub fn minor_unit_exponent(currency: &str) -> u32 {
    let upper = currency.to_ascii_uppercase();
    if ZERO_DECIMAL_CURRENCIES.contains(&upper.as_str()) {
        0
    } else {
        2
    }
}

/// Convert a decimal amount into integer minor units (cents) by rounding.
///
/// Returns `None` when the amount does not fit in an `i64`.
pub fn to_minor_units(amount: Decimal, currency: &str) -> Option<i64> {
    let exponent = minor_unit_exponent(currency);
    let scaled = round_money(amount, exponent) * Decimal::from(10i64.pow(exponent));
    scaled.to_i64()
}

/// Whole-period split of a rental duration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierPeriods {
    pub months: u32,
    pub weeks: u32,
    pub days: u32,
}

/// Split a rental duration into months, weeks and remainder days.
///
/// The coarsest configured tier is taken first: whole 30-day months when a
/// monthly rate exists, then whole weeks of what is left when a weekly rate
/// exists, and the rest as single days.
pub fn split_into_tiers(total_days: u32, has_weekly: bool, has_monthly: bool) -> TierPeriods {
    let mut remaining = total_days;

    let months = if has_monthly && remaining >= DAYS_PER_MONTH {
        remaining / DAYS_PER_MONTH
    } else {
        0
    };
    remaining -= months * DAYS_PER_MONTH;

    let weeks = if has_weekly && remaining >= DAYS_PER_WEEK {
        remaining / DAYS_PER_WEEK
    } else {
        0
    };
    remaining -= weeks * DAYS_PER_WEEK;

    TierPeriods {
        months,
        weeks,
        days: remaining,
    }
}

/// Build a base line, skipping empty quantities
pub fn line(description: &str, quantity: u32, unit_amount: Decimal) -> Option<PriceLine> {
    if quantity == 0 {
        return None;
    }
    Some(PriceLine {
        description: description.to_string(),
        quantity,
        unit_amount,
        amount: round_money(unit_amount * Decimal::from(quantity), 2),
    })
}

/// Price of one participant after a category discount
pub fn discounted_price(base_price: Decimal, discount: Decimal) -> Decimal {
    round_money(base_price * (Decimal::ONE - discount), 2)
}

/// Base lines for a tour: one line per participant category present
pub fn participant_lines(rates: &ParticipantRates, occupancy: &Occupancy) -> Vec<PriceLine> {
    [
        line("Adult", occupancy.adults, rates.base_price),
        line(
            "Child",
            occupancy.children,
            discounted_price(rates.base_price, rates.child_discount),
        ),
        line(
            "Senior",
            occupancy.seniors,
            discounted_price(rates.base_price, rates.senior_discount),
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Aggregate base lines and fees into a frozen breakdown.
///
/// Tax applies to the base amount plus taxable fees; deposits stay outside
/// the tax base but are part of the total.
pub fn summarize(
    currency: &str,
    base_lines: Vec<PriceLine>,
    fees: Vec<FeeLine>,
    tax_rate: Decimal,
) -> Result<PriceBreakdown, PricingError> {
    let base_amount: Decimal = base_lines.iter().map(|l| l.amount).sum();
    let fee_amount: Decimal = fees.iter().map(|f| f.amount).sum();
    let taxable_fees: Decimal = fees
        .iter()
        .filter(|f| f.kind.is_taxable())
        .map(|f| f.amount)
        .sum();

    let subtotal = base_amount + fee_amount;
    let tax_amount = round_money((base_amount + taxable_fees) * tax_rate, 2);
    let total = subtotal + tax_amount;

    let total_minor_units =
        to_minor_units(total, currency).ok_or(PricingError::AmountOutOfRange { amount: total })?;

    Ok(PriceBreakdown {
        currency: currency.to_string(),
        base_lines,
        base_amount,
        fees,
        subtotal,
        tax_rate,
        tax_amount,
        total,
        total_minor_units,
    })
}
