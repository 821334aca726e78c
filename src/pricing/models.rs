//! Rate tables and price breakdown values.
//!
//! Rate tables are stored as JSON on the resource row; the breakdown is
//! computed once at booking time and frozen on the booking.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Children pay 70% of the tour base price unless the table says otherwise
pub const DEFAULT_CHILD_DISCOUNT: Decimal = dec!(0.30);
/// Seniors pay 80% of the tour base price unless the table says otherwise
pub const DEFAULT_SENIOR_DISCOUNT: Decimal = dec!(0.20);
/// Tour tax rate applied to the participant subtotal
pub const DEFAULT_TOUR_TAX_RATE: Decimal = dec!(0.10);

/// Rate schedule attached to a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PricingTable {
    Nightly(NightlyRates),
    Tiered(TieredRates),
    Participants(ParticipantRates),
    Transfer(TransferRates),
}

/// Per-night room pricing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NightlyRates {
    pub nightly_rate: Decimal,
    #[serde(default)]
    pub cleaning_fee: Option<Decimal>,
    #[serde(default)]
    pub tax_rate: Option<Decimal>,
    #[serde(default)]
    pub max_guests_per_unit: Option<u32>,
}

/// Daily/weekly/monthly rental pricing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TieredRates {
    #[serde(default)]
    pub daily: Option<Decimal>,
    #[serde(default)]
    pub weekly: Option<Decimal>,
    #[serde(default)]
    pub monthly: Option<Decimal>,
    #[serde(default)]
    pub insurance_per_day: Option<Decimal>,
    #[serde(default)]
    pub deposit: Option<Decimal>,
    #[serde(default)]
    pub tax_rate: Option<Decimal>,
}

/// Per-participant tour pricing with category discounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRates {
    pub base_price: Decimal,
    #[serde(default = "default_child_discount")]
    pub child_discount: Decimal,
    #[serde(default = "default_senior_discount")]
    pub senior_discount: Decimal,
    #[serde(default = "default_tour_tax_rate")]
    pub tax_rate: Decimal,
    #[serde(default)]
    pub max_participants: Option<u32>,
}

fn default_child_discount() -> Decimal {
    DEFAULT_CHILD_DISCOUNT
}

fn default_senior_discount() -> Decimal {
    DEFAULT_SENIOR_DISCOUNT
}

fn default_tour_tax_rate() -> Decimal {
    DEFAULT_TOUR_TAX_RATE
}

/// Per-vehicle transfer pricing with a passenger overage surcharge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRates {
    pub base_fare: Decimal,
    #[serde(default = "default_included_passengers")]
    pub included_passengers: u32,
    #[serde(default)]
    pub per_extra_passenger: Decimal,
    #[serde(default)]
    pub tax_rate: Option<Decimal>,
    #[serde(default)]
    pub max_passengers: Option<u32>,
}

fn default_included_passengers() -> u32 {
    4
}

/// Units and people requested against a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupancy {
    #[serde(default = "default_units")]
    pub units: u32,
    #[serde(default = "default_adults")]
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub seniors: u32,
}

fn default_units() -> u32 {
    1
}

fn default_adults() -> u32 {
    1
}

impl Occupancy {
    pub fn new(units: u32, adults: u32, children: u32, seniors: u32) -> Self {
        Self {
            units,
            adults,
            children,
            seniors,
        }
    }

    /// A single unit held by a single adult
    pub fn single() -> Self {
        Self::new(1, 1, 0, 0)
    }

    pub fn participants(&self) -> u32 {
        self.adults + self.children + self.seniors
    }
}

impl Default for Occupancy {
    fn default() -> Self {
        Self::single()
    }
}

/// Kind of fee added on top of the base amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeKind {
    Cleaning,
    Insurance,
    Deposit,
    Surcharge,
}

impl FeeKind {
    /// Deposits are refundable holds and stay outside the tax base
    pub fn is_taxable(&self) -> bool {
        !matches!(self, FeeKind::Deposit)
    }
}

/// One itemised line of the base amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLine {
    pub description: String,
    pub quantity: u32,
    pub unit_amount: Decimal,
    pub amount: Decimal,
}

/// One fee line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeLine {
    pub kind: FeeKind,
    pub description: String,
    pub amount: Decimal,
}

/// Frozen, itemised result of a single pricing computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub currency: String,
    pub base_lines: Vec<PriceLine>,
    pub base_amount: Decimal,
    pub fees: Vec<FeeLine>,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub total_minor_units: i64,
}

impl PriceBreakdown {
    pub fn fee_total(&self) -> Decimal {
        self.fees.iter().map(|f| f.amount).sum()
    }
}
