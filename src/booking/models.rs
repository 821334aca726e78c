//! Resource and booking models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::pricing::models::{Occupancy, PriceBreakdown, PricingTable};

use super::calendar::DateRange;

/// Kind of bookable inventory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Room type with `capacity` identical rooms
    Room,
    /// Rental vehicle
    Vehicle,
    /// Tour departure; capacity counts seats
    TourSlot,
    /// Transfer vehicle
    TransferVehicle,
}

const ROOM_PROGRESSION: &[BookingStatus] = &[
    BookingStatus::Pending,
    BookingStatus::Confirmed,
    BookingStatus::CheckedIn,
    BookingStatus::CheckedOut,
];

const TRIP_PROGRESSION: &[BookingStatus] = &[
    BookingStatus::Pending,
    BookingStatus::Confirmed,
    BookingStatus::InProgress,
    BookingStatus::Completed,
];

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Room => "room",
            ResourceKind::Vehicle => "vehicle",
            ResourceKind::TourSlot => "tour_slot",
            ResourceKind::TransferVehicle => "transfer_vehicle",
        }
    }

    /// Forward status progression, excluding `cancelled`
    pub fn progression(&self) -> &'static [BookingStatus] {
        match self {
            ResourceKind::Room => ROOM_PROGRESSION,
            ResourceKind::Vehicle | ResourceKind::TourSlot | ResourceKind::TransferVehicle => {
                TRIP_PROGRESSION
            }
        }
    }

    /// Units of capacity a booking with `occupancy` holds
    pub fn units_held(&self, occupancy: &Occupancy) -> u32 {
        match self {
            ResourceKind::TourSlot => occupancy.participants(),
            ResourceKind::Room | ResourceKind::Vehicle | ResourceKind::TransferVehicle => {
                occupancy.units
            }
        }
    }

    /// Tours and transfers occupy a single day when no end is given
    pub fn is_single_day(&self) -> bool {
        matches!(self, ResourceKind::TourSlot | ResourceKind::TransferVehicle)
    }

    pub fn resolve_range(
        &self,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<DateRange, AppError> {
        match end {
            Some(end) => DateRange::new(start, end),
            None if self.is_single_day() => DateRange::single_day(start),
            None => Err(AppError::validation(format!(
                "An end date is required for {} bookings",
                self.as_str()
            ))),
        }
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "room" => Ok(ResourceKind::Room),
            "vehicle" => Ok(ResourceKind::Vehicle),
            "tour_slot" => Ok(ResourceKind::TourSlot),
            "transfer_vehicle" => Ok(ResourceKind::TransferVehicle),
            other => Err(AppError::validation(format!("Unknown resource kind '{}'", other))),
        }
    }
}

/// Bookable inventory unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: Uuid,
    pub owner_id: String,
    pub kind: ResourceKind,
    pub name: String,
    /// Count of identical units (rooms, vehicles, seats)
    pub capacity: u32,
    pub currency: String,
    pub pricing: PricingTable,
    /// Category, features and other owner-defined attributes
    #[serde(default)]
    pub attributes: serde_json::Value,
    /// Soft-deactivation flag; resources are never deleted while booked
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Booking status across all resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    CheckedIn,
    CheckedOut,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::CheckedIn => "checked_in",
            BookingStatus::CheckedOut => "checked_out",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "checked_in" => Ok(BookingStatus::CheckedIn),
            "checked_out" => Ok(BookingStatus::CheckedOut),
            "in_progress" => Ok(BookingStatus::InProgress),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(AppError::validation(format!("Unknown booking status '{}'", other))),
        }
    }
}

/// Payment state of the booking's payment intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Captured,
    Failed,
    Refunded,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Captured => "captured",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "captured" => Ok(PaymentStatus::Captured),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            other => Err(AppError::validation(format!("Unknown payment status '{}'", other))),
        }
    }
}

/// Role of an actor relative to one booking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRole {
    /// The user who made the booking
    Requester,
    /// The owner of the booked resource
    Owner,
    Administrator,
}

/// Authenticated caller as reported by the upstream auth layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub is_admin: bool,
}

impl Actor {
    pub fn user<T: Into<String>>(user_id: T) -> Self {
        Self {
            user_id: user_id.into(),
            is_admin: false,
        }
    }

    pub fn admin<T: Into<String>>(user_id: T) -> Self {
        Self {
            user_id: user_id.into(),
            is_admin: true,
        }
    }

    /// Role relative to `booking` on `resource`, if any
    pub fn role_for(&self, booking: &Booking, resource: &Resource) -> Option<ActorRole> {
        if self.is_admin {
            Some(ActorRole::Administrator)
        } else if self.user_id == booking.user_id {
            Some(ActorRole::Requester)
        } else if self.user_id == resource.owner_id {
            Some(ActorRole::Owner)
        } else {
            None
        }
    }
}

/// Typed booking request after boundary validation
#[derive(Debug, Clone, PartialEq)]
pub struct BookingRequest {
    pub resource_id: Uuid,
    pub user_id: String,
    pub start_date: NaiveDate,
    /// Optional for single-day resources
    pub end_date: Option<NaiveDate>,
    pub occupancy: Occupancy,
}

/// Persisted reservation
#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub user_id: String,
    pub range: DateRange,
    pub occupancy: Occupancy,
    /// Units of capacity held while not cancelled
    pub units: u32,
    /// Frozen at creation; never recomputed
    pub price: PriceBreakdown,
    pub status: BookingStatus,
    pub payment_intent_id: String,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// New booking awaiting payment
    pub fn pending(
        id: Uuid,
        resource: &Resource,
        user_id: String,
        range: DateRange,
        occupancy: Occupancy,
        price: PriceBreakdown,
        payment_intent_id: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            resource_id: resource.id,
            user_id,
            range,
            units: resource.kind.units_held(&occupancy),
            occupancy,
            price,
            status: BookingStatus::Pending,
            payment_intent_id,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
            cancelled_at: None,
        }
    }

    pub fn holds_capacity(&self) -> bool {
        self.status != BookingStatus::Cancelled
    }
}
