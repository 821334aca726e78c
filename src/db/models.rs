//! Database row types and their conversion into domain models

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::booking::calendar::DateRange;
use crate::booking::models::{Booking, Resource};
use crate::booking::store::StoreError;

/// Resource row
#[derive(Debug, Clone, FromRow)]
pub struct ResourceRow {
    pub id: Uuid,
    pub owner_id: String,
    pub kind: String,
    pub name: String,
    pub capacity: i32,
    pub currency: String,
    pub pricing: serde_json::Value,
    pub attributes: serde_json::Value,
    pub active: bool,
}

/// Booking row
#[derive(Debug, Clone, FromRow)]
pub struct BookingRow {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub user_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub occupancy: serde_json::Value,
    pub units: i32,
    pub price: serde_json::Value,
    pub status: String,
    pub payment_intent_id: String,
    pub payment_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

fn corrupt(id: Uuid, what: &str, detail: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{} {}: {}", what, id, detail))
}

impl TryFrom<ResourceRow> for Resource {
    type Error = StoreError;

    fn try_from(row: ResourceRow) -> Result<Self, Self::Error> {
        let capacity = u32::try_from(row.capacity).map_err(|_| {
            corrupt(
                row.id,
                "resource",
                format!("negative capacity {}", row.capacity),
            )
        })?;

        Ok(Resource {
            id: row.id,
            owner_id: row.owner_id,
            kind: row.kind.parse().map_err(|e| corrupt(row.id, "resource", e))?,
            name: row.name,
            capacity,
            currency: row.currency,
            pricing: serde_json::from_value(row.pricing)
                .map_err(|e| corrupt(row.id, "resource", e))?,
            attributes: row.attributes,
            active: row.active,
        })
    }
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let id = row.id;
        Ok(Booking {
            id,
            resource_id: row.resource_id,
            user_id: row.user_id,
            range: DateRange::new(row.start_date, row.end_date)
                .map_err(|e| corrupt(id, "booking", e))?,
            occupancy: serde_json::from_value(row.occupancy)
                .map_err(|e| corrupt(id, "booking", e))?,
            units: u32::try_from(row.units)
                .map_err(|_| corrupt(id, "booking", format!("negative units {}", row.units)))?,
            price: serde_json::from_value(row.price).map_err(|e| corrupt(id, "booking", e))?,
            status: row.status.parse().map_err(|e| corrupt(id, "booking", e))?,
            payment_intent_id: row.payment_intent_id,
            payment_status: row.payment_status.parse().map_err(|e| corrupt(id, "booking", e))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            cancelled_at: row.cancelled_at,
        })
    }
}
