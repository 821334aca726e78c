//! Availability checks against a resource's reservation calendar.

use serde::Serialize;

use super::calendar::{DateRange, ReservationCalendar};
use super::models::Resource;
use super::store::{BookingStore, StoreError};

/// Outcome of an availability check; "no capacity" is a normal result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub available: bool,
    /// Non-cancelled bookings overlapping the candidate range
    pub conflicting_count: usize,
    /// Peak units held concurrently inside the candidate range
    pub units_held: u32,
    pub units_requested: u32,
    pub capacity: u32,
}

impl Availability {
    pub fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.units_held)
    }
}

/// Compare the calendar's peak usage plus `requested` against `capacity`
pub fn evaluate(
    calendar: &ReservationCalendar,
    range: &DateRange,
    requested: u32,
    capacity: u32,
) -> Availability {
    let units_held = calendar.peak_units(range);
    Availability {
        available: units_held.saturating_add(requested) <= capacity,
        conflicting_count: calendar.overlapping_count(range),
        units_held,
        units_requested: requested,
        capacity,
    }
}

/// Check whether `requested` units of `resource` are free over `range`
pub async fn check_availability(
    store: &dyn BookingStore,
    resource: &Resource,
    range: DateRange,
    requested: u32,
) -> Result<Availability, StoreError> {
    let existing = store.find_overlapping(resource.id, range).await?;
    let calendar = ReservationCalendar::from_bookings(&existing);
    Ok(evaluate(&calendar, &range, requested, resource.capacity))
}
