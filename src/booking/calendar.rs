//! Date intervals and per-resource reservation calendars.
//!
//! Intervals are half-open `[start, end)` calendar-date ranges: `end` is the
//! checkout/return date and is not occupied, so back-to-back bookings never
//! conflict.

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::error::AppError;

use super::models::Booking;

/// Half-open date interval with `end > start`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, AppError> {
        if end <= start {
            return Err(AppError::validation(format!(
                "End date {} must be after start date {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// Single-day interval `[day, day + 1)`
    pub fn single_day(day: NaiveDate) -> Result<Self, AppError> {
        let end = day
            .checked_add_days(Days::new(1))
            .ok_or_else(|| AppError::validation(format!("Date {} is out of range", day)))?;
        Self::new(day, end)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of nights (or rental days) covered
    pub fn days(&self) -> u32 {
        u32::try_from((self.end - self.start).num_days()).unwrap_or(u32::MAX)
    }

    /// `a < d && c < b` for `[a, b)` and `[c, d)`
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day < self.end
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Non-cancelled reservations held against one resource
#[derive(Debug, Clone, Default)]
pub struct ReservationCalendar {
    entries: Vec<(DateRange, u32)>,
}

impl ReservationCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored bookings; cancelled bookings hold nothing
    pub fn from_bookings<'a, I>(bookings: I) -> Self
    where
        I: IntoIterator<Item = &'a Booking>,
    {
        let mut calendar = Self::new();
        for booking in bookings {
            if booking.holds_capacity() {
                calendar.hold(booking.range, booking.units);
            }
        }
        calendar
    }

    pub fn hold(&mut self, range: DateRange, units: u32) {
        self.entries.push((range, units));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of reservations overlapping `range`
    pub fn overlapping_count(&self, range: &DateRange) -> usize {
        self.entries
            .iter()
            .filter(|(held, _)| held.overlaps(range))
            .count()
    }

    /// Maximum units held concurrently on any day inside `range`.
    ///
    /// Sweeps interval endpoints clipped to `range`; on a shared date, releases
    /// are applied before acquisitions.
    pub fn peak_units(&self, range: &DateRange) -> u32 {
        let mut events: Vec<(NaiveDate, i64)> = Vec::new();
        for (held, units) in &self.entries {
            if !held.overlaps(range) {
                continue;
            }
            let units = i64::from(*units);
            events.push((held.start.max(range.start), units));
            events.push((held.end.min(range.end), -units));
        }

        // Negative deltas sort first within the same date
        events.sort();

        let mut current: i64 = 0;
        let mut peak: i64 = 0;
        for (_, delta) in events {
            current += delta;
            peak = peak.max(current);
        }

        u32::try_from(peak).unwrap_or(u32::MAX)
    }
}
