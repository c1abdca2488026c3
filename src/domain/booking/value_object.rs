//! Booking value objects

use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use chrono::{DateTime, Duration, NaiveDate, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Booking lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BookingStatus {
    /// Created, waiting for payment or an explicit confirmation
    Pending,
    /// Paid or confirmed by an owner/admin
    Confirmed,
    /// Released by the requester or an admin
    Cancelled,
}

/// Result of applying a status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The status moved to a new state
    Changed,
    /// The booking was already in the requested state
    Unchanged,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(BookingStatus::Pending),
            "CONFIRMED" => Some(BookingStatus::Confirmed),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    /// Active bookings hold their slot and take part in the overlap check.
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    /// Check if moving to a different state is allowed
    pub fn can_transition_to(&self, new_status: BookingStatus) -> bool {
        use BookingStatus::*;

        match (self, new_status) {
            (Pending, Confirmed) => true,
            (Pending, Cancelled) => true,
            (Confirmed, Cancelled) => true,

            // Nothing leaves CANCELLED and nothing goes back to PENDING
            _ => false,
        }
    }

    /// Apply a status change. Re-entering the current state is a no-op.
    pub fn transition(&self, new_status: BookingStatus) -> Result<Transition> {
        if *self == new_status {
            return Ok(Transition::Unchanged);
        }
        if !self.can_transition_to(new_status) {
            return Err(DomainError::InvalidStateTransition {
                from: self.as_str(),
                to: new_status.as_str(),
            });
        }
        Ok(Transition::Changed)
    }
}

/// Storage keeps microseconds; finer digits are dropped on construction.
const SUBSEC_DIGITS: u16 = 6;

/// Half-open UTC interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        let start = start.trunc_subsecs(SUBSEC_DIGITS);
        let end = end.trunc_subsecs(SUBSEC_DIGITS);
        if end <= start {
            return Err(DomainError::InvalidRange);
        }
        Ok(Self { start, end })
    }

    /// Parse two RFC 3339 timestamps (any offset) into a UTC range.
    pub fn parse_rfc3339(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_instant("start", start)?, parse_instant("end", end)?)
    }

    /// The UTC calendar day `[00:00, 00:00 + 24h)`.
    pub fn day(date: NaiveDate) -> Self {
        let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
        Self {
            start,
            end: start + Duration::hours(24),
        }
    }

    /// Accepts either a plain date (`2025-03-01`) or a full RFC 3339
    /// timestamp, whose UTC date is used.
    pub fn parse_day(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Self::day(date));
        }
        let instant = parse_instant("day", s)?;
        Ok(Self::day(instant.date_naive()))
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Half-open overlap: `a.start < b.end && b.start < a.end`
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

fn parse_instant(field: &str, s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DomainError::InvalidInput(format!("{} is not an RFC 3339 timestamp: {}", field, e)))
}
