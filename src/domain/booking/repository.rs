//! Booking store interface
//!
//! Defined in the domain layer as a trait (port) and implemented in the
//! infrastructure layer (adapter). Every method that writes runs as one
//! transaction inside the store.

use crate::domain::booking::aggregate::Booking;
use crate::domain::booking::value_object::{BookingStatus, TimeRange, Transition};
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::BookingId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Ledger entry proving an inbound event has already produced its effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedEvent {
    /// Natural key of the upstream event, e.g. the payment id
    pub event_id: String,
    pub event_kind: String,
    pub processed_at: DateTime<Utc>,
}

/// Outcome of an idempotent confirmation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    /// PENDING -> CONFIRMED was applied; the booking carries the recorded event
    Applied(Booking),
    /// First delivery, but the booking was not PENDING; only the ledger was written
    Unchanged(Booking),
    /// The event id was already in the ledger; nothing was written
    Duplicate(Booking),
}

impl ConfirmOutcome {
    pub fn booking(&self) -> &Booking {
        match self {
            ConfirmOutcome::Applied(b) | ConfirmOutcome::Unchanged(b) | ConfirmOutcome::Duplicate(b) => b,
        }
    }
}

/// Result of an explicit status write
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub booking: Booking,
    pub transition: Transition,
}

/// Filters for booking queries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingFilter {
    pub requester_id: Option<String>,
    pub resource_id: Option<String>,
    /// Keep bookings whose interval overlaps this window
    pub window: Option<TimeRange>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        if let Some(ref requester_id) = self.requester_id {
            if booking.requester_id() != requester_id {
                return false;
            }
        }
        if let Some(ref resource_id) = self.resource_id {
            if booking.resource_id() != resource_id {
                return false;
            }
        }
        if let Some(ref window) = self.window {
            if !booking.range().overlaps(window) {
                return false;
            }
        }
        true
    }
}

/// Zero-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    /// Clamp a raw request: negative pages become 0, a missing or
    /// non-positive size falls back to `default_size`.
    pub fn new(page: Option<i64>, page_size: Option<i64>, default_size: i64) -> Self {
        let page = page.unwrap_or(0).max(0);
        let page_size = match page_size {
            Some(size) if size > 0 => size,
            _ => default_size,
        };
        Self { page, page_size }
    }

    pub fn offset(&self) -> i64 {
        self.page.saturating_mul(self.page_size)
    }
}

/// Repository interface for the Booking aggregate and the processed-event ledger
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert `booking` unless an active booking on the same resource
    /// overlaps its range. Fails with `OverlapConflict` and writes nothing
    /// when one does.
    async fn create_without_overlap(&self, booking: &Booking) -> Result<()>;

    /// Find a booking by its ID
    async fn find_by_id(&self, id: &BookingId) -> Result<Option<Booking>>;

    /// Lock the booking, apply the state machine and persist the new status
    async fn update_status(&self, id: &BookingId, status: BookingStatus) -> Result<StatusChange>;

    /// Confirm a booking at most once per `event_id`, writing the ledger
    /// entry in the same transaction as the status change.
    async fn confirm_if_not_processed(
        &self,
        booking_id: &BookingId,
        event_id: &str,
        event_kind: &str,
    ) -> Result<ConfirmOutcome>;

    /// List bookings ordered by start time, with the total matching count
    async fn list(&self, filter: &BookingFilter, page: PageRequest) -> Result<(Vec<Booking>, i64)>;

    /// Look up a ledger entry
    async fn find_processed_event(&self, event_id: &str) -> Result<Option<ProcessedEvent>>;
}
