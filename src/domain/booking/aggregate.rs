//! Booking aggregate root

use crate::domain::booking::event::{
    BookingCancelled, BookingConfirmed, BookingCreated, BookingEvent,
};
use crate::domain::booking::value_object::{BookingStatus, TimeRange, Transition};
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::BookingId;
use chrono::{DateTime, Utc};

/// Booking aggregate root
///
/// Holds one resource for one half-open time range and owns the status
/// rules. Rows are never deleted; a released slot is `Cancelled`.
#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    id: BookingId,
    requester_id: String,
    resource_id: String,
    range: TimeRange,
    status: BookingStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// Pending domain events
    events: Vec<BookingEvent>,
}

impl Booking {
    /// Create a new pending booking with a fresh id
    pub fn new(requester_id: String, resource_id: String, range: TimeRange) -> Self {
        let now = Utc::now();
        let id = BookingId::new();
        let mut booking = Self {
            id,
            requester_id,
            resource_id,
            range,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
            events: Vec::new(),
        };

        booking.record_event(BookingEvent::Created(BookingCreated::new(
            id,
            &booking.requester_id,
            &booking.resource_id,
            &range,
        )));

        booking
    }

    /// Rebuild a booking from storage. No events are recorded.
    pub fn restore(
        id: BookingId,
        requester_id: String,
        resource_id: String,
        range: TimeRange,
        status: BookingStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            requester_id,
            resource_id,
            range,
            status,
            created_at,
            updated_at,
            events: Vec::new(),
        }
    }

    pub fn confirm(&mut self) -> Result<Transition> {
        self.transition_to(BookingStatus::Confirmed)
    }

    pub fn cancel(&mut self) -> Result<Transition> {
        self.transition_to(BookingStatus::Cancelled)
    }

    /// Move to `new_status`, recording the matching event when the status
    /// actually changes.
    pub fn transition_to(&mut self, new_status: BookingStatus) -> Result<Transition> {
        let transition = self.status.transition(new_status)?;
        if transition == Transition::Unchanged {
            return Ok(transition);
        }

        self.status = new_status;
        self.updated_at = Utc::now();

        let occurred_at = self.updated_at;
        match new_status {
            BookingStatus::Confirmed => self.record_event(BookingEvent::Confirmed(BookingConfirmed {
                booking_id: self.id,
                occurred_at,
            })),
            BookingStatus::Cancelled => self.record_event(BookingEvent::Cancelled(BookingCancelled {
                booking_id: self.id,
                occurred_at,
            })),
            BookingStatus::Pending => {}
        }

        Ok(transition)
    }

    /// Record a domain event
    fn record_event(&mut self, event: BookingEvent) {
        self.events.push(event);
    }

    /// Take all pending events
    pub fn take_events(&mut self) -> Vec<BookingEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn pending_events(&self) -> &[BookingEvent] {
        &self.events
    }

    // Getters
    pub fn id(&self) -> &BookingId {
        &self.id
    }

    pub fn requester_id(&self) -> &str {
        &self.requester_id
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn range(&self) -> &TimeRange {
        &self.range
    }

    pub fn status(&self) -> BookingStatus {
        self.status
    }

    pub fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    pub fn updated_at(&self) -> &DateTime<Utc> {
        &self.updated_at
    }

    /// Whether this booking holds its slot against `other` on the same resource
    pub fn conflicts_with(&self, resource_id: &str, range: &TimeRange) -> bool {
        self.status.is_active() && self.resource_id == resource_id && self.range.overlaps(range)
    }
}
