//! Booking lifecycle events
//!
//! Published after the state change they describe has been committed. The
//! wire payloads keep the field names downstream consumers already read.

use crate::domain::booking::value_object::TimeRange;
use crate::domain::shared::events::DomainEvent;
use crate::domain::shared::value_objects::BookingId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Booking created event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingCreated {
    pub booking_id: BookingId,
    #[serde(rename = "user_id")]
    pub requester_id: String,
    #[serde(rename = "court_id")]
    pub resource_id: String,
    /// Epoch seconds
    pub start: i64,
    /// Epoch seconds
    pub end: i64,
    #[serde(skip, default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
}

impl BookingCreated {
    pub fn new(booking_id: BookingId, requester_id: &str, resource_id: &str, range: &TimeRange) -> Self {
        Self {
            booking_id,
            requester_id: requester_id.to_string(),
            resource_id: resource_id.to_string(),
            start: range.start().timestamp(),
            end: range.end().timestamp(),
            occurred_at: Utc::now(),
        }
    }
}

impl DomainEvent for BookingCreated {
    fn event_type(&self) -> &'static str {
        "booking.created"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Booking confirmed event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingConfirmed {
    pub booking_id: BookingId,
    #[serde(skip, default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for BookingConfirmed {
    fn event_type(&self) -> &'static str {
        "booking.confirmed"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Booking cancelled event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingCancelled {
    pub booking_id: BookingId,
    #[serde(skip, default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for BookingCancelled {
    fn event_type(&self) -> &'static str {
        "booking.cancelled"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Union of all booking events
#[derive(Debug, Clone, PartialEq)]
pub enum BookingEvent {
    Created(BookingCreated),
    Confirmed(BookingConfirmed),
    Cancelled(BookingCancelled),
}

impl BookingEvent {
    pub fn booking_id(&self) -> &BookingId {
        match self {
            BookingEvent::Created(e) => &e.booking_id,
            BookingEvent::Confirmed(e) => &e.booking_id,
            BookingEvent::Cancelled(e) => &e.booking_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            BookingEvent::Created(e) => e.event_type(),
            BookingEvent::Confirmed(e) => e.event_type(),
            BookingEvent::Cancelled(e) => e.event_type(),
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BookingEvent::Created(e) => e.occurred_at(),
            BookingEvent::Confirmed(e) => e.occurred_at(),
            BookingEvent::Cancelled(e) => e.occurred_at(),
        }
    }

    /// JSON body published on the event channel
    pub fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        match self {
            BookingEvent::Created(e) => serde_json::to_vec(e),
            BookingEvent::Confirmed(e) => serde_json::to_vec(e),
            BookingEvent::Cancelled(e) => serde_json::to_vec(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::Value;

    #[test]
    fn test_created_payload_fields() {
        let range = TimeRange::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 1, 11, 0, 0).unwrap(),
        )
        .unwrap();
        let id = BookingId::new();
        let event = BookingEvent::Created(BookingCreated::new(id, "u1", "c1", &range));

        let json: Value = serde_json::from_slice(&event.to_payload().unwrap()).unwrap();
        assert_eq!(json["booking_id"], id.to_string());
        assert_eq!(json["user_id"], "u1");
        assert_eq!(json["court_id"], "c1");
        assert_eq!(json["start"], range.start().timestamp());
        assert_eq!(json["end"], range.end().timestamp());
        assert!(json.get("occurred_at").is_none());
        assert_eq!(event.event_type(), "booking.created");
    }

    #[test]
    fn test_simple_payloads() {
        let id = BookingId::new();
        let confirmed = BookingEvent::Confirmed(BookingConfirmed {
            booking_id: id,
            occurred_at: Utc::now(),
        });
        let json: Value = serde_json::from_slice(&confirmed.to_payload().unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({ "booking_id": id.to_string() }));
        assert_eq!(confirmed.booking_id(), &id);
    }
}
