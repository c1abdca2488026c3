//! Booking API DTOs

use crate::application::{BookingPage, ListQuery};
use crate::domain::booking::Booking;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Create booking request
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub user_id: String,
    pub court_id: String,
    /// RFC 3339
    pub start_iso: String,
    /// RFC 3339
    pub end_iso: String,
}

/// Booking response
#[derive(Debug, Serialize, Deserialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub user_id: String,
    pub court_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        BookingResponse {
            id: booking.id().as_uuid(),
            user_id: booking.requester_id().to_string(),
            court_id: booking.resource_id().to_string(),
            start_time: booking.range().start(),
            end_time: booking.range().end(),
            status: booking.status().as_str().to_string(),
            created_at: *booking.created_at(),
            updated_at: *booking.updated_at(),
        }
    }
}

/// Booking list response
#[derive(Debug, Serialize, Deserialize)]
pub struct BookingListResponse {
    pub bookings: Vec<BookingResponse>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

impl From<BookingPage> for BookingListResponse {
    fn from(page: BookingPage) -> Self {
        BookingListResponse {
            bookings: page.items.into_iter().map(Into::into).collect(),
            total: page.total,
            page: page.page,
            page_size: page.page_size,
        }
    }
}

/// Query parameters for listing bookings; `page` is zero-based
#[derive(Debug, Default, Deserialize)]
pub struct ListBookingsQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub user_id: Option<String>,
    pub court_id: Option<String>,
    pub day: Option<String>,
}

impl From<ListBookingsQuery> for ListQuery {
    fn from(q: ListBookingsQuery) -> Self {
        ListQuery {
            page: q.page,
            page_size: q.page_size,
            requester_id: q.user_id,
            resource_id: q.court_id,
            day: q.day,
        }
    }
}

/// Generic API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::TimeRange;

    #[test]
    fn test_booking_response_fields() {
        let range = TimeRange::parse_rfc3339("2025-03-01T17:00:00+07:00", "2025-03-01T18:00:00+07:00").unwrap();
        let booking = Booking::new("u1".to_string(), "c1".to_string(), range);
        let id = booking.id().as_uuid();

        let json = serde_json::to_value(BookingResponse::from(booking)).unwrap();
        assert_eq!(json["id"], id.to_string());
        assert_eq!(json["user_id"], "u1");
        assert_eq!(json["court_id"], "c1");
        assert_eq!(json["status"], "PENDING");
        assert_eq!(json["start_time"], "2025-03-01T10:00:00Z");
    }

    #[test]
    fn test_error_response_omits_data() {
        let json = serde_json::to_value(ApiResponse::<()>::error("boom".to_string())).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "boom");
        assert!(json.get("data").is_none());
    }
}
