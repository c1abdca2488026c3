//! Booking service - the entry point for booking use cases
//!
//! Validates input, runs each store operation under the configured deadline
//! and publishes lifecycle events once the write has committed.

use crate::application::outbound::LifecyclePublisher;
use crate::config::BookingSettings;
use crate::domain::booking::{
    Booking, BookingFilter, BookingStatus, BookingStore, PageRequest, TimeRange, Transition,
};
use crate::domain::shared::{require_id, BookingId, DomainError, Result};
use metrics::counter;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

/// Raw list request; every field is optional
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub requester_id: Option<String>,
    pub resource_id: Option<String>,
    /// `YYYY-MM-DD` or an RFC 3339 timestamp; matches any booking touching that UTC day
    pub day: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookingPage {
    pub items: Vec<Booking>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

pub struct BookingService {
    store: Arc<dyn BookingStore>,
    events: LifecyclePublisher,
    settings: BookingSettings,
}

impl BookingService {
    pub fn new(store: Arc<dyn BookingStore>, events: LifecyclePublisher, settings: BookingSettings) -> Self {
        Self {
            store,
            events,
            settings,
        }
    }

    /// Create a PENDING booking from RFC 3339 timestamps.
    pub async fn create(&self, requester_id: &str, resource_id: &str, start: &str, end: &str) -> Result<Booking> {
        let range = TimeRange::parse_rfc3339(start, end)?;
        self.create_in(requester_id, resource_id, range).await
    }

    pub async fn create_in(&self, requester_id: &str, resource_id: &str, range: TimeRange) -> Result<Booking> {
        let requester_id = require_id("requester_id", requester_id)?;
        let resource_id = require_id("resource_id", resource_id)?;

        let mut booking = Booking::new(requester_id, resource_id, range);

        match self.with_deadline(self.store.create_without_overlap(&booking)).await {
            Ok(()) => {}
            Err(DomainError::OverlapConflict) => {
                counter!("booking_conflicts_total").increment(1);
                debug!(resource_id = %booking.resource_id(), "Booking rejected: overlap");
                return Err(DomainError::OverlapConflict);
            }
            Err(e) => return Err(e),
        }

        counter!("bookings_created_total").increment(1);
        info!(
            booking_id = %booking.id(),
            resource_id = %booking.resource_id(),
            start = %range.start(),
            end = %range.end(),
            "Booking created"
        );

        self.events.publish_all(booking.take_events()).await;
        Ok(booking)
    }

    pub async fn confirm(&self, booking_id: &str) -> Result<Booking> {
        self.transition(booking_id, BookingStatus::Confirmed).await
    }

    pub async fn cancel(&self, booking_id: &str) -> Result<Booking> {
        self.transition(booking_id, BookingStatus::Cancelled).await
    }

    pub async fn get(&self, booking_id: &str) -> Result<Booking> {
        let id = BookingId::parse(booking_id)?;
        self.with_deadline(self.store.find_by_id(&id))
            .await?
            .ok_or_else(|| DomainError::NotFound(booking_id.to_string()))
    }

    pub async fn list(&self, query: ListQuery) -> Result<BookingPage> {
        let page = PageRequest::new(query.page, query.page_size, self.settings.default_page_size);
        let window = match non_empty(query.day) {
            Some(day) => Some(TimeRange::parse_day(&day)?),
            None => None,
        };
        let filter = BookingFilter {
            requester_id: non_empty(query.requester_id),
            resource_id: non_empty(query.resource_id),
            window,
        };

        let (items, total) = self.with_deadline(self.store.list(&filter, page)).await?;

        Ok(BookingPage {
            items,
            total,
            page: page.page,
            page_size: page.page_size,
        })
    }

    async fn transition(&self, booking_id: &str, status: BookingStatus) -> Result<Booking> {
        let id = BookingId::parse(booking_id)?;
        let change = self.with_deadline(self.store.update_status(&id, status)).await?;
        let mut booking = change.booking;

        if change.transition == Transition::Changed {
            counter!("booking_transitions_total", "status" => status.as_str()).increment(1);
            info!(booking_id = %id, status = status.as_str(), "Booking status changed");
            self.events.publish_all(booking.take_events()).await;
        } else {
            debug!(booking_id = %id, status = status.as_str(), "Booking already in requested status");
        }

        Ok(booking)
    }

    async fn with_deadline<T, F>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.settings.operation_timeout(), operation)
            .await
            .map_err(|_| DomainError::DeadlineExceeded)?
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
