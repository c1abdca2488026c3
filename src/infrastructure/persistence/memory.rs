//! In-memory booking store
//!
//! One mutex guards bookings and the processed-event ledger together, so
//! each operation is atomic in the same way a database transaction is.
//! Failure and latency can be injected for tests.

use crate::domain::booking::{
    Booking, BookingFilter, BookingStatus, BookingStore, ConfirmOutcome, PageRequest,
    ProcessedEvent, StatusChange, Transition,
};
use crate::domain::shared::{BookingId, DomainError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

#[derive(Default)]
struct State {
    bookings: HashMap<BookingId, Booking>,
    processed: HashMap<String, ProcessedEvent>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    unavailable: AtomicBool,
    latency_ms: AtomicU64,
}

#[derive(Clone, Default)]
pub struct InMemoryBookingStore {
    inner: Arc<Inner>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every operation with `StorageUnavailable` while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every operation, holding the lock, by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.inner
            .latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.inner.state.lock().await.bookings.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn processed_count(&self) -> usize {
        self.inner.state.lock().await.processed.len()
    }

    async fn begin(&self) -> Result<MutexGuard<'_, State>> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::StorageUnavailable("store offline".to_string()));
        }
        let state = self.inner.state.lock().await;
        let latency = self.inner.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        Ok(state)
    }
}

fn stored(booking: &Booking) -> Booking {
    let mut copy = booking.clone();
    copy.take_events();
    copy
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn create_without_overlap(&self, booking: &Booking) -> Result<()> {
        let mut state = self.begin().await?;

        let conflict = state
            .bookings
            .values()
            .any(|b| b.conflicts_with(booking.resource_id(), booking.range()));
        if conflict {
            debug!(resource_id = %booking.resource_id(), "Overlap detected");
            return Err(DomainError::OverlapConflict);
        }

        state.bookings.insert(*booking.id(), stored(booking));
        Ok(())
    }

    async fn find_by_id(&self, id: &BookingId) -> Result<Option<Booking>> {
        let state = self.begin().await?;
        Ok(state.bookings.get(id).cloned())
    }

    async fn update_status(&self, id: &BookingId, status: BookingStatus) -> Result<StatusChange> {
        let mut state = self.begin().await?;

        let mut booking = state
            .bookings
            .get(id)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(id.to_string()))?;

        let transition = booking.transition_to(status)?;
        if transition == Transition::Changed {
            state.bookings.insert(*id, stored(&booking));
        }

        Ok(StatusChange { booking, transition })
    }

    async fn confirm_if_not_processed(
        &self,
        booking_id: &BookingId,
        event_id: &str,
        event_kind: &str,
    ) -> Result<ConfirmOutcome> {
        let mut state = self.begin().await?;

        let mut booking = state
            .bookings
            .get(booking_id)
            .cloned()
            .ok_or_else(|| DomainError::BookingNotFound(booking_id.to_string()))?;

        if state.processed.contains_key(event_id) {
            return Ok(ConfirmOutcome::Duplicate(booking));
        }

        state.processed.insert(
            event_id.to_string(),
            ProcessedEvent {
                event_id: event_id.to_string(),
                event_kind: event_kind.to_string(),
                processed_at: Utc::now(),
            },
        );

        if booking.status() != BookingStatus::Pending {
            warn!(
                booking_id = %booking_id,
                status = booking.status().as_str(),
                "Payment for booking that is not pending"
            );
            return Ok(ConfirmOutcome::Unchanged(booking));
        }

        booking.confirm()?;
        state.bookings.insert(*booking_id, stored(&booking));
        Ok(ConfirmOutcome::Applied(booking))
    }

    async fn list(&self, filter: &BookingFilter, page: PageRequest) -> Result<(Vec<Booking>, i64)> {
        let state = self.begin().await?;

        let mut matching: Vec<&Booking> = state.bookings.values().filter(|b| filter.matches(b)).collect();
        matching.sort_by(|a, b| {
            a.range()
                .start()
                .cmp(&b.range().start())
                .then_with(|| a.id().cmp(b.id()))
        });

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(page.offset().max(0) as usize)
            .take(page.page_size.max(0) as usize)
            .cloned()
            .collect();

        Ok((items, total))
    }

    async fn find_processed_event(&self, event_id: &str) -> Result<Option<ProcessedEvent>> {
        let state = self.begin().await?;
        Ok(state.processed.get(event_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::TimeRange;
    use chrono::TimeZone;

    fn range(start_hour: u32, end_hour: u32) -> TimeRange {
        TimeRange::new(
            Utc.with_ymd_and_hms(2025, 3, 1, start_hour, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 1, end_hour, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn booking(resource: &str, start_hour: u32, end_hour: u32) -> Booking {
        Booking::new("u1".to_string(), resource.to_string(), range(start_hour, end_hour))
    }

    #[tokio::test]
    async fn test_overlap_rejected_and_nothing_written() {
        let store = InMemoryBookingStore::new();
        store.create_without_overlap(&booking("c1", 10, 11)).await.unwrap();

        let result = store.create_without_overlap(&booking("c1", 10, 12)).await;
        assert_eq!(result, Err(DomainError::OverlapConflict));
        assert_eq!(store.len().await, 1);

        // Adjacent and other courts are fine
        store.create_without_overlap(&booking("c1", 11, 12)).await.unwrap();
        store.create_without_overlap(&booking("c2", 10, 11)).await.unwrap();
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_cancelled_booking_frees_slot() {
        let store = InMemoryBookingStore::new();
        let first = booking("c1", 10, 11);
        store.create_without_overlap(&first).await.unwrap();
        store.update_status(first.id(), BookingStatus::Cancelled).await.unwrap();

        store.create_without_overlap(&booking("c1", 10, 11)).await.unwrap();
    }

    #[tokio::test]
    async fn test_stored_copy_has_no_events() {
        let store = InMemoryBookingStore::new();
        let b = booking("c1", 10, 11);
        assert_eq!(b.pending_events().len(), 1);
        store.create_without_overlap(&b).await.unwrap();

        let found = store.find_by_id(b.id()).await.unwrap().unwrap();
        assert!(found.pending_events().is_empty());
    }

    #[tokio::test]
    async fn test_confirm_is_idempotent_per_event() {
        let store = InMemoryBookingStore::new();
        let b = booking("c1", 10, 11);
        store.create_without_overlap(&b).await.unwrap();

        let first = store.confirm_if_not_processed(b.id(), "pay_1", "payment.paid").await.unwrap();
        assert!(matches!(first, ConfirmOutcome::Applied(_)));
        assert_eq!(first.booking().pending_events().len(), 1);

        let second = store.confirm_if_not_processed(b.id(), "pay_1", "payment.paid").await.unwrap();
        assert!(matches!(second, ConfirmOutcome::Duplicate(_)));
        assert_eq!(second.booking().status(), BookingStatus::Confirmed);

        let third = store.confirm_if_not_processed(b.id(), "pay_2", "payment.paid").await.unwrap();
        assert!(matches!(third, ConfirmOutcome::Unchanged(_)));
        assert_eq!(store.processed_count().await, 2);
    }

    #[tokio::test]
    async fn test_confirm_unknown_booking_writes_no_ledger() {
        let store = InMemoryBookingStore::new();
        let result = store
            .confirm_if_not_processed(&BookingId::new(), "pay_1", "payment.paid")
            .await;
        assert!(matches!(result, Err(DomainError::BookingNotFound(_))));
        assert!(store.find_processed_event("pay_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unavailable() {
        let store = InMemoryBookingStore::new();
        store.set_unavailable(true);
        let result = store.find_by_id(&BookingId::new()).await;
        assert!(matches!(result, Err(DomainError::StorageUnavailable(_))));
    }

    #[tokio::test]
    async fn test_list_orders_and_pages() {
        let store = InMemoryBookingStore::new();
        for (resource, start) in [("c1", 14), ("c1", 9), ("c2", 12)] {
            store.create_without_overlap(&booking(resource, start, start + 1)).await.unwrap();
        }

        let (items, total) = store
            .list(&BookingFilter::default(), PageRequest::new(Some(0), Some(2), 20))
            .await
            .unwrap();
        assert_eq!(total, 3);
        let starts: Vec<u32> = items.iter().map(|b| chrono::Timelike::hour(&b.range().start())).collect();
        assert_eq!(starts, vec![9, 12]);

        let (items, total) = store
            .list(&BookingFilter::default(), PageRequest::new(Some(1), Some(2), 20))
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(items.len(), 1);

        let by_court = BookingFilter {
            resource_id: Some("c1".to_string()),
            ..Default::default()
        };
        let (_, total) = store.list(&by_court, PageRequest::new(None, None, 20)).await.unwrap();
        assert_eq!(total, 2);
    }
}
