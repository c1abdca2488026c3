//! Lifecycle event publication
//!
//! Events go out after the store has committed. Publication is best-effort:
//! a failure is logged and counted but never undoes the write and is not
//! retried here.

use crate::config::TopicsConfig;
use crate::domain::booking::BookingEvent;
use crate::infrastructure::messaging::EventPublisher;
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, error, warn};

#[derive(Clone)]
pub struct LifecyclePublisher {
    publisher: Arc<dyn EventPublisher>,
    topics: TopicsConfig,
}

impl LifecyclePublisher {
    pub fn new(publisher: Arc<dyn EventPublisher>, topics: TopicsConfig) -> Self {
        Self { publisher, topics }
    }

    pub fn topic_for(&self, event: &BookingEvent) -> &str {
        match event {
            BookingEvent::Created(_) => &self.topics.booking_created,
            BookingEvent::Confirmed(_) => &self.topics.booking_confirmed,
            BookingEvent::Cancelled(_) => &self.topics.booking_cancelled,
        }
    }

    /// Publish one event. Returns whether the channel accepted it.
    pub async fn publish(&self, event: &BookingEvent) -> bool {
        let topic = self.topic_for(event);

        let payload = match event.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                error!(topic = %topic, booking_id = %event.booking_id(), error = %e, "Failed to encode event");
                counter!("event_publish_failures_total", "topic" => topic.to_string()).increment(1);
                return false;
            }
        };

        match self.publisher.publish(topic, payload).await {
            Ok(()) => {
                debug!(
                    topic = %topic,
                    event = event.event_type(),
                    booking_id = %event.booking_id(),
                    occurred_at = %event.occurred_at(),
                    "Published lifecycle event"
                );
                true
            }
            Err(e) => {
                warn!(
                    topic = %topic,
                    booking_id = %event.booking_id(),
                    occurred_at = %event.occurred_at(),
                    error = %e,
                    "Failed to publish lifecycle event"
                );
                counter!("event_publish_failures_total", "topic" => topic.to_string()).increment(1);
                false
            }
        }
    }

    pub async fn publish_all(&self, events: Vec<BookingEvent>) {
        for event in &events {
            self.publish(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::{Booking, TimeRange};
    use crate::infrastructure::messaging::InMemoryEventChannel;
    use chrono::{TimeZone, Utc};

    fn booking() -> Booking {
        let range = TimeRange::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 1, 11, 0, 0).unwrap(),
        )
        .unwrap();
        Booking::new("u1".to_string(), "c1".to_string(), range)
    }

    #[tokio::test]
    async fn test_publishes_on_configured_topic() {
        let channel = InMemoryEventChannel::new();
        let topics = TopicsConfig {
            booking_created: "bookings.created.v1".to_string(),
            ..Default::default()
        };
        let publisher = LifecyclePublisher::new(Arc::new(channel.clone()), topics);

        let mut b = booking();
        publisher.publish_all(b.take_events()).await;

        let sent = channel.published_on("bookings.created.v1").await;
        assert_eq!(sent.len(), 1);
        let body: serde_json::Value = serde_json::from_slice(&sent[0].payload).unwrap();
        assert_eq!(body["booking_id"], b.id().to_string());
        assert_eq!(body["court_id"], "c1");
        assert_eq!(body["user_id"], "u1");
    }

    #[tokio::test]
    async fn test_failure_is_swallowed() {
        let channel = InMemoryEventChannel::new();
        channel.set_fail_publish(true);
        let publisher = LifecyclePublisher::new(Arc::new(channel.clone()), TopicsConfig::default());

        let mut b = booking();
        let events = b.take_events();
        assert!(!publisher.publish(&events[0]).await);
    }
}
