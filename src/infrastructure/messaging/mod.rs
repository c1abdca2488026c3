//! Event channel - topic-routed publish/subscribe with manual acknowledgment
//!
//! Delivery is at-least-once: a delivery that is neither acked nor nacked is
//! redelivered by the broker once its visibility timeout lapses, so every
//! consumer must be idempotent.
//!
//! # Implementations
//!
//! - [`InMemoryEventChannel`] - for tests and single-process runs
//! - `KafkaEventChannel` - Kafka-compatible brokers (`kafka` feature)

pub mod memory;
pub mod offsets;
#[cfg(feature = "kafka")]
pub mod kafka;

pub use memory::{InMemoryEventChannel, PublishedMessage};
pub use offsets::OffsetTracker;
#[cfg(feature = "kafka")]
pub use kafka::KafkaEventChannel;

use async_trait::async_trait;
use futures::Stream;
use std::fmt;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event channel operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessagingError {
    /// Failed to connect to the broker
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish a message to a topic
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed { topic: String, reason: String },

    /// Failed to subscribe to topics
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed { topics: Vec<String>, reason: String },

    /// Failed to acknowledge or reject a delivery
    #[error("Acknowledgment failed: {0}")]
    AckFailed(String),

    /// Network or transport error while receiving
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Publishing half of the event channel.
///
/// Fire-and-forget from the caller's point of view: `Ok` means the broker
/// client accepted the message, not that anyone received it.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), MessagingError>;
}

/// Stream of deliveries from a subscription
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Result<Delivery, MessagingError>> + Send>>;

/// Subscribing half of the event channel.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Subscribe to `topics`. Patterns follow topic-exchange rules:
    /// `*` matches one dot-separated word and `#` matches zero or more.
    async fn subscribe(&self, topics: &[String]) -> Result<DeliveryStream, MessagingError>;
}

/// Settles a single delivery with the broker
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(self: Box<Self>) -> Result<(), MessagingError>;

    /// Reject the delivery; with `requeue` the broker delivers it again.
    async fn nack(self: Box<Self>, requeue: bool) -> Result<(), MessagingError>;
}

/// One received message. Must be settled exactly once via [`Delivery::ack`]
/// or [`Delivery::nack`].
pub struct Delivery {
    pub topic: String,
    pub payload: Vec<u8>,
    /// Set when the broker has delivered this message before
    pub redelivered: bool,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(
        topic: impl Into<String>,
        payload: Vec<u8>,
        redelivered: bool,
        acker: Box<dyn Acknowledger>,
    ) -> Self {
        Self {
            topic: topic.into(),
            payload,
            redelivered,
            acker,
        }
    }

    pub async fn ack(self) -> Result<(), MessagingError> {
        self.acker.ack().await
    }

    pub async fn nack(self, requeue: bool) -> Result<(), MessagingError> {
        self.acker.nack(requeue).await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("topic", &self.topic)
            .field("payload_len", &self.payload.len())
            .field("redelivered", &self.redelivered)
            .finish()
    }
}

/// Topic-exchange style matching of a routing key against a binding pattern.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    fn matches(pattern: &[&str], topic: &[&str]) -> bool {
        match (pattern.first(), topic.first()) {
            (None, None) => true,
            (Some(&"#"), _) => {
                matches(&pattern[1..], topic) || (!topic.is_empty() && matches(pattern, &topic[1..]))
            }
            (Some(&"*"), Some(_)) => matches(&pattern[1..], &topic[1..]),
            (Some(p), Some(t)) if p == t => matches(&pattern[1..], &topic[1..]),
            _ => false,
        }
    }

    let pattern: Vec<&str> = pattern.split('.').collect();
    let topic: Vec<&str> = topic.split('.').collect();
    matches(&pattern, &topic)
}
