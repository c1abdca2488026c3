//! In-memory event channel
//!
//! Routes each published message to every live subscription whose pattern
//! matches, keeps a log of everything published, and counts how deliveries
//! were settled. A nack with requeue puts the message back on the same
//! subscription marked as redelivered.

use super::{
    topic_matches, Acknowledger, Delivery, DeliveryStream, EventPublisher, EventSubscriber,
    MessagingError,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

/// A message as it was handed to [`EventPublisher::publish`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone)]
struct Envelope {
    topic: String,
    payload: Vec<u8>,
}

struct Subscription {
    patterns: Vec<String>,
    tx: mpsc::UnboundedSender<(Envelope, bool)>,
}

#[derive(Default)]
struct Inner {
    published: RwLock<Vec<PublishedMessage>>,
    subscriptions: RwLock<Vec<Subscription>>,
    fail_publish: AtomicBool,
    acked: AtomicUsize,
    requeued: AtomicUsize,
    rejected: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct InMemoryEventChannel {
    inner: Arc<Inner>,
}

impl InMemoryEventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish fail, as if the broker were down.
    pub fn set_fail_publish(&self, fail: bool) {
        self.inner.fail_publish.store(fail, Ordering::SeqCst);
    }

    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.inner.published.read().await.clone()
    }

    pub async fn published_on(&self, topic: &str) -> Vec<PublishedMessage> {
        self.inner
            .published
            .read()
            .await
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    pub fn acked_count(&self) -> usize {
        self.inner.acked.load(Ordering::SeqCst)
    }

    pub fn requeued_count(&self) -> usize {
        self.inner.requeued.load(Ordering::SeqCst)
    }

    pub fn rejected_count(&self) -> usize {
        self.inner.rejected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventChannel {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), MessagingError> {
        if self.inner.fail_publish.load(Ordering::SeqCst) {
            return Err(MessagingError::PublishFailed {
                topic: topic.to_string(),
                reason: "broker unavailable".to_string(),
            });
        }

        self.inner.published.write().await.push(PublishedMessage {
            topic: topic.to_string(),
            payload: payload.clone(),
        });

        let envelope = Envelope {
            topic: topic.to_string(),
            payload,
        };
        let mut subscriptions = self.inner.subscriptions.write().await;
        subscriptions.retain(|s| !s.tx.is_closed());
        for subscription in subscriptions.iter() {
            if subscription.patterns.iter().any(|p| topic_matches(p, topic)) {
                let _ = subscription.tx.send((envelope.clone(), false));
            }
        }

        debug!(topic = %topic, "Published message");
        Ok(())
    }
}

#[async_trait]
impl EventSubscriber for InMemoryEventChannel {
    async fn subscribe(&self, topics: &[String]) -> Result<DeliveryStream, MessagingError> {
        if topics.is_empty() {
            return Err(MessagingError::SubscriptionFailed {
                topics: Vec::new(),
                reason: "no topics given".to_string(),
            });
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        self.inner.subscriptions.write().await.push(Subscription {
            patterns: topics.to_vec(),
            tx: tx.clone(),
        });

        let inner = Arc::clone(&self.inner);
        let stream = async_stream::stream! {
            while let Some((envelope, redelivered)) = rx.recv().await {
                let acker = MemoryAcker {
                    inner: Arc::clone(&inner),
                    envelope: envelope.clone(),
                    requeue_tx: tx.clone(),
                };
                yield Ok::<Delivery, MessagingError>(Delivery::new(
                    envelope.topic,
                    envelope.payload,
                    redelivered,
                    Box::new(acker),
                ));
            }
        };

        Ok(Box::pin(stream))
    }
}

struct MemoryAcker {
    inner: Arc<Inner>,
    envelope: Envelope,
    requeue_tx: mpsc::UnboundedSender<(Envelope, bool)>,
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(self: Box<Self>) -> Result<(), MessagingError> {
        self.inner.acked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn nack(self: Box<Self>, requeue: bool) -> Result<(), MessagingError> {
        if !requeue {
            self.inner.rejected.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }
        self.inner.requeued.fetch_add(1, Ordering::SeqCst);
        self.requeue_tx
            .send((self.envelope, true))
            .map_err(|_| MessagingError::AckFailed("subscription closed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_routes_by_pattern() {
        let channel = InMemoryEventChannel::new();
        let mut stream = channel.subscribe(&["payment.*".to_string()]).await.unwrap();

        channel.publish("booking.created", b"{}".to_vec()).await.unwrap();
        channel.publish("payment.paid", b"paid".to_vec()).await.unwrap();

        let delivery = stream.next().await.unwrap().unwrap();
        assert_eq!(delivery.topic, "payment.paid");
        assert_eq!(delivery.payload, b"paid");
        assert!(!delivery.redelivered);
        delivery.ack().await.unwrap();

        assert_eq!(channel.acked_count(), 1);
        assert_eq!(channel.published().await.len(), 2);
        assert_eq!(channel.published_on("booking.created").await.len(), 1);
    }

    #[tokio::test]
    async fn test_nack_requeues() {
        let channel = InMemoryEventChannel::new();
        let mut stream = channel.subscribe(&["payment.paid".to_string()]).await.unwrap();
        channel.publish("payment.paid", b"x".to_vec()).await.unwrap();

        let first = stream.next().await.unwrap().unwrap();
        first.nack(true).await.unwrap();

        let second = stream.next().await.unwrap().unwrap();
        assert!(second.redelivered);
        assert_eq!(second.payload, b"x");
        second.nack(false).await.unwrap();

        assert_eq!(channel.requeued_count(), 1);
        assert_eq!(channel.rejected_count(), 1);
    }

    #[tokio::test]
    async fn test_publish_failure() {
        let channel = InMemoryEventChannel::new();
        channel.set_fail_publish(true);
        let result = channel.publish("booking.created", Vec::new()).await;
        assert!(matches!(result, Err(MessagingError::PublishFailed { .. })));
        assert!(channel.published().await.is_empty());
    }
}
