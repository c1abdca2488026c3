//! Kafka-compatible event channel (rdkafka)
//!
//! Offsets are committed manually. Every received message is tracked in an
//! [`OffsetTracker`]; `ack` settles it and commits the partition's low
//! watermark, so a later message never commits past one that is still in
//! flight or waiting to be read again. `nack(requeue)` seeks the partition
//! back to the delivery and leaves it unsettled. The forwarding channel is
//! bounded by the configured prefetch, which caps how many deliveries sit
//! unsettled in the process at once.
//!
//! Rewinding a partition also rereads the messages after the requeued one,
//! so consumers must stay idempotent.

use super::{
    Acknowledger, Delivery, DeliveryStream, EventPublisher, EventSubscriber, MessagingError,
    OffsetTracker,
};
use crate::config::MessagingConfig;
use async_trait::async_trait;
use futures::StreamExt;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::{Offset, TopicPartitionList};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub struct KafkaEventChannel {
    producer: FutureProducer,
    brokers: String,
    consumer_group: String,
    prefetch: usize,
    timeout: Duration,
    auto_offset_reset: String,
}

impl KafkaEventChannel {
    pub fn new(config: &MessagingConfig) -> Result<Self, MessagingError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", config.publish_timeout_ms.to_string())
            .set("acks", "all")
            .create()
            .map_err(|e| MessagingError::ConnectionFailed(format!("Failed to create producer: {}", e)))?;

        info!(
            brokers = %config.brokers,
            consumer_group = %config.consumer_group,
            prefetch = config.prefetch,
            "Kafka event channel created"
        );

        Ok(Self {
            producer,
            brokers: config.brokers.clone(),
            consumer_group: config.consumer_group.clone(),
            prefetch: config.prefetch.max(1),
            timeout: Duration::from_millis(config.publish_timeout_ms),
            auto_offset_reset: config.auto_offset_reset.clone(),
        })
    }
}

#[async_trait]
impl EventPublisher for KafkaEventChannel {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), MessagingError> {
        let record = FutureRecord::to(topic).payload(&payload).key(topic);

        match self.producer.send(record, Timeout::After(self.timeout)).await {
            Ok((partition, offset)) => {
                debug!(topic = %topic, partition, offset, "Message published");
                Ok(())
            }
            Err((kafka_error, _)) => {
                error!(topic = %topic, error = %kafka_error, "Failed to publish message");
                Err(MessagingError::PublishFailed {
                    topic: topic.to_string(),
                    reason: kafka_error.to_string(),
                })
            }
        }
    }
}

#[async_trait]
impl EventSubscriber for KafkaEventChannel {
    async fn subscribe(&self, topics: &[String]) -> Result<DeliveryStream, MessagingError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.consumer_group)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("session.timeout.ms", "6000")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| MessagingError::SubscriptionFailed {
                topics: topics.to_vec(),
                reason: format!("Failed to create consumer: {}", e),
            })?;

        let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&topic_refs)
            .map_err(|e| MessagingError::SubscriptionFailed {
                topics: topics.to_vec(),
                reason: e.to_string(),
            })?;

        info!(topics = ?topics, consumer_group = %self.consumer_group, "Subscribed to topics");

        let consumer = Arc::new(consumer);
        let offsets = Arc::new(Mutex::new(OffsetTracker::new()));
        let seek_timeout = self.timeout;
        let (tx, mut rx) = tokio::sync::mpsc::channel(self.prefetch);

        tokio::spawn(async move {
            let mut stream = consumer.stream();

            while let Some(result) = stream.next().await {
                let received = result.map(|message| {
                    (
                        message.topic().to_string(),
                        message.partition(),
                        message.offset(),
                        message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                    )
                });

                let item = match received {
                    Ok((topic, partition, offset, payload)) => {
                        offsets.lock().await.track(&topic, partition, offset);
                        let acker = KafkaAcker {
                            consumer: Arc::clone(&consumer),
                            offsets: Arc::clone(&offsets),
                            topic: topic.clone(),
                            partition,
                            offset,
                            seek_timeout,
                        };
                        Ok(Delivery::new(topic, payload, false, Box::new(acker)))
                    }
                    Err(e) => Err(MessagingError::Transport(format!("Failed to receive message: {}", e))),
                };

                if tx.send(item).await.is_err() {
                    debug!("Delivery receiver dropped, stopping consumer task");
                    break;
                }
            }
        });

        let stream = async_stream::stream! {
            while let Some(item) = rx.recv().await {
                yield item;
            }
        };

        Ok(Box::pin(stream))
    }
}

struct KafkaAcker {
    consumer: Arc<StreamConsumer>,
    offsets: Arc<Mutex<OffsetTracker>>,
    topic: String,
    partition: i32,
    offset: i64,
    seek_timeout: Duration,
}

#[async_trait]
impl Acknowledger for KafkaAcker {
    async fn ack(self: Box<Self>) -> Result<(), MessagingError> {
        // Held across the commit so positions reach the broker in order
        let mut offsets = self.offsets.lock().await;
        let Some(position) = offsets.settle(&self.topic, self.partition, self.offset) else {
            debug!(
                topic = %self.topic,
                partition = self.partition,
                offset = self.offset,
                "Settled behind an unsettled delivery, commit deferred"
            );
            return Ok(());
        };

        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(&self.topic, self.partition, Offset::Offset(position))
            .map_err(|e| MessagingError::AckFailed(e.to_string()))?;
        self.consumer
            .commit(&tpl, CommitMode::Async)
            .map_err(|e| MessagingError::AckFailed(e.to_string()))
    }

    async fn nack(self: Box<Self>, requeue: bool) -> Result<(), MessagingError> {
        if !requeue {
            // Nothing to redeliver: settle it like an ack.
            warn!(topic = %self.topic, offset = self.offset, "Dropping rejected message");
            return self.ack().await;
        }
        self.consumer
            .seek(
                &self.topic,
                self.partition,
                Offset::Offset(self.offset),
                Timeout::After(self.seek_timeout),
            )
            .map_err(|e| MessagingError::AckFailed(e.to_string()))
    }
}
