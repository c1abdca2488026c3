//! Payment event consumer
//!
//! Subscribes to payment outcomes and confirms bookings at most once per
//! payment. Deliveries arrive at least once and in any order, so the
//! processed-event ledger written together with the status change is what
//! keeps side effects single.
//!
//! | Situation                         | Settlement     | Publishes           |
//! |-----------------------------------|----------------|---------------------|
//! | PENDING booking confirmed         | ack            | `booking.confirmed` |
//! | Already processed / not pending   | ack            | nothing             |
//! | Malformed payload                 | ack            | nothing             |
//! | Booking still missing after retry | ack            | nothing             |
//! | Storage failure or deadline       | nack + requeue | nothing             |

use crate::application::notifier::Notifier;
use crate::application::outbound::LifecyclePublisher;
use crate::config::{BookingSettings, MessagingConfig, TopicsConfig};
use crate::domain::booking::{BookingStore, ConfirmOutcome};
use crate::domain::payment::{PaymentFailed, PaymentPaid};
use crate::domain::shared::{DomainError, Result};
use crate::infrastructure::messaging::{Delivery, EventSubscriber};
use futures::StreamExt;
use metrics::counter;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Ledger tag for confirmations driven by a successful payment
pub const PAYMENT_PAID_KIND: &str = "payment.paid";

/// What happened to one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// PENDING -> CONFIRMED applied
    Confirmed,
    /// First delivery for a booking that was not PENDING
    Unchanged,
    /// Payment already in the ledger
    Duplicate,
    /// Booking never became visible
    Dropped,
    /// Payload could not be decoded
    Discarded,
    /// Transient failure; handed back to the broker
    Requeued,
    /// `payment.failed` passed to the notifier
    Forwarded,
    /// Topic this consumer does not handle
    Ignored,
}

impl HandleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandleOutcome::Confirmed => "confirmed",
            HandleOutcome::Unchanged => "unchanged",
            HandleOutcome::Duplicate => "duplicate",
            HandleOutcome::Dropped => "dropped",
            HandleOutcome::Discarded => "discarded",
            HandleOutcome::Requeued => "requeued",
            HandleOutcome::Forwarded => "forwarded",
            HandleOutcome::Ignored => "ignored",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub topics: TopicsConfig,
    pub prefetch: usize,
    pub reconnect_delay: Duration,
    pub operation_timeout: Duration,
    pub not_found_retries: u32,
    pub not_found_backoff: Duration,
}

impl ConsumerSettings {
    pub fn from_config(messaging: &MessagingConfig, booking: &BookingSettings) -> Self {
        Self {
            topics: messaging.topics.clone(),
            prefetch: messaging.prefetch.max(1),
            reconnect_delay: messaging.reconnect_delay(),
            operation_timeout: booking.operation_timeout(),
            not_found_retries: booking.not_found_retries,
            not_found_backoff: booking.not_found_backoff(),
        }
    }
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self::from_config(&MessagingConfig::default(), &BookingSettings::default())
    }
}

pub struct PaymentEventConsumer {
    subscriber: Arc<dyn EventSubscriber>,
    store: Arc<dyn BookingStore>,
    events: LifecyclePublisher,
    notifier: Arc<dyn Notifier>,
    settings: ConsumerSettings,
}

impl PaymentEventConsumer {
    pub fn new(
        subscriber: Arc<dyn EventSubscriber>,
        store: Arc<dyn BookingStore>,
        events: LifecyclePublisher,
        notifier: Arc<dyn Notifier>,
        settings: ConsumerSettings,
    ) -> Self {
        Self {
            subscriber,
            store,
            events,
            notifier,
            settings,
        }
    }

    /// Consume until `shutdown` fires. Resubscribes after the stream ends or
    /// the subscription fails. Deliveries still in flight at shutdown are
    /// left unsettled for the broker to redeliver.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let topics = self.settings.topics.inbound();
        info!(topics = ?topics, prefetch = self.settings.prefetch, "Payment consumer started");

        loop {
            let subscribed = tokio::select! {
                _ = shutdown.recv() => break,
                result = self.subscriber.subscribe(&topics) => result,
            };

            match subscribed {
                Ok(stream) => {
                    info!(topics = ?topics, "Subscribed to payment events");
                    let processing = stream.for_each_concurrent(self.settings.prefetch, |item| async move {
                        match item {
                            Ok(delivery) => {
                                self.handle_delivery(delivery).await;
                            }
                            Err(e) => error!(error = %e, "Error receiving payment event"),
                        }
                    });

                    tokio::select! {
                        _ = shutdown.recv() => break,
                        _ = processing => {
                            warn!("Payment event stream ended, reconnecting in {:?}", self.settings.reconnect_delay);
                        }
                    }
                }
                Err(e) => {
                    error!(
                        error = %e,
                        "Failed to subscribe to payment events, retrying in {:?}",
                        self.settings.reconnect_delay
                    );
                }
            }

            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(self.settings.reconnect_delay) => {}
            }
        }

        info!("Payment consumer stopped");
    }

    /// Process and settle one delivery.
    pub async fn handle_delivery(&self, delivery: Delivery) -> HandleOutcome {
        let outcome = if delivery.topic == self.settings.topics.payment_paid {
            self.handle_paid(&delivery.payload).await
        } else if delivery.topic == self.settings.topics.payment_failed {
            self.handle_failed(&delivery.payload).await
        } else {
            debug!(topic = %delivery.topic, "Ignoring event on unhandled topic");
            HandleOutcome::Ignored
        };

        counter!("payment_events_total", "outcome" => outcome.as_str()).increment(1);

        let topic = delivery.topic.clone();
        let settled = match outcome {
            HandleOutcome::Requeued => delivery.nack(true).await,
            _ => delivery.ack().await,
        };
        if let Err(e) = settled {
            error!(topic = %topic, error = %e, "Failed to settle delivery");
        }

        outcome
    }

    async fn handle_paid(&self, payload: &[u8]) -> HandleOutcome {
        let paid = match PaymentPaid::decode(payload) {
            Ok(paid) => paid,
            Err(e) => {
                warn!(data_quality = true, error = %e, "Discarding malformed payment.paid");
                return HandleOutcome::Discarded;
            }
        };

        match self.confirm_payment(&paid).await {
            Ok(ConfirmOutcome::Applied(mut booking)) => {
                info!(
                    booking_id = %paid.booking_id,
                    payment_id = %paid.payment_id,
                    amount = paid.amount,
                    currency = %paid.currency,
                    "Booking confirmed by payment"
                );
                counter!("booking_transitions_total", "status" => "CONFIRMED").increment(1);
                self.events.publish_all(booking.take_events()).await;
                if let Err(e) = self.notifier.booking_confirmed(&booking).await {
                    warn!(booking_id = %paid.booking_id, error = %e, "Failed to notify confirmation");
                }
                HandleOutcome::Confirmed
            }
            Ok(ConfirmOutcome::Unchanged(booking)) => {
                warn!(
                    booking_id = %paid.booking_id,
                    payment_id = %paid.payment_id,
                    status = booking.status().as_str(),
                    "Payment received for booking that is not pending"
                );
                HandleOutcome::Unchanged
            }
            Ok(ConfirmOutcome::Duplicate(_)) => {
                debug!(payment_id = %paid.payment_id, "Duplicate payment.paid");
                HandleOutcome::Duplicate
            }
            Err(DomainError::BookingNotFound(_)) => {
                warn!(
                    booking_id = %paid.booking_id,
                    payment_id = %paid.payment_id,
                    "Dropping payment for unknown booking"
                );
                HandleOutcome::Dropped
            }
            Err(e) => {
                error!(
                    booking_id = %paid.booking_id,
                    payment_id = %paid.payment_id,
                    error = %e,
                    "Failed to confirm booking, requeueing"
                );
                HandleOutcome::Requeued
            }
        }
    }

    /// Confirm with bounded retries while the booking is not visible yet.
    async fn confirm_payment(&self, paid: &PaymentPaid) -> Result<ConfirmOutcome> {
        let mut attempt = 0;
        loop {
            let result = tokio::time::timeout(
                self.settings.operation_timeout,
                self.store
                    .confirm_if_not_processed(&paid.booking_id, &paid.payment_id, PAYMENT_PAID_KIND),
            )
            .await
            .map_err(|_| DomainError::DeadlineExceeded)?;

            match result {
                Err(DomainError::BookingNotFound(_)) if attempt < self.settings.not_found_retries => {
                    let delay = backoff(self.settings.not_found_backoff, attempt);
                    debug!(booking_id = %paid.booking_id, attempt, ?delay, "Booking not visible yet, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn handle_failed(&self, payload: &[u8]) -> HandleOutcome {
        let failed = match PaymentFailed::decode(payload) {
            Ok(failed) => failed,
            Err(e) => {
                warn!(data_quality = true, error = %e, "Discarding malformed payment.failed");
                return HandleOutcome::Discarded;
            }
        };

        info!(
            booking_id = %failed.booking_id,
            payment_id = %failed.payment_id,
            reason = failed.reason.as_deref().unwrap_or("unknown"),
            "Payment failed"
        );
        if let Err(e) = self.notifier.payment_failed(&failed).await {
            warn!(booking_id = %failed.booking_id, error = %e, "Failed to notify payment failure");
        }
        HandleOutcome::Forwarded
    }
}

/// Exponential backoff with up to 50% random jitter
fn backoff(base: Duration, attempt: u32) -> Duration {
    let exp = base.saturating_mul(1u32 << attempt.min(6));
    let jitter_ms = (exp.as_millis() / 2) as u64;
    let jitter = if jitter_ms > 0 {
        rand::thread_rng().gen_range(0..=jitter_ms)
    } else {
        0
    };
    exp + Duration::from_millis(jitter)
}
