//! Notification port
//!
//! Message formatting and delivery belong to a separate service; the core
//! only hands over the facts.

use crate::domain::booking::Booking;
use crate::domain::payment::PaymentFailed;
use async_trait::async_trait;
use tracing::info;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn booking_confirmed(&self, booking: &Booking) -> anyhow::Result<()>;

    async fn payment_failed(&self, event: &PaymentFailed) -> anyhow::Result<()>;
}

/// Writes notifications to the log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn booking_confirmed(&self, booking: &Booking) -> anyhow::Result<()> {
        info!(
            booking_id = %booking.id(),
            user_id = %booking.requester_id(),
            court_id = %booking.resource_id(),
            "Notify: booking confirmed"
        );
        Ok(())
    }

    async fn payment_failed(&self, event: &PaymentFailed) -> anyhow::Result<()> {
        info!(
            booking_id = %event.booking_id,
            payment_id = %event.payment_id,
            reason = event.reason.as_deref().unwrap_or("unknown"),
            "Notify: payment failed"
        );
        Ok(())
    }
}
