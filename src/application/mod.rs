//! Application layer - Use cases and application services
//!
//! This layer orchestrates domain objects to fulfill use cases.
//! It's responsible for:
//! - Running store operations under a deadline
//! - Consuming payment outcomes idempotently
//! - Publishing lifecycle events after commit

pub mod booking_service;
pub mod notifier;
pub mod outbound;
pub mod payment_consumer;

pub use booking_service::{BookingPage, BookingService, ListQuery};
pub use notifier::{LogNotifier, Notifier};
pub use outbound::LifecyclePublisher;
pub use payment_consumer::{ConsumerSettings, HandleOutcome, PaymentEventConsumer, PAYMENT_PAID_KIND};
