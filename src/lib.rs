//! Court booking service
//!
//! Reserves a court for a half-open time range without ever letting two
//! active bookings on the same court overlap, and confirms bookings from
//! asynchronously delivered payment events exactly once per payment.
//!
//! Layered in the Domain-Driven Design style:
//! - `domain`: booking aggregate, state machine, store port, payment events
//! - `application`: booking service, payment consumer, event publication
//! - `infrastructure`: PostgreSQL and in-memory stores, event channels
//! - `interface`: REST API

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interface;

// Re-export commonly used types
pub use domain::shared::error::DomainError;
pub use domain::shared::result::Result;
