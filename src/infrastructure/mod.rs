//! Infrastructure layer - Technical implementations
//!
//! This layer contains:
//! - Booking store implementations (PostgreSQL, in-memory)
//! - Event channel implementations (Kafka, in-memory)

pub mod messaging;
pub mod persistence;
