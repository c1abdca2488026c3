//! Domain layer - Core business logic and rules
//!
//! This layer contains:
//! - Aggregates: Consistency boundaries
//! - Value Objects: Immutable objects without identity
//! - Repository Interfaces: Ports for persistence
//! - Domain Events: Things that happened in the domain

pub mod booking;
pub mod payment;
pub mod shared;

// Re-export commonly used types
pub use shared::{DomainError, Result};
