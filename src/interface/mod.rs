//! Interface layer - External interfaces
//!
//! This layer handles:
//! - REST API endpoints
//! - Request/response formatting
//! - Mapping domain errors to HTTP status codes

pub mod api;
