//! REST API for bookings

pub mod booking_dto;
pub mod booking_handler;
pub mod metrics_handler;
pub mod router;

pub use booking_handler::AppState;
pub use metrics_handler::init_metrics;
pub use router::build_router;
