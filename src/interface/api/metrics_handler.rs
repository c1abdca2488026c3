//! Prometheus metrics handler

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use metrics::describe_counter;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder. May only succeed once per process.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!("bookings_created_total", "Bookings created");
    describe_counter!(
        "booking_conflicts_total",
        "Booking requests rejected because the slot was taken"
    );
    describe_counter!(
        "booking_transitions_total",
        "Booking status changes, by target status"
    );
    describe_counter!(
        "payment_events_total",
        "Payment events handled by the consumer, by outcome"
    );
    describe_counter!(
        "event_publish_failures_total",
        "Lifecycle events that could not be published, by topic"
    );

    Ok(handle)
}

/// HTTP metrics handler
pub async fn metrics_handler(State(prometheus_handle): State<PrometheusHandle>) -> Response {
    (StatusCode::OK, prometheus_handle.render()).into_response()
}
