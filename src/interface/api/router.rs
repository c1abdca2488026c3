//! API Router configuration

use super::booking_handler::{
    cancel_booking, confirm_booking, create_booking, get_booking, health_check, list_bookings,
    AppState,
};
use super::metrics_handler::metrics_handler;
use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the API router. `/metrics` is only mounted when a recorder handle is given.
pub fn build_router(state: AppState, prometheus_handle: Option<PrometheusHandle>) -> Router {
    let health_routes = Router::new().route("/health", get(health_check));

    let booking_routes = Router::new()
        .route("/bookings", post(create_booking).get(list_bookings))
        .route("/bookings/:id", get(get_booking))
        .route("/bookings/:id/confirm", post(confirm_booking))
        .route("/bookings/:id/cancel", post(cancel_booking));

    let mut router = Router::new()
        .merge(health_routes)
        .merge(booking_routes)
        .with_state(state);

    if let Some(handle) = prometheus_handle {
        let metrics_routes = Router::new()
            .route("/metrics", get(metrics_handler))
            .with_state(handle);
        router = router.merge(metrics_routes);
    }

    router
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
