//! Booking API handlers

use super::booking_dto::{
    ApiResponse, BookingListResponse, BookingResponse, CreateBookingRequest, ListBookingsQuery,
};
use crate::application::BookingService;
use crate::domain::DomainError;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::{error, info};

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<BookingService>,
}

type ApiResult<T> = (StatusCode, Json<ApiResponse<T>>);

fn status_for(e: &DomainError) -> StatusCode {
    match e {
        DomainError::InvalidRange | DomainError::InvalidInput(_) | DomainError::MalformedEvent(_) => {
            StatusCode::BAD_REQUEST
        }
        DomainError::OverlapConflict | DomainError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
        DomainError::NotFound(_) | DomainError::BookingNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
    }
}

fn failure<T>(action: &str, e: DomainError) -> ApiResult<T> {
    let status = status_for(&e);
    if status.is_server_error() {
        error!("API: Failed to {}: {}", action, e);
    } else {
        info!("API: Rejected {}: {}", action, e);
    }
    (status, Json(ApiResponse::error(e.to_string())))
}

/// Create a booking
pub async fn create_booking(
    State(state): State<AppState>,
    Json(req): Json<CreateBookingRequest>,
) -> ApiResult<BookingResponse> {
    info!("API: Creating booking for court {}", req.court_id);

    match state
        .bookings
        .create(&req.user_id, &req.court_id, &req.start_iso, &req.end_iso)
        .await
    {
        Ok(booking) => (StatusCode::CREATED, Json(ApiResponse::success(booking.into()))),
        Err(e) => failure("create booking", e),
    }
}

/// Get booking by ID
pub async fn get_booking(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<BookingResponse> {
    match state.bookings.get(&id).await {
        Ok(booking) => (StatusCode::OK, Json(ApiResponse::success(booking.into()))),
        Err(e) => failure("get booking", e),
    }
}

/// List bookings
pub async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<ListBookingsQuery>,
) -> ApiResult<BookingListResponse> {
    info!(
        "API: Listing bookings (page: {:?}, page_size: {:?})",
        query.page, query.page_size
    );

    match state.bookings.list(query.into()).await {
        Ok(page) => (StatusCode::OK, Json(ApiResponse::success(page.into()))),
        Err(e) => failure("list bookings", e),
    }
}

/// Confirm a booking
pub async fn confirm_booking(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<BookingResponse> {
    info!("API: Confirming booking {}", id);

    match state.bookings.confirm(&id).await {
        Ok(booking) => (StatusCode::OK, Json(ApiResponse::success(booking.into()))),
        Err(e) => failure("confirm booking", e),
    }
}

/// Cancel a booking
pub async fn cancel_booking(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<BookingResponse> {
    info!("API: Cancelling booking {}", id);

    match state.bookings.cancel(&id).await {
        Ok(booking) => (StatusCode::OK, Json(ApiResponse::success(booking.into()))),
        Err(e) => failure("cancel booking", e),
    }
}

/// Health check
pub async fn health_check() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("OK"))
}
