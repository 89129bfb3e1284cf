//! HTTP handlers for bookings

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{Booking, CreateBookingInput, UpdateBookingInput};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::BookingService;
use crate::AppState;

/// Query parameters for listing bookings
#[derive(Debug, Deserialize)]
pub struct ListBookingsQuery {
    pub buyer_id: Option<Uuid>,
}

/// Reserve stock for a buyer
pub async fn create_booking(
    State(state): State<AppState>,
    Json(input): Json<CreateBookingInput>,
) -> AppResult<(StatusCode, Json<Booking>)> {
    let service = BookingService::new(state.store);
    let booking = service.create_booking(input).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<Booking>> {
    let service = BookingService::new(state.store);
    Ok(Json(service.get_booking(booking_id)?))
}

pub async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<ListBookingsQuery>,
) -> Json<Vec<Booking>> {
    let service = BookingService::new(state.store);
    Json(service.list_bookings(query.buyer_id))
}

/// Update lines, delivery details or payment status
pub async fn update_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(input): Json<UpdateBookingInput>,
) -> AppResult<Json<Booking>> {
    let service = BookingService::new(state.store);
    let booking = service.update_booking(booking_id, input).await?;
    Ok(Json(booking))
}

/// Delete a booking without sales and release its reservation
pub async fn delete_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = BookingService::new(state.store);
    service.delete_booking(booking_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
