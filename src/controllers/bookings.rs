use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::{
    controllers::ApiJson,
    error::ApiError,
    models::{BookingView, Seat, SeatId},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/shows/{id}/seats", get(get_seats))
        .route("/bookings", get(list_bookings).post(quote_booking))
        .route("/bookings/confirm", post(confirm_booking))
}

/* ---------- SEATS ---------- */

#[derive(Debug, Serialize, Deserialize)]
pub struct SeatsResponse {
    pub seats: Vec<Seat>,
}

// GET /api/shows/{id}/seats
async fn get_seats(
    State(state): State<Arc<AppState>>,
    Path(show_id): Path<String>,
) -> Result<Json<SeatsResponse>, ApiError> {
    let seats = state.seat_map.get_seats(&show_id).await?;
    Ok(Json(SeatsResponse { seats }))
}

/* ---------- BOOKINGS ---------- */

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingBooking {
    pub show_id: String,
    pub seats: Vec<SeatId>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub requires_payment: bool,
    pub amount: i64,
    pub pending_booking: PendingBooking,
}

// POST /api/bookings
// Только расчёт суммы: места не держатся, бронь создаёт /bookings/confirm после оплаты
async fn quote_booking(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ConfirmBookingRequest>,
) -> Result<Json<QuoteResponse>, ApiError> {
    let amount = state.seat_map.quote(&req.show_id, &req.seats).await?;
    Ok(Json(QuoteResponse {
        requires_payment: true,
        amount,
        pending_booking: PendingBooking { show_id: req.show_id, seats: req.seats },
    }))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmBookingRequest {
    pub show_id: String,
    pub seats: Vec<SeatId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfirmBookingResponse {
    pub success: bool,
    pub booking: BookingView,
}

// POST /api/bookings/confirm
// Конфликт мест уходит ответом 409 с кодом seat_conflict и списком занятых мест
async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ConfirmBookingRequest>,
) -> Result<Json<ConfirmBookingResponse>, ApiError> {
    let booking = state.seat_map.confirm(&req.show_id, &req.seats).await?;
    info!(booking_id = %booking.id, show_id = %booking.show_id, "booking confirmed via api");

    let booking = state.catalog.booking_view(booking)?;
    Ok(Json(ConfirmBookingResponse { success: true, booking }))
}

// GET /api/bookings
async fn list_bookings(State(state): State<Arc<AppState>>) -> Result<Json<Vec<BookingView>>, ApiError> {
    let views = state
        .ledger
        .list()
        .await?
        .into_iter()
        .map(|booking| state.catalog.booking_view(booking))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(views))
}
