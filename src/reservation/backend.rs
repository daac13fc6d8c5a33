use std::sync::Arc;

use async_trait::async_trait;
use validator::Validate;

use crate::{
    error::{BookingError, BookingResult},
    models::{Booking, Seat, SeatId},
    seat_map::SeatMapService,
    services::payment::{PaymentAuthorizer, PaymentReceipt, PaymentRequest},
};

/// Внешние эффекты, которые нужны сценарию бронирования.
///
/// Реализации: `LocalBackend` (в том же процессе) и `client::ApiClient` (через REST).
#[async_trait]
pub trait BookingBackend: Send + Sync {
    async fn seats(&self, show_id: &str) -> BookingResult<Vec<Seat>>;

    async fn authorize_payment(&self, request: &PaymentRequest) -> BookingResult<PaymentReceipt>;

    async fn refund_payment(&self, receipt: &PaymentReceipt) -> BookingResult<()>;

    async fn confirm_booking(&self, show_id: &str, seats: &[SeatId]) -> BookingResult<Booking>;
}

#[derive(Clone)]
pub struct LocalBackend {
    seat_map: SeatMapService,
    payments: Arc<dyn PaymentAuthorizer>,
}

impl LocalBackend {
    pub fn new(seat_map: SeatMapService, payments: Arc<dyn PaymentAuthorizer>) -> Self {
        Self { seat_map, payments }
    }
}

#[async_trait]
impl BookingBackend for LocalBackend {
    async fn seats(&self, show_id: &str) -> BookingResult<Vec<Seat>> {
        self.seat_map.get_seats(show_id).await
    }

    async fn authorize_payment(&self, request: &PaymentRequest) -> BookingResult<PaymentReceipt> {
        request
            .validate()
            .map_err(|e| BookingError::PaymentDeclined(format!("invalid card details: {}", e)))?;
        self.payments.authorize(request).await
    }

    async fn refund_payment(&self, receipt: &PaymentReceipt) -> BookingResult<()> {
        self.payments.refund(receipt).await
    }

    async fn confirm_booking(&self, show_id: &str, seats: &[SeatId]) -> BookingResult<Booking> {
        self.seat_map.confirm(show_id, seats).await
    }
}
