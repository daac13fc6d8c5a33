//! Журнал подтверждённых бронирований.
//!
//! Журнал только дописывается. Он же единственное место, где соблюдается
//! правило "одно место на сеанс продаётся один раз": `confirm` перепроверяет
//! занятость под блокировкой сеанса и либо записывает бронь целиком, либо
//! не пишет ничего.

pub mod memory;
pub mod postgres;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::{
    catalog::Catalog,
    error::{BookingError, BookingResult},
    models::{Booking, SeatId},
};

pub use memory::InMemoryLedger;
pub use postgres::PgBookingLedger;

#[async_trait]
pub trait BookingLedger: Send + Sync {
    /// Атомарно проверяет, что места свободны, и записывает бронь.
    async fn confirm(&self, show_id: &str, seats: &[SeatId]) -> BookingResult<Booking>;

    /// Все брони в порядке создания.
    async fn list(&self) -> BookingResult<Vec<Booking>>;

    /// Места, уже занятые подтверждёнными бронями сеанса.
    async fn claimed_seats(&self, show_id: &str) -> BookingResult<HashSet<SeatId>>;
}

/// Проверка запроса до захвата блокировки: сеанс существует, список мест
/// не пуст, без повторов, все места есть в схеме зала. Возвращает сумму.
pub(crate) fn validate_request(
    catalog: &Catalog,
    show_id: &str,
    seats: &[SeatId],
) -> BookingResult<i64> {
    catalog.show(show_id)?;

    if seats.is_empty() {
        return Err(BookingError::InvalidSelection("no seats selected".to_string()));
    }

    let mut seen = HashSet::with_capacity(seats.len());
    let mut amount = 0;
    for seat in seats {
        if !seen.insert(seat) {
            return Err(BookingError::InvalidSelection(format!("seat {} listed twice", seat)));
        }
        let layout_seat = catalog.layout().get(seat).ok_or_else(|| {
            BookingError::InvalidSelection(format!("seat {} does not exist in show {}", seat, show_id))
        })?;
        amount += layout_seat.price;
    }

    Ok(amount)
}

/// Места из запроса, которые уже заняты, в порядке запроса
pub(crate) fn conflicting(requested: &[SeatId], claimed: &HashSet<SeatId>) -> Vec<SeatId> {
    requested.iter().filter(|s| claimed.contains(*s)).cloned().collect()
}
