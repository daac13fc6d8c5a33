use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use super::{conflicting, validate_request, BookingLedger};
use crate::{
    catalog::Catalog,
    error::{BookingError, BookingResult},
    models::{Booking, SeatId},
};

/// Журнал в памяти процесса.
///
/// На каждый сеанс свой мьютекс над множеством занятых мест, так что
/// подтверждения разных сеансов не ждут друг друга. Таблица мьютексов
/// строится из каталога один раз и дальше не меняется.
pub struct InMemoryLedger {
    catalog: Arc<Catalog>,
    claimed: HashMap<String, Mutex<HashSet<SeatId>>>,
    bookings: RwLock<Vec<Booking>>,
}

impl InMemoryLedger {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let claimed = catalog
            .all_shows()
            .iter()
            .map(|show| (show.id.clone(), Mutex::new(HashSet::new())))
            .collect();

        Self { catalog, claimed, bookings: RwLock::new(Vec::new()) }
    }

    fn show_lock(&self, show_id: &str) -> BookingResult<&Mutex<HashSet<SeatId>>> {
        self.claimed
            .get(show_id)
            .ok_or_else(|| BookingError::not_found("show", show_id))
    }
}

#[async_trait]
impl BookingLedger for InMemoryLedger {
    async fn confirm(&self, show_id: &str, seats: &[SeatId]) -> BookingResult<Booking> {
        let amount = validate_request(&self.catalog, show_id, seats)?;

        // Критическая секция сеанса: чтение занятых мест и запись брони не разрываются
        let mut claimed = self.show_lock(show_id)?.lock().await;

        let taken = conflicting(seats, &claimed);
        if !taken.is_empty() {
            warn!(show_id, seats = ?taken, "seat conflict on confirm");
            return Err(BookingError::SeatConflict { seats: taken });
        }

        let booking = Booking {
            id: Uuid::new_v4(),
            show_id: show_id.to_string(),
            seats: seats.to_vec(),
            amount,
            created_at: Utc::now(),
        };

        // Дописываем в журнал, пока держим блокировку сеанса,
        // иначе порядок в журнале мог бы разойтись с порядком подтверждений
        self.bookings.write().await.push(booking.clone());
        claimed.extend(seats.iter().cloned());

        info!(booking_id = %booking.id, show_id, seats = seats.len(), amount, "booking confirmed");
        Ok(booking)
    }

    async fn list(&self) -> BookingResult<Vec<Booking>> {
        Ok(self.bookings.read().await.clone())
    }

    async fn claimed_seats(&self, show_id: &str) -> BookingResult<HashSet<SeatId>> {
        Ok(self.show_lock(show_id)?.lock().await.clone())
    }
}
