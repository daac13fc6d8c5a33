//! Карта мест сеанса: вся схема зала минус места из подтверждённых броней.
//!
//! Чтение карты не синхронизировано с подтверждениями. Устаревшая карта
//! допустима: окончательная проверка всё равно происходит в `confirm`.
//! В кеш же устаревшая карта попадать не должна, для этого у каждого сеанса
//! есть счётчик подтверждений.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    cache::CacheService,
    catalog::Catalog,
    error::{BookingError, BookingResult},
    ledger::{conflicting, validate_request, BookingLedger},
    models::{Booking, Seat, SeatId},
};

/// Номер версии карты мест для каждого сеанса каталога.
/// Растёт при каждом подтверждении до сброса кеша.
#[derive(Debug, Clone, Default)]
struct ShowVersions(Arc<HashMap<String, AtomicU64>>);

impl ShowVersions {
    fn new(catalog: &Catalog) -> Self {
        let map = catalog.all_shows().iter().map(|s| (s.id.clone(), AtomicU64::new(0))).collect();
        Self(Arc::new(map))
    }

    fn current(&self, show_id: &str) -> u64 {
        self.0.get(show_id).map_or(0, |v| v.load(Ordering::Acquire))
    }

    fn bump(&self, show_id: &str) {
        if let Some(v) = self.0.get(show_id) {
            v.fetch_add(1, Ordering::AcqRel);
        }
    }
}

#[derive(Clone)]
pub struct SeatMapService {
    catalog: Arc<Catalog>,
    ledger: Arc<dyn BookingLedger>,
    cache: Option<CacheService>,
    versions: ShowVersions,
}

impl SeatMapService {
    pub fn new(catalog: Arc<Catalog>, ledger: Arc<dyn BookingLedger>, cache: Option<CacheService>) -> Self {
        let versions = ShowVersions::new(&catalog);
        Self { catalog, ledger, cache, versions }
    }

    pub async fn get_seats(&self, show_id: &str) -> BookingResult<Vec<Seat>> {
        self.catalog.show(show_id)?;

        if let Some(cache) = &self.cache {
            match cache.get_cached_seats(show_id).await {
                Ok(Some(seats)) => {
                    debug!(show_id, "seat map cache hit");
                    return Ok(seats);
                }
                Ok(None) => {}
                Err(e) => warn!("seat map cache read failed for {}: {:?}", show_id, e),
            }
        }

        let version = self.versions.current(show_id);
        let claimed = self.ledger.claimed_seats(show_id).await?;
        let seats: Vec<Seat> = self
            .catalog
            .layout()
            .seats()
            .iter()
            .map(|s| Seat {
                id: s.id.clone(),
                row: s.row.clone(),
                number: s.number,
                category: s.category.clone(),
                price: s.price,
                available: !claimed.contains(&s.id),
            })
            .collect();

        if let Some(cache) = &self.cache {
            self.store_if_current(cache, show_id, version, &seats).await;
        }

        Ok(seats)
    }

    // Пока карта строилась, могло пройти подтверждение: такую карту не кешируем.
    // Если подтверждение проскочило между проверкой и записью, запись стираем.
    async fn store_if_current(&self, cache: &CacheService, show_id: &str, version: u64, seats: &[Seat]) {
        if self.versions.current(show_id) != version {
            debug!(show_id, "seat map changed while loading, skipping cache write");
            return;
        }
        if let Err(e) = cache.cache_seats(show_id, seats).await {
            warn!("seat map cache write failed for {}: {:?}", show_id, e);
            return;
        }
        if self.versions.current(show_id) != version {
            if let Err(e) = cache.invalidate_seats(show_id).await {
                warn!("failed to drop stale seat map for {}: {:?}", show_id, e);
            }
        }
    }

    /// Цена выбора мест без брони: проверки как у `confirm`, плюс занятость
    /// на момент запроса. Между расчётом и подтверждением места могут уйти.
    pub async fn quote(&self, show_id: &str, seats: &[SeatId]) -> BookingResult<i64> {
        let amount = validate_request(&self.catalog, show_id, seats)?;
        let claimed = self.ledger.claimed_seats(show_id).await?;
        let taken = conflicting(seats, &claimed);
        if !taken.is_empty() {
            return Err(BookingError::SeatConflict { seats: taken });
        }
        Ok(amount)
    }

    /// Подтверждение брони через журнал с последующим сбросом кеша карты
    pub async fn confirm(&self, show_id: &str, seats: &[SeatId]) -> BookingResult<Booking> {
        let booking = self.ledger.confirm(show_id, seats).await?;
        self.versions.bump(show_id);

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.invalidate_seats(show_id).await {
                warn!("failed to invalidate seat map cache for {}: {:?}", show_id, e);
            }
        }

        Ok(booking)
    }

    pub fn ledger(&self) -> &Arc<dyn BookingLedger> {
        &self.ledger
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::CatalogConfig, ledger::InMemoryLedger};

    fn service() -> SeatMapService {
        let catalog = Arc::new(Catalog::seeded(&CatalogConfig {
            days_ahead: 1,
            show_hours: vec![10],
            seats_per_row: 10,
            start_date: chrono::NaiveDate::from_ymd_opt(2030, 1, 15),
        }));
        let ledger: Arc<dyn BookingLedger> = Arc::new(InMemoryLedger::new(catalog.clone()));
        SeatMapService::new(catalog, ledger, None)
    }

    #[tokio::test]
    async fn fresh_show_has_every_seat_available() {
        let seats = service().get_seats("t1_m1_20300115_10").await.unwrap();
        assert_eq!(seats.len(), 60);
        assert!(seats.iter().all(|s| s.available));
        assert_eq!(seats[0].id, SeatId::from("A1"));
    }

    #[tokio::test]
    async fn confirmed_seats_become_unavailable_for_that_show_only() {
        let service = service();
        service
            .confirm("t1_m1_20300115_10", &[SeatId::from("C3"), SeatId::from("F1")])
            .await
            .unwrap();

        let seats = service.get_seats("t1_m1_20300115_10").await.unwrap();
        let taken: Vec<&str> = seats.iter().filter(|s| !s.available).map(|s| s.id.as_str()).collect();
        assert_eq!(taken, vec!["C3", "F1"]);

        let other = service.get_seats("t2_m1_20300115_10").await.unwrap();
        assert!(other.iter().all(|s| s.available));
    }

    #[tokio::test]
    async fn unknown_show_is_not_found() {
        let err = service().get_seats("nope").await.unwrap_err();
        assert!(matches!(err, BookingError::NotFound { .. }));
    }

    #[tokio::test]
    async fn quote_prices_free_seats_and_reports_taken_ones() {
        let service = service();
        let show = "t1_m1_20300115_10";
        // platinum 25 + box 30
        let amount = service.quote(show, &[SeatId::from("A1"), SeatId::from("F2")]).await.unwrap();
        assert_eq!(amount, 55);

        service.confirm(show, &[SeatId::from("F2")]).await.unwrap();
        let err = service.quote(show, &[SeatId::from("A1"), SeatId::from("F2")]).await.unwrap_err();
        assert_eq!(err, BookingError::SeatConflict { seats: vec![SeatId::from("F2")] });

        // Расчёт цены мест не занимает
        assert_eq!(service.ledger().list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn quote_rejects_what_confirm_would_reject() {
        let service = service();
        let err = service.quote("t1_m1_20300115_10", &[]).await.unwrap_err();
        assert!(matches!(err, BookingError::InvalidSelection(_)));
        let err = service.quote("nope", &[SeatId::from("A1")]).await.unwrap_err();
        assert!(matches!(err, BookingError::NotFound { .. }));
    }

    #[tokio::test]
    async fn confirm_advances_only_that_shows_version() {
        let service = service();
        let show = "t1_m1_20300115_10";
        let before = service.versions.current(show);

        service.confirm(show, &[SeatId::from("B2")]).await.unwrap();
        assert_eq!(service.versions.current(show), before + 1);
        assert_eq!(service.versions.current("t2_m1_20300115_10"), 0);

        // Неудачное подтверждение версию не трогает
        service.confirm(show, &[SeatId::from("B2")]).await.unwrap_err();
        assert_eq!(service.versions.current(show), before + 1);
    }

    #[test]
    fn versions_ignore_unknown_shows() {
        let versions = ShowVersions::default();
        versions.bump("nope");
        assert_eq!(versions.current("nope"), 0);
    }
}
