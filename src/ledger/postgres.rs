use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{conflicting, validate_request, BookingLedger};
use crate::{
    catalog::Catalog,
    error::{BookingError, BookingResult},
    models::{Booking, SeatId},
};

/// Журнал в Postgres.
///
/// Подтверждение идёт одной транзакцией под `pg_advisory_xact_lock` по сеансу;
/// уникальный индекс `(show_id, seat_id)` страхует, если блокировку обойдут.
#[derive(Clone)]
pub struct PgBookingLedger {
    pool: PgPool,
    catalog: Arc<Catalog>,
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    show_id: String,
    amount: i64,
    created_at: DateTime<Utc>,
    seats: Vec<String>,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Booking {
            id: row.id,
            show_id: row.show_id,
            seats: row.seats.into_iter().map(SeatId::from).collect(),
            amount: row.amount,
            created_at: row.created_at,
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// Откат после уже известной ошибки: сбой самого отката только логируется,
/// наружу уходит исходная ошибка
async fn rollback_logged(tx: Transaction<'_, Postgres>, show_id: &str) {
    if let Err(e) = tx.rollback().await {
        error!(show_id, "rollback failed: {:?}", e);
    }
}

impl PgBookingLedger {
    pub fn new(pool: PgPool, catalog: Arc<Catalog>) -> Self {
        Self { pool, catalog }
    }

    async fn claimed_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        show_id: &str,
        seats: &[String],
    ) -> Result<HashSet<SeatId>, sqlx::Error> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT seat_id FROM booking_seats WHERE show_id = $1 AND seat_id = ANY($2)",
        )
        .bind(show_id)
        .bind(seats)
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows.into_iter().map(SeatId::from).collect())
    }

    async fn insert_booking(
        tx: &mut Transaction<'_, Postgres>,
        booking: &Booking,
        seat_ids: &[String],
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO bookings (id, show_id, amount, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(booking.id)
        .bind(&booking.show_id)
        .bind(booking.amount)
        .bind(booking.created_at)
        .execute(&mut **tx)
        .await?;

        let positions: Vec<i32> = (0..seat_ids.len() as i32).collect();
        sqlx::query(
            r#"
            INSERT INTO booking_seats (booking_id, show_id, seat_id, position)
            SELECT $1, $2, seat_id, position
            FROM UNNEST($3::TEXT[], $4::INT[]) AS s(seat_id, position)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.show_id)
        .bind(seat_ids)
        .bind(&positions)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl BookingLedger for PgBookingLedger {
    async fn confirm(&self, show_id: &str, seats: &[SeatId]) -> BookingResult<Booking> {
        let amount = validate_request(&self.catalog, show_id, seats)?;
        let seat_ids: Vec<String> = seats.iter().map(|s| s.as_str().to_string()).collect();

        let mut tx = self.pool.begin().await?;

        // Сериализуем подтверждения одного сеанса до конца транзакции
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(show_id)
            .execute(&mut *tx)
            .await?;

        let claimed = Self::claimed_in_tx(&mut tx, show_id, &seat_ids).await?;
        let taken = conflicting(seats, &claimed);
        if !taken.is_empty() {
            rollback_logged(tx, show_id).await;
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

        if let Err(e) = Self::insert_booking(&mut tx, &booking, &seat_ids).await {
            rollback_logged(tx, show_id).await;
            if is_unique_violation(&e) {
                warn!(show_id, "unique (show_id, seat_id) constraint rejected booking");
                return Err(BookingError::SeatConflict { seats: seats.to_vec() });
            }
            error!("failed to insert booking for show {}: {:?}", show_id, e);
            return Err(e.into());
        }

        tx.commit().await.map_err(|e| {
            if is_unique_violation(&e) {
                BookingError::SeatConflict { seats: seats.to_vec() }
            } else {
                e.into()
            }
        })?;

        info!(booking_id = %booking.id, show_id, seats = seats.len(), amount, "booking confirmed");
        Ok(booking)
    }

    async fn list(&self) -> BookingResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT b.id, b.show_id, b.amount, b.created_at,
                   ARRAY_AGG(s.seat_id ORDER BY s.position) AS seats
            FROM bookings b
            JOIN booking_seats s ON s.booking_id = b.id
            GROUP BY b.seq, b.id, b.show_id, b.amount, b.created_at
            ORDER BY b.seq
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Booking::from).collect())
    }

    async fn claimed_seats(&self, show_id: &str) -> BookingResult<HashSet<SeatId>> {
        self.catalog.show(show_id)?;

        let rows: Vec<String> =
            sqlx::query_scalar("SELECT seat_id FROM booking_seats WHERE show_id = $1")
                .bind(show_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(SeatId::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::CatalogConfig, database::Database};

    // Нужен живой Postgres: DATABASE_URL=postgres://... cargo test -- --ignored
    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn unique_constraint_backs_up_the_lock_per_dated_show() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let db = Database::new(&url, 5).await.unwrap();
        db.run_migrations().await.unwrap();

        let catalog = Arc::new(Catalog::seeded(&CatalogConfig {
            days_ahead: 1,
            show_hours: vec![10],
            seats_per_row: 10,
            start_date: chrono::NaiveDate::from_ymd_opt(2030, 1, 15),
        }));
        db.sync_catalog(&catalog).await.unwrap();
        sqlx::query("TRUNCATE booking_seats, bookings").execute(&db.pool).await.unwrap();

        let ledger = PgBookingLedger::new(db.pool.clone(), catalog);
        let seats = vec![SeatId::from("A1"), SeatId::from("A2")];

        let booking = ledger.confirm("t1_m1_20300115_10", &seats).await.unwrap();
        assert_eq!(booking.amount, 50);

        let err = ledger.confirm("t1_m1_20300115_10", &seats[1..]).await.unwrap_err();
        assert!(matches!(err, BookingError::SeatConflict { .. }));

        let listed = ledger.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].seats, seats);

        // Каталог следующего дня: сеанс 16-го получает свой id, и вчерашние
        // брони 15-го его места не занимают
        let next_day = Arc::new(Catalog::seeded(&CatalogConfig {
            days_ahead: 1,
            show_hours: vec![10],
            seats_per_row: 10,
            start_date: chrono::NaiveDate::from_ymd_opt(2030, 1, 16),
        }));
        db.sync_catalog(&next_day).await.unwrap();
        let ledger = PgBookingLedger::new(db.pool.clone(), next_day);

        let booking = ledger.confirm("t1_m1_20300116_10", &seats).await.unwrap();
        assert_eq!(booking.show_id, "t1_m1_20300116_10");
        assert!(ledger.claimed_seats("t1_m1_20300116_10").await.unwrap().contains(&seats[0]));
        assert_eq!(ledger.list().await.unwrap().len(), 2);
    }
}
