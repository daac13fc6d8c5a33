use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use std::time::Duration;
use tracing::info;

use crate::catalog::Catalog;

#[derive(Clone)]
pub struct Database {
    pub pool: Pool<Postgres>,
}

impl Database {
    pub async fn new(database_url: &str, pool_size: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(Database { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("./src/migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed");
        Ok(())
    }

    /// Переносит справочные данные каталога в таблицы, чтобы брони могли
    /// ссылаться на `shows(id)`. Повторный запуск ничего не ломает.
    pub async fn sync_catalog(&self, catalog: &Catalog) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        for t in catalog.theaters() {
            sqlx::query(
                "INSERT INTO theaters (id, name, location) VALUES ($1, $2, $3)
                 ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, location = EXCLUDED.location",
            )
            .bind(&t.id)
            .bind(&t.name)
            .bind(&t.location)
            .execute(&mut *tx)
            .await?;
        }

        for m in catalog.movies() {
            sqlx::query(
                "INSERT INTO movies (id, title, genre, duration) VALUES ($1, $2, $3, $4)
                 ON CONFLICT (id) DO UPDATE
                 SET title = EXCLUDED.title, genre = EXCLUDED.genre, duration = EXCLUDED.duration",
            )
            .bind(&m.id)
            .bind(&m.title)
            .bind(&m.genre)
            .bind(m.duration as i32)
            .execute(&mut *tx)
            .await?;
        }

        for c in catalog.seat_categories() {
            sqlx::query(
                "INSERT INTO seat_categories (id, name, price, rows) VALUES ($1, $2, $3, $4)
                 ON CONFLICT (id) DO UPDATE
                 SET name = EXCLUDED.name, price = EXCLUDED.price, rows = EXCLUDED.rows",
            )
            .bind(&c.id)
            .bind(&c.name)
            .bind(c.price)
            .bind(&c.rows)
            .execute(&mut *tx)
            .await?;
        }

        // Сеансы пачкой: их сотни
        let ids: Vec<&str> = catalog.all_shows().iter().map(|s| s.id.as_str()).collect();
        let theaters: Vec<&str> = catalog.all_shows().iter().map(|s| s.theater_id.as_str()).collect();
        let movies: Vec<&str> = catalog.all_shows().iter().map(|s| s.movie_id.as_str()).collect();
        let datetimes: Vec<chrono::NaiveDateTime> =
            catalog.all_shows().iter().map(|s| s.datetime).collect();

        let inserted = sqlx::query(
            r#"
            INSERT INTO shows (id, theater_id, movie_id, datetime)
            SELECT * FROM UNNEST($1::TEXT[], $2::TEXT[], $3::TEXT[], $4::TIMESTAMP[])
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&ids)
        .bind(&theaters)
        .bind(&movies)
        .bind(&datetimes)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        info!("Catalog synced to database, {} new shows", inserted);
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}
