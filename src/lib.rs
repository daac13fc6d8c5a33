pub mod cache;
pub mod catalog;
pub mod client;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod redis_client;
pub mod reservation;
pub mod seat_map;
pub mod services;

use anyhow::Context;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::{
    cache::CacheService,
    catalog::Catalog,
    config::{Config, PaymentMode, StorageBackend},
    database::Database,
    ledger::{BookingLedger, InMemoryLedger, PgBookingLedger},
    redis_client::RedisClient,
    seat_map::SeatMapService,
    services::{
        auth::JwtService,
        payment::{HttpPaymentGateway, MockPaymentGateway, PaymentAuthorizer},
        users::UserStore,
    },
};

// Shared state для всего приложения
pub struct AppState {
    pub config: Config,
    pub catalog: Arc<Catalog>,
    pub ledger: Arc<dyn BookingLedger>,
    pub seat_map: SeatMapService,
    pub payments: Arc<dyn PaymentAuthorizer>,
    pub users: UserStore,
    pub jwt: JwtService,
    pub db: Option<Database>,
}

impl AppState {
    /// Поднимает хранилище по конфигу: журнал в памяти или в Postgres,
    /// опциональный кеш в Redis, мок или настоящий платёжный шлюз.
    pub async fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let catalog = Arc::new(Catalog::seeded(&config.catalog));
        info!(
            theaters = catalog.theaters().len(),
            movies = catalog.movies().len(),
            shows = catalog.all_shows().len(),
            "catalog seeded"
        );

        let (ledger, db): (Arc<dyn BookingLedger>, Option<Database>) = match config.storage.backend {
            StorageBackend::Memory => (Arc::new(InMemoryLedger::new(catalog.clone())), None),
            StorageBackend::Postgres => {
                let url = config
                    .database
                    .url
                    .as_deref()
                    .context("database.url is required for postgres storage")?;
                let db = Database::new(url, config.database.pool_size)
                    .await
                    .context("failed to connect to database")?;
                info!("Database connected");

                db.run_migrations().await.context("failed to run migrations")?;
                db.sync_catalog(&catalog).await.context("failed to sync catalog")?;
                (Arc::new(PgBookingLedger::new(db.pool.clone(), catalog.clone())), Some(db))
            }
        };

        // Без Redis работаем дальше, просто без кеша карты мест
        let cache = match &config.redis.url {
            Some(url) => match RedisClient::new(url).await {
                Ok(redis) => {
                    info!("Redis connected");
                    Some(CacheService::new(redis, config.redis.seat_map_ttl_seconds))
                }
                Err(e) => {
                    warn!("Redis unavailable, seat map cache disabled: {:?}", e);
                    None
                }
            },
            None => None,
        };

        let payments: Arc<dyn PaymentAuthorizer> = match config.payment.mode {
            PaymentMode::Mock => Arc::new(MockPaymentGateway::approving()),
            PaymentMode::Gateway => Arc::new(
                HttpPaymentGateway::from_config(&config.payment, &config.circuit_breaker)
                    .context("failed to build payment gateway client")?,
            ),
        };

        Ok(Self::assemble(config, catalog, ledger, cache, payments, db))
    }

    /// Всё в памяти процесса, без внешних сервисов
    pub fn in_memory(config: Config, payments: Arc<dyn PaymentAuthorizer>) -> Arc<Self> {
        let catalog = Arc::new(Catalog::seeded(&config.catalog));
        let ledger: Arc<dyn BookingLedger> = Arc::new(InMemoryLedger::new(catalog.clone()));
        Self::assemble(config, catalog, ledger, None, payments, None)
    }

    fn assemble(
        config: Config,
        catalog: Arc<Catalog>,
        ledger: Arc<dyn BookingLedger>,
        cache: Option<CacheService>,
        payments: Arc<dyn PaymentAuthorizer>,
        db: Option<Database>,
    ) -> Arc<Self> {
        let seat_map = SeatMapService::new(catalog.clone(), ledger.clone(), cache);
        let jwt = JwtService::new(&config.jwt);
        Arc::new(Self {
            config,
            catalog,
            ledger,
            seat_map,
            payments,
            users: UserStore::new(),
            jwt,
            db,
        })
    }
}

/// Главный роутер: баннер, healthcheck и всё API под `/api`
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Cinema Booking API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
