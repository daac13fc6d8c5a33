use chrono::NaiveDate;
use serde::Deserialize;
use std::env;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub payment: PaymentConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub catalog: CatalogConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub rust_log: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

// Где хранится журнал бронирований
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

// Настройки базы данных (нужны только для backend = postgres)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub pool_size: u32,
}

// Настройки Redis. Без url кеш карты мест выключен
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub seat_map_ttl_seconds: u64,
}

// Настройки JWT
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expires_in_hours: i64,
}

// Настройки платежного шлюза
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub mode: PaymentMode,
    pub merchant_id: String,
    pub merchant_password: String,
    pub gateway_url: String,
    pub timeout_seconds: u64,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    Mock,
    Gateway,
}

// Настройки Circuit Breaker
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

// Параметры генерации демо-каталога
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    pub days_ahead: u32,
    pub show_hours: Vec<u32>,
    pub seats_per_row: u32,
    /// Первый день расписания (`YYYY-MM-DD`). Без него расписание начинается сегодня
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

impl Config {
    /// Собирает конфигурацию: значения по умолчанию, затем переменные `CINEMA_<SECTION>__<KEY>`,
    /// затем привычные `PORT`, `RUST_LOG`, `DATABASE_URL`, `REDIS_URL`, `JWT_SECRET`.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 8000)?
            .set_default("app.rust_log", "cinema_booking=debug,tower_http=debug")?
            .set_default("app.log_format", "pretty")?
            .set_default("storage.backend", "memory")?
            .set_default("database.pool_size", 20)?
            .set_default("redis.seat_map_ttl_seconds", 60)?
            .set_default("jwt.secret", "change-me-in-production")?
            .set_default("jwt.expires_in_hours", 24)?
            .set_default("payment.mode", "mock")?
            .set_default("payment.merchant_id", "cinema")?
            .set_default("payment.merchant_password", "")?
            .set_default("payment.gateway_url", "http://localhost:9000")?
            .set_default("payment.timeout_seconds", 10)?
            .set_default("payment.currency", "USD")?
            .set_default("circuit_breaker.failure_threshold", 5)?
            .set_default("circuit_breaker.timeout_seconds", 60)?
            .set_default("catalog.days_ahead", 7)?
            .set_default("catalog.show_hours", vec![10, 14, 18, 22])?
            .set_default("catalog.seats_per_row", 10)?
            .add_source(
                config::Environment::with_prefix("CINEMA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("app.port", env::var("PORT").ok())?
            .set_override_option("app.rust_log", env::var("RUST_LOG").ok())?
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", env::var("REDIS_URL").ok())?
            .set_override_option("jwt.secret", env::var("JWT_SECRET").ok())?
            .build()?
            .try_deserialize()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            app: AppConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
                rust_log: "cinema_booking=debug".to_string(),
                log_format: LogFormat::Pretty,
            },
            storage: StorageConfig { backend: StorageBackend::Memory },
            database: DatabaseConfig { url: None, pool_size: 20 },
            redis: RedisConfig { url: None, seat_map_ttl_seconds: 60 },
            jwt: JwtConfig {
                secret: "change-me-in-production".to_string(),
                expires_in_hours: 24,
            },
            payment: PaymentConfig {
                mode: PaymentMode::Mock,
                merchant_id: "cinema".to_string(),
                merchant_password: String::new(),
                gateway_url: "http://localhost:9000".to_string(),
                timeout_seconds: 10,
                currency: "USD".to_string(),
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: 5,
                timeout_seconds: 60,
            },
            catalog: CatalogConfig {
                days_ahead: 7,
                show_hours: vec![10, 14, 18, 22],
                seats_per_row: 10,
                start_date: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_in_memory_demo() {
        let config = Config::default();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.payment.mode, PaymentMode::Mock);
        assert!(config.redis.url.is_none());
        assert_eq!(config.catalog.show_hours, vec![10, 14, 18, 22]);
    }
}
