use crate::redis_client::RedisClient;

pub mod seats;

/// Кеш поверх Redis. Любая ошибка Redis здесь не фатальна: вызывающий
/// код логирует её и идёт в журнал бронирований напрямую.
#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
    seat_map_ttl: u64,
}

impl CacheService {
    pub fn new(redis: RedisClient, seat_map_ttl: u64) -> Self {
        Self { redis, seat_map_ttl }
    }
}
