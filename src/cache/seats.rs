use crate::cache::CacheService;
use crate::models::Seat;
use redis::AsyncCommands;
use tracing::info;

fn seats_key(show_id: &str) -> String {
    format!("seats:{}", show_id)
}

impl CacheService {
    // Карта мест сеанса из кеша, если она там есть
    pub async fn get_cached_seats(&self, show_id: &str) -> Result<Option<Vec<Seat>>, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let data: Option<String> = conn.get(seats_key(show_id)).await?;
        match data {
            Some(json) => {
                let seats = serde_json::from_str(&json).map_err(|_| {
                    redis::RedisError::from((redis::ErrorKind::TypeError, "Parse error"))
                })?;
                Ok(Some(seats))
            }
            None => Ok(None),
        }
    }

    pub async fn cache_seats(&self, show_id: &str, seats: &[Seat]) -> Result<(), redis::RedisError> {
        let data = serde_json::to_string(seats).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error"))
        })?;
        let mut conn = self.redis.conn.clone();
        conn.set_ex(seats_key(show_id), data, self.seat_map_ttl).await
    }

    // Инвалидировать кеш мест
    pub async fn invalidate_seats(&self, show_id: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let _: () = conn.del(seats_key(show_id)).await?;
        info!("Invalidated seats cache for show {}", show_id);
        Ok(())
    }
}
