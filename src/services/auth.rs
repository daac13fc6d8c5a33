use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{config::JwtConfig, error::ApiError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // id пользователя
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expires_in_hours: i64,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        let secret = config.secret.as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            expires_in_hours: config.expires_in_hours,
        }
    }

    pub fn create_token(&self, user_id: i64, email: &str) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.expires_in_hours)).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(format!("failed to sign token: {}", e)))
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| ApiError::Unauthorized(format!("invalid token: {}", e)))
    }
}

/// bcrypt заметно грузит CPU, поэтому хеширование уходит в blocking-пул
pub async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| ApiError::Internal(format!("failed to hash password: {}", e)))
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| ApiError::Internal(format!("failed to verify password: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(hours: i64) -> JwtService {
        JwtService::new(&JwtConfig { secret: "test-secret".to_string(), expires_in_hours: hours })
    }

    #[test]
    fn issued_token_verifies() {
        let jwt = service(1);
        let token = jwt.create_token(7, "ann@example.com").unwrap();
        let claims = jwt.verify_token(&token).unwrap();
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.email, "ann@example.com");
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let jwt = service(-2);
        let token = jwt.create_token(7, "ann@example.com").unwrap();
        assert!(matches!(jwt.verify_token(&token), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let other = JwtService::new(&JwtConfig { secret: "other".to_string(), expires_in_hours: 1 });
        let token = other.create_token(1, "x@example.com").unwrap();
        assert!(service(1).verify_token(&token).is_err());
    }

    #[tokio::test]
    async fn password_hash_roundtrip() {
        let hash = hash_password("hunter22".to_string()).await.unwrap();
        assert!(verify_password("hunter22".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password("hunter23".to_string(), hash).await.unwrap());
    }
}
