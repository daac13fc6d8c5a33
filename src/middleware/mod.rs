use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use std::sync::Arc;

use crate::{error::ApiError, AppState};

/// Пользователь из `Authorization: Bearer <jwt>`
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
}

// Bearer JWT extractor
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        // Получаем заголовок Authorization
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("expected a bearer token".to_string()))?;

        let claims = state.jwt.verify_token(token)?;
        let user_id = claims
            .sub
            .parse()
            .map_err(|_| ApiError::Unauthorized("malformed token subject".to_string()))?;

        Ok(AuthUser { user_id, email: claims.email })
    }
}
