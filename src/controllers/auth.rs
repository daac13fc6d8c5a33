use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use validator::Validate;

use crate::{
    controllers::ApiJson,
    error::ApiError,
    middleware::AuthUser,
    models::User,
    services::{
        auth::{hash_password, verify_password},
        users::NewUser,
    },
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(range(min = 1, max = 150))]
    pub age: Option<u32>,
    pub city: Option<String>,
    pub language: Option<String>,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

// POST /api/register
async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    req.validate()?;

    let password_hash = hash_password(req.password).await?;
    let user = state
        .users
        .insert(NewUser {
            name: req.name,
            age: req.age,
            city: req.city,
            language: req.language,
            email: req.email,
            password_hash,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

// POST /api/login
async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let invalid = || ApiError::Unauthorized("invalid email or password".to_string());

    let user = state.users.find_by_email(&req.email).await.ok_or_else(invalid)?;
    if !verify_password(req.password, user.password_hash.clone()).await? {
        warn!(user_id = user.id, "failed login attempt");
        return Err(invalid());
    }

    let token = state.jwt.create_token(user.id, &user.email)?;
    Ok(Json(TokenResponse { token }))
}

// GET /api/me
async fn me(State(state): State<Arc<AppState>>, auth: AuthUser) -> Result<Json<User>, ApiError> {
    let user = state
        .users
        .find_by_id(auth.user_id)
        .await
        .ok_or_else(|| ApiError::Unauthorized("user no longer exists".to_string()))?;
    Ok(Json(user))
}
