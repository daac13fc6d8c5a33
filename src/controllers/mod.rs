pub mod auth;
pub mod bookings;
pub mod catalog;
pub mod payment;

use axum::{extract::FromRequest, Router};
use std::sync::Arc;

use crate::error::ApiError;

/// `Json`, который при неразборчивом теле отвечает обычным `ErrorBody`
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(catalog::routes())
        .merge(bookings::routes())
        .merge(payment::routes())
        .merge(auth::routes())
}
