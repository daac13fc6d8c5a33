use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::{
    controllers::ApiJson,
    error::ApiError,
    services::payment::{PaymentReceipt, PaymentRequest},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/payment", post(authorize_payment))
        .route("/payment/refund", post(refund_payment))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub success: bool,
    pub transaction_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefundResponse {
    pub success: bool,
}

// POST /api/payment
async fn authorize_payment(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<PaymentRequest>,
) -> Result<Json<PaymentResponse>, ApiError> {
    req.validate()?;

    let receipt = state.payments.authorize(&req).await?;
    Ok(Json(PaymentResponse { success: true, transaction_id: receipt.transaction_id }))
}

// POST /api/payment/refund
async fn refund_payment(
    State(state): State<Arc<AppState>>,
    ApiJson(receipt): ApiJson<PaymentReceipt>,
) -> Result<Json<RefundResponse>, ApiError> {
    state.payments.refund(&receipt).await?;
    Ok(Json(RefundResponse { success: true }))
}
