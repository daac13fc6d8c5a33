//! payment.rs
//!
//! Сервисный слой авторизации платежей.
//!
//! Ключевые компоненты:
//! 1.  **PaymentAuthorizer**: всё, что нужно ядру бронирования от платёжки:
//!     авторизовать сумму по данным карты и вернуть деньги при конфликте мест.
//! 2.  **MockPaymentGateway**: заглушка для демо и тестов, одобряет всё (или всё отклоняет).
//! 3.  **HttpPaymentGateway**: клиент внешнего шлюза. Запросы подписываются SHA-256 токеном,
//!     сетевые вызовы идут через circuit breaker (`failsafe`), чтобы не долбить лежащий шлюз.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as _;
use failsafe::{backoff, failure_policy, StateMachine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::{CircuitBreakerConfig, PaymentConfig},
    error::{BookingError, BookingResult},
};

/// Данные карты и сумма из `POST /payment`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    #[validate(length(min = 12, max = 19), custom(function = "digits_only"))]
    pub card_number: String,
    #[validate(length(equal = 5), custom(function = "expiry_format"))]
    pub expiry_date: String,
    #[validate(length(min = 3, max = 4), custom(function = "digits_only"))]
    pub cvv: String,
    #[validate(range(min = 1, max = 1_000_000))]
    pub amount: i64,
}

fn digits_only(value: &str) -> Result<(), validator::ValidationError> {
    if value.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("digits_only"))
    }
}

// MM/YY
fn expiry_format(value: &str) -> Result<(), validator::ValidationError> {
    let valid = match value.split_once('/') {
        Some((mm, yy)) => {
            mm.len() == 2
                && yy.len() == 2
                && digits_only(yy).is_ok()
                && matches!(mm.parse::<u8>(), Ok(1..=12))
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(validator::ValidationError::new("expiry_format"))
    }
}

impl PaymentRequest {
    /// Последние четыре цифры карты, единственное, что можно писать в лог
    pub fn masked_card(&self) -> String {
        let chars: Vec<char> = self.card_number.chars().collect();
        let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
        format!("****{}", tail)
    }
}

/// Сумма для шлюза в центах. Переполнение считается невалидной суммой,
/// запрос до шлюза не доходит
fn to_cents(amount: i64) -> BookingResult<i64> {
    amount
        .checked_mul(100)
        .ok_or_else(|| BookingError::InvalidSelection(format!("amount {} is out of range", amount)))
}

/// Подтверждение успешной авторизации
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub transaction_id: String,
    pub amount: i64,
}

#[async_trait]
pub trait PaymentAuthorizer: Send + Sync {
    /// `PaymentDeclined`, если шлюз отказал; `TransientIo` при сбое связи или таймауте.
    async fn authorize(&self, request: &PaymentRequest) -> BookingResult<PaymentReceipt>;

    async fn refund(&self, receipt: &PaymentReceipt) -> BookingResult<()>;
}

/// Заглушка платёжки: всегда одобряет, либо (для тестов) всегда отклоняет
#[derive(Debug, Default)]
pub struct MockPaymentGateway {
    decline_reason: Option<String>,
    refunds: AtomicU32,
}

impl MockPaymentGateway {
    pub fn approving() -> Self {
        Self::default()
    }

    pub fn declining(reason: &str) -> Self {
        Self { decline_reason: Some(reason.to_string()), refunds: AtomicU32::new(0) }
    }

    /// Сколько возвратов было выполнено
    pub fn refunds(&self) -> u32 {
        self.refunds.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PaymentAuthorizer for MockPaymentGateway {
    async fn authorize(&self, request: &PaymentRequest) -> BookingResult<PaymentReceipt> {
        if let Some(reason) = &self.decline_reason {
            info!(card = %request.masked_card(), amount = request.amount, "mock payment declined");
            return Err(BookingError::PaymentDeclined(reason.clone()));
        }

        let receipt = PaymentReceipt {
            transaction_id: format!("mock_txn_{}", Uuid::new_v4()),
            amount: request.amount,
        };
        info!(
            card = %request.masked_card(),
            amount = request.amount,
            transaction_id = %receipt.transaction_id,
            "mock payment authorized"
        );
        Ok(receipt)
    }

    async fn refund(&self, receipt: &PaymentReceipt) -> BookingResult<()> {
        self.refunds.fetch_add(1, Ordering::Relaxed);
        info!(transaction_id = %receipt.transaction_id, amount = receipt.amount, "mock payment refunded");
        Ok(())
    }
}

// --- Модели данных для API платёжного шлюза ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GatewayAuthorizeRequest<'a> {
    merchant_id: &'a str,
    token: String,
    /// В минимальных единицах валюты (центах)
    amount: i64,
    currency: &'a str,
    order_id: String,
    card_number: &'a str,
    expiry_date: &'a str,
    cvv: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GatewayRefundRequest<'a> {
    merchant_id: &'a str,
    token: String,
    transaction_id: &'a str,
    amount: i64,
    currency: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GatewayResponse {
    success: bool,
    transaction_id: Option<String>,
    message: Option<String>,
}

/// Сбой связи со шлюзом. Только такие ошибки считает circuit breaker
#[derive(Debug, thiserror::Error)]
enum GatewayCallError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("gateway responded with {0}")]
    Status(reqwest::StatusCode),
}

type GatewayBreaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::Constant>, ()>;

/// Клиент для взаимодействия с API платёжного шлюза.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    merchant_id: String,
    password: String,
    base_url: String,
    currency: String,
    http_client: reqwest::Client,
    breaker: GatewayBreaker,
}

impl HttpPaymentGateway {
    pub fn from_config(config: &PaymentConfig, breaker: &CircuitBreakerConfig) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        // После N сбоев подряд шлюз не трогаем timeout_seconds секунд
        let policy = failure_policy::consecutive_failures(
            breaker.failure_threshold,
            backoff::constant(Duration::from_secs(breaker.timeout_seconds)),
        );

        Ok(Self {
            merchant_id: config.merchant_id.clone(),
            password: config.merchant_password.clone(),
            base_url: config.gateway_url.trim_end_matches('/').to_string(),
            currency: config.currency.clone(),
            http_client,
            breaker: failsafe::Config::new().failure_policy(policy).build(),
        })
    }

    /// Токен подписи: sha256(amount + currency + orderId + password + merchantId)
    fn generate_token(&self, amount: i64, order_id: &str) -> String {
        let token_string = format!(
            "{}{}{}{}{}",
            amount, self.currency, order_id, self.password, self.merchant_id
        );
        let mut hasher = Sha256::new();
        hasher.update(token_string.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    async fn post<B: Serialize + Sync>(&self, path: &str, body: &B) -> BookingResult<GatewayResponse> {
        let url = format!("{}{}", self.base_url, path);
        let operation = async {
            let response = self.http_client.post(&url).json(body).send().await?;
            if response.status().is_server_error() {
                return Err(GatewayCallError::Status(response.status()));
            }
            Ok(response.json::<GatewayResponse>().await?)
        };

        match self.breaker.call(operation).await {
            Ok(reply) => Ok(reply),
            Err(failsafe::Error::Rejected) => {
                warn!("Circuit breaker is OPEN - blocking payment gateway request");
                Err(BookingError::TransientIo("payment gateway temporarily unavailable".to_string()))
            }
            Err(failsafe::Error::Inner(e)) => {
                error!("Payment gateway request to {} failed: {:?}", path, e);
                Err(BookingError::TransientIo(format!("payment gateway error: {}", e)))
            }
        }
    }
}

#[async_trait]
impl PaymentAuthorizer for HttpPaymentGateway {
    async fn authorize(&self, request: &PaymentRequest) -> BookingResult<PaymentReceipt> {
        let cents = to_cents(request.amount)?;
        let order_id = format!("order-{}", Uuid::new_v4());
        let body = GatewayAuthorizeRequest {
            merchant_id: &self.merchant_id,
            token: self.generate_token(cents, &order_id),
            amount: cents,
            currency: &self.currency,
            order_id,
            card_number: &request.card_number,
            expiry_date: &request.expiry_date,
            cvv: &request.cvv,
        };

        info!(card = %request.masked_card(), amount = request.amount, "authorizing payment");
        let reply = self.post("/authorize", &body).await?;

        if !reply.success {
            let reason = reply.message.unwrap_or_else(|| "declined by gateway".to_string());
            warn!(card = %request.masked_card(), "payment declined: {}", reason);
            return Err(BookingError::PaymentDeclined(reason));
        }

        let transaction_id = reply.transaction_id.ok_or_else(|| {
            BookingError::TransientIo("gateway approved payment without transaction id".to_string())
        })?;
        info!(%transaction_id, amount = request.amount, "payment authorized");
        Ok(PaymentReceipt { transaction_id, amount: request.amount })
    }

    async fn refund(&self, receipt: &PaymentReceipt) -> BookingResult<()> {
        let cents = to_cents(receipt.amount)?;
        let body = GatewayRefundRequest {
            merchant_id: &self.merchant_id,
            token: self.generate_token(cents, &receipt.transaction_id),
            transaction_id: &receipt.transaction_id,
            amount: cents,
            currency: &self.currency,
        };

        let reply = self.post("/refund", &body).await?;
        if !reply.success {
            let reason = reply.message.unwrap_or_else(|| "refund rejected".to_string());
            error!(transaction_id = %receipt.transaction_id, "refund rejected: {}", reason);
            return Err(BookingError::TransientIo(format!("refund rejected: {}", reason)));
        }

        info!(transaction_id = %receipt.transaction_id, amount = receipt.amount, "payment refunded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(card: &str, expiry: &str, cvv: &str, amount: i64) -> PaymentRequest {
        PaymentRequest {
            card_number: card.to_string(),
            expiry_date: expiry.to_string(),
            cvv: cvv.to_string(),
            amount,
        }
    }

    #[test]
    fn card_data_is_validated() {
        assert!(request("4111111111111111", "12/29", "123", 43).validate().is_ok());
        assert!(request("4111-1111-1111", "12/29", "123", 43).validate().is_err());
        assert!(request("4111111111111111", "13/29", "123", 43).validate().is_err());
        assert!(request("4111111111111111", "1229", "123", 43).validate().is_err());
        assert!(request("4111111111111111", "12/29", "12a", 43).validate().is_err());
        assert!(request("4111111111111111", "12/29", "123", 0).validate().is_err());
        assert!(request("4111111111111111", "12/29", "123", i64::MAX / 10).validate().is_err());
    }

    #[test]
    fn cents_conversion_rejects_overflow() {
        assert_eq!(to_cents(43), Ok(4300));
        assert!(matches!(to_cents(i64::MAX / 10), Err(BookingError::InvalidSelection(_))));
    }

    #[test]
    fn masked_card_keeps_last_four_digits() {
        assert_eq!(request("4111111111111234", "12/29", "123", 1).masked_card(), "****1234");
    }

    #[tokio::test]
    async fn mock_gateway_approves_and_counts_refunds() {
        let gateway = MockPaymentGateway::approving();
        let receipt = gateway.authorize(&request("4111111111111111", "12/29", "123", 43)).await.unwrap();
        assert_eq!(receipt.amount, 43);

        gateway.refund(&receipt).await.unwrap();
        assert_eq!(gateway.refunds(), 1);
    }

    #[tokio::test]
    async fn declining_mock_reports_payment_declined() {
        let gateway = MockPaymentGateway::declining("insufficient funds");
        let err = gateway.authorize(&request("4111111111111111", "12/29", "123", 43)).await.unwrap_err();
        assert_eq!(err, BookingError::PaymentDeclined("insufficient funds".to_string()));
    }
}
