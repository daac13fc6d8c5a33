//! HTTP-клиент к REST API бронирования.
//!
//! Ответы с ошибкой (`{ success: false, error, message, seats? }`) разбираются
//! обратно в `BookingError`, так что сценарий бронирования работает через
//! клиент так же, как и локально. Идемпотентные GET повторяются при
//! `TransientIo` ограниченное число раз.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    catalog::ShowFilter,
    controllers::{
        auth::{LoginRequest, RegisterRequest, TokenResponse},
        bookings::{ConfirmBookingRequest, ConfirmBookingResponse, QuoteResponse, SeatsResponse},
        payment::{PaymentResponse, RefundResponse},
    },
    error::{BookingError, BookingResult, ErrorBody},
    models::{Booking, BookingView, Movie, Seat, SeatCategory, SeatId, Show, Theater, User},
    reservation::BookingBackend,
    services::payment::{PaymentReceipt, PaymentRequest},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("email already registered")]
    EmailTaken,

    #[error("unexpected response {status}: {message}")]
    Unexpected { status: u16, message: String },
}

/// Для `BookingBackend`: сценарий бронирования знает только `BookingError`.
///
/// Эндпоинты сценария публичные, поэтому `Unauthorized`, `EmailTaken` и прочие
/// отказы 4xx сводятся к `InvalidSelection` намеренно: сервер отверг запрос,
/// повторять его бессмысленно. Не сведены 404 (`NotFound`) и 408/429/5xx
/// (`TransientIo`, такой запрос можно повторить).
impl From<ClientError> for BookingError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Booking(e) => e,
            ClientError::Unexpected { status: 404, message } => {
                BookingError::NotFound { entity: "resource".to_string(), id: message }
            }
            ClientError::Unexpected { status, message } if status >= 500 || status == 408 || status == 429 => {
                BookingError::TransientIo(message)
            }
            other => BookingError::InvalidSelection(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Booking(BookingError::TransientIo(err.to_string()))
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Повторы GET: `initial_delay * 2^attempt`, не больше `max_delay`
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    token: Option<String>,
    retry: RetryPolicy,
}

impl ApiClient {
    /// `base_url` указывает на корень API, например `http://localhost:8000/api`
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            token: None,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let mut attempt = 0;
        loop {
            let request = self.authorized(self.http.get(self.url(path)));
            let result = match request.send().await {
                Ok(response) => decode(path, response).await,
                Err(e) => Err(e.into()),
            };

            match result {
                Err(ClientError::Booking(ref e)) if e.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(path, attempt, ?delay, "GET failed, retrying: {}", e);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> ClientResult<T> {
        let response = self.authorized(self.http.post(self.url(path))).json(body).send().await?;
        decode(path, response).await
    }

    /* ---------- каталог ---------- */

    pub async fn theaters(&self) -> ClientResult<Vec<Theater>> {
        self.get("/theaters").await
    }

    pub async fn movies(&self) -> ClientResult<Vec<Movie>> {
        self.get("/movies").await
    }

    pub async fn movie(&self, id: &str) -> ClientResult<Movie> {
        self.get(&format!("/movies/{}", id)).await
    }

    pub async fn shows(&self, filter: &ShowFilter) -> ClientResult<Vec<Show>> {
        let query = serde_urlencoded::to_string(filter)
            .map_err(|e| ClientError::Validation(format!("bad show filter: {}", e)))?;
        if query.is_empty() {
            self.get("/shows").await
        } else {
            self.get(&format!("/shows?{}", query)).await
        }
    }

    pub async fn seat_categories(&self) -> ClientResult<Vec<SeatCategory>> {
        self.get("/seat-categories").await
    }

    /* ---------- места и брони ---------- */

    pub async fn seats(&self, show_id: &str) -> ClientResult<Vec<Seat>> {
        let response: SeatsResponse = self.get(&format!("/shows/{}/seats", show_id)).await?;
        Ok(response.seats)
    }

    /// Сумма к оплате за места, без брони
    pub async fn quote(&self, show_id: &str, seats: &[SeatId]) -> ClientResult<QuoteResponse> {
        let request = ConfirmBookingRequest { show_id: show_id.to_string(), seats: seats.to_vec() };
        self.post("/bookings", &request).await
    }

    pub async fn confirm(&self, show_id: &str, seats: &[SeatId]) -> ClientResult<BookingView> {
        let request = ConfirmBookingRequest { show_id: show_id.to_string(), seats: seats.to_vec() };
        let response: ConfirmBookingResponse = self.post("/bookings/confirm", &request).await?;
        Ok(response.booking)
    }

    pub async fn bookings(&self) -> ClientResult<Vec<BookingView>> {
        self.get("/bookings").await
    }

    /* ---------- оплата ---------- */

    /// Невалидные данные карты (422) считаются отказом в оплате
    pub async fn authorize(&self, request: &PaymentRequest) -> ClientResult<PaymentReceipt> {
        let response: PaymentResponse = self.post("/payment", request).await.map_err(|e| match e {
            ClientError::Validation(message) => ClientError::Booking(BookingError::PaymentDeclined(message)),
            other => other,
        })?;
        Ok(PaymentReceipt { transaction_id: response.transaction_id, amount: request.amount })
    }

    pub async fn refund(&self, receipt: &PaymentReceipt) -> ClientResult<()> {
        let _: RefundResponse = self.post("/payment/refund", receipt).await?;
        Ok(())
    }

    /* ---------- пользователи ---------- */

    pub async fn register(&self, request: &RegisterRequest) -> ClientResult<User> {
        self.post("/register", request).await
    }

    pub async fn login(&self, email: &str, password: &str) -> ClientResult<String> {
        let request = LoginRequest { email: email.to_string(), password: password.to_string() };
        let response: TokenResponse = self.post("/login", &request).await?;
        Ok(response.token)
    }

    pub async fn me(&self) -> ClientResult<User> {
        self.get("/me").await
    }
}

async fn decode<T: DeserializeOwned>(path: &str, response: reqwest::Response) -> ClientResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let bytes = response.bytes().await?;
    let body: Option<ErrorBody> = serde_json::from_slice(&bytes).ok();
    debug!(path, %status, "api error response");
    Err(error_from_body(path, status, body))
}

fn error_from_body(path: &str, status: StatusCode, body: Option<ErrorBody>) -> ClientError {
    let Some(body) = body else {
        return if status.is_server_error() {
            BookingError::TransientIo(format!("{} responded with {}", path, status)).into()
        } else {
            ClientError::Unexpected { status: status.as_u16(), message: format!("{} responded with {}", path, status) }
        };
    };

    match body.error.as_str() {
        "not_found" => BookingError::NotFound { entity: "resource".to_string(), id: path.to_string() }.into(),
        "invalid_selection" => BookingError::InvalidSelection(body.message).into(),
        "seat_conflict" => BookingError::SeatConflict { seats: body.seats }.into(),
        "payment_declined" => BookingError::PaymentDeclined(body.message).into(),
        "transient_io" => BookingError::TransientIo(body.message).into(),
        "validation" => ClientError::Validation(body.message),
        "unauthorized" => ClientError::Unauthorized(body.message),
        "email_taken" => ClientError::EmailTaken,
        _ if status.is_server_error() => BookingError::TransientIo(body.message).into(),
        _ => ClientError::Unexpected { status: status.as_u16(), message: body.message },
    }
}

#[async_trait]
impl BookingBackend for ApiClient {
    async fn seats(&self, show_id: &str) -> BookingResult<Vec<Seat>> {
        Ok(ApiClient::seats(self, show_id).await?)
    }

    async fn authorize_payment(&self, request: &PaymentRequest) -> BookingResult<PaymentReceipt> {
        Ok(self.authorize(request).await?)
    }

    async fn refund_payment(&self, receipt: &PaymentReceipt) -> BookingResult<()> {
        Ok(self.refund(receipt).await?)
    }

    async fn confirm_booking(&self, show_id: &str, seats: &[SeatId]) -> BookingResult<Booking> {
        Ok(self.confirm(show_id, seats).await?.booking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(code: &str, message: &str, seats: &[&str]) -> Option<ErrorBody> {
        Some(ErrorBody {
            success: false,
            error: code.to_string(),
            message: message.to_string(),
            seats: seats.iter().map(|s| SeatId::from(*s)).collect(),
        })
    }

    #[test]
    fn conflict_body_keeps_seat_ids() {
        let err = error_from_body("/bookings/confirm", StatusCode::CONFLICT, body("seat_conflict", "taken", &["A1", "A2"]));
        assert_eq!(
            err,
            ClientError::Booking(BookingError::SeatConflict { seats: vec![SeatId::from("A1"), SeatId::from("A2")] })
        );
    }

    #[test]
    fn server_errors_without_body_are_transient() {
        let err = error_from_body("/theaters", StatusCode::BAD_GATEWAY, None);
        assert!(matches!(err, ClientError::Booking(ref e) if e.is_retryable()));

        let err = error_from_body("/theaters", StatusCode::IM_A_TEAPOT, None);
        assert!(matches!(err, ClientError::Unexpected { status: 418, .. }));
    }

    #[test]
    fn rejected_requests_collapse_to_invalid_selection() {
        let err: BookingError = ClientError::Unauthorized("no token".into()).into();
        assert!(matches!(err, BookingError::InvalidSelection(_)));

        let err: BookingError = ClientError::EmailTaken.into();
        assert!(matches!(err, BookingError::InvalidSelection(_)));

        let err: BookingError = ClientError::Unexpected { status: 418, message: "teapot".into() }.into();
        assert!(matches!(err, BookingError::InvalidSelection(_)));
    }

    #[test]
    fn unexpected_statuses_keep_their_meaning() {
        let err: BookingError = ClientError::Unexpected { status: 503, message: "down".into() }.into();
        assert_eq!(err, BookingError::TransientIo("down".into()));

        let err: BookingError = ClientError::Unexpected { status: 429, message: "slow down".into() }.into();
        assert!(err.is_retryable());

        let err: BookingError = ClientError::Unexpected { status: 404, message: "/shows/x/seats".into() }.into();
        assert!(matches!(err, BookingError::NotFound { .. }));
    }

    #[test]
    fn retry_delay_doubles_up_to_the_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(2));
    }
}
