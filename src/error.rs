use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::SeatId;

pub type BookingResult<T> = Result<T, BookingError>;

/// Ошибки ядра бронирования
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookingError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    #[error("seats already taken: {}", join_seats(.seats))]
    SeatConflict { seats: Vec<SeatId> },

    #[error("payment declined: {0}")]
    PaymentDeclined(String),

    #[error("transient i/o failure: {0}")]
    TransientIo(String),
}

pub(crate) fn join_seats(seats: &[SeatId]) -> String {
    seats.iter().map(SeatId::as_str).collect::<Vec<_>>().join(", ")
}

impl BookingError {
    pub fn not_found(entity: &str, id: impl Into<String>) -> Self {
        BookingError::NotFound { entity: entity.to_string(), id: id.into() }
    }

    /// Повторять запрос имеет смысл только при сбое хранилища или сети
    pub fn is_retryable(&self) -> bool {
        matches!(self, BookingError::TransientIo(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            BookingError::NotFound { .. } => "not_found",
            BookingError::InvalidSelection(_) => "invalid_selection",
            BookingError::SeatConflict { .. } => "seat_conflict",
            BookingError::PaymentDeclined(_) => "payment_declined",
            BookingError::TransientIo(_) => "transient_io",
        }
    }
}

impl From<sqlx::Error> for BookingError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => BookingError::not_found("row", "unknown"),
            other => BookingError::TransientIo(other.to_string()),
        }
    }
}

impl From<redis::RedisError> for BookingError {
    fn from(err: redis::RedisError) -> Self {
        BookingError::TransientIo(err.to_string())
    }
}

/// Ошибка HTTP-слоя
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("invalid request body: {0}")]
    InvalidBody(#[from] JsonRejection),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("email already registered")]
    EmailTaken,

    #[error("internal error: {0}")]
    Internal(String),
}

/// Тело ответа с ошибкой. Его же разбирает `ApiClient`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seats: Vec<SeatId>,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Booking(err) => match err {
                BookingError::NotFound { .. } => StatusCode::NOT_FOUND,
                BookingError::InvalidSelection(_) => StatusCode::BAD_REQUEST,
                BookingError::SeatConflict { .. } => StatusCode::CONFLICT,
                BookingError::PaymentDeclined(_) => StatusCode::PAYMENT_REQUIRED,
                BookingError::TransientIo(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            // 400 для битого JSON, 422 для чужой формы, 415 без Content-Type
            ApiError::InvalidBody(rejection) => rejection.status(),
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::EmailTaken => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Booking(err) => err.code(),
            ApiError::Validation(_) | ApiError::InvalidBody(_) => "validation",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::EmailTaken => "email_taken",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let seats = match &self {
            ApiError::Booking(BookingError::SeatConflict { seats }) => seats.clone(),
            _ => Vec::new(),
        };

        let body = ErrorBody {
            success: false,
            error: self.code().to_string(),
            message: self.to_string(),
            seats,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(BookingError::TransientIo("timeout".into()).is_retryable());
        assert!(!BookingError::SeatConflict { seats: vec![] }.is_retryable());
        assert!(!BookingError::PaymentDeclined("no funds".into()).is_retryable());
        assert!(!BookingError::InvalidSelection("empty".into()).is_retryable());
    }

    #[test]
    fn conflict_maps_to_409_and_lists_seats() {
        let err = ApiError::from(BookingError::SeatConflict {
            seats: vec![SeatId::from("A1"), SeatId::from("A2")],
        });
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "seat_conflict");
        assert_eq!(err.to_string(), "seats already taken: A1, A2");
    }

    #[test]
    fn transient_io_is_not_a_plain_500() {
        let err = ApiError::from(BookingError::TransientIo("pool timed out".into()));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
