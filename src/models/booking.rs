use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SeatId;

/// Подтвержденная бронь. После создания не изменяется
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub show_id: String,
    pub seats: Vec<SeatId>,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Бронь вместе с названиями кинотеатра и фильма для отображения
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: Booking,
    pub theater: String,
    pub movie: String,
    pub datetime: NaiveDateTime,
}
