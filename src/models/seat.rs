use serde::{Deserialize, Serialize};
use std::fmt;

/// Идентификатор места: буква ряда + номер, например `A1`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeatId(String);

impl SeatId {
    pub fn new(row: &str, number: u32) -> Self {
        SeatId(format!("{}{}", row, number))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SeatId {
    fn from(value: &str) -> Self {
        SeatId(value.to_string())
    }
}

impl From<String> for SeatId {
    fn from(value: String) -> Self {
        SeatId(value)
    }
}

/// Ценовая категория мест (platinum, gold, ...) и ряды, которые к ней относятся
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatCategory {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub rows: Vec<String>,
}

/// Место в карте зала конкретного сеанса
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: SeatId,
    pub row: String,
    pub number: u32,
    pub category: String,
    pub price: i64,
    pub available: bool,
}
