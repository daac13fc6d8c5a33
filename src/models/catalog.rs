use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theater {
    pub id: String,
    pub name: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    pub id: String,
    pub title: String,
    pub genre: String,
    /// Длительность в минутах
    pub duration: u32,
}

/// Сеанс: фильм в конкретном кинотеатре в конкретное время
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Show {
    pub id: String,
    pub theater_id: String,
    pub movie_id: String,
    pub datetime: NaiveDateTime,
}
