use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub age: Option<u32>,
    pub city: Option<String>,
    pub language: Option<String>,
    pub email: String,
    // Хеш пароля наружу не отдаётся
    #[serde(default, skip_serializing)]
    pub password_hash: String,
    pub registered_at: DateTime<Utc>,
}
