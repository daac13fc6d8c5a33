use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;

use crate::{error::ApiError, models::User};

pub struct NewUser {
    pub name: String,
    pub age: Option<u32>,
    pub city: Option<String>,
    pub language: Option<String>,
    pub email: String,
    pub password_hash: String,
}

/// Пользователи в памяти процесса. Email уникален без учёта регистра
#[derive(Default)]
pub struct UserStore {
    users: RwLock<Vec<User>>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, new_user: NewUser) -> Result<User, ApiError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email.eq_ignore_ascii_case(&new_user.email)) {
            return Err(ApiError::EmailTaken);
        }

        let user = User {
            id: users.len() as i64 + 1,
            name: new_user.name,
            age: new_user.age,
            city: new_user.city,
            language: new_user.language,
            email: new_user.email,
            password_hash: new_user.password_hash,
            registered_at: Utc::now(),
        };
        users.push(user.clone());
        info!(user_id = user.id, "user registered");
        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> Option<User> {
        self.users
            .read()
            .await
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    pub async fn find_by_id(&self, id: i64) -> Option<User> {
        self.users.read().await.iter().find(|u| u.id == id).cloned()
    }
}
