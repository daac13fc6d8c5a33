pub mod auth;
pub mod payment;
pub mod users;
