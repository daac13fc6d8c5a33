pub mod booking;
pub mod catalog;
pub mod seat;
pub mod user;

pub use booking::{Booking, BookingView};
pub use catalog::{Movie, Show, Theater};
pub use seat::{Seat, SeatCategory, SeatId};
pub use user::User;
