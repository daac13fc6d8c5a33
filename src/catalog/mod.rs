//! Справочные данные: кинотеатры, фильмы, сеансы, категории мест и схема зала.
//!
//! Каталог собирается один раз при старте и дальше только читается, поэтому
//! раздаётся через `Arc<Catalog>` без блокировок.

mod seed;

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
    config::CatalogConfig,
    error::{BookingError, BookingResult},
    models::{Booking, BookingView, Movie, SeatCategory, SeatId, Show, Theater},
};

/// Место в схеме зала (без привязки к сеансу)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutSeat {
    pub id: SeatId,
    pub row: String,
    pub number: u32,
    pub category: String,
    pub price: i64,
}

/// Упорядоченная схема зала: ряды в порядке категорий, места по номеру
#[derive(Debug, Clone)]
pub struct SeatLayout {
    seats: Vec<LayoutSeat>,
    index: HashMap<SeatId, usize>,
}

impl SeatLayout {
    pub fn new(categories: &[SeatCategory], seats_per_row: u32) -> Self {
        let seats: Vec<LayoutSeat> = categories
            .iter()
            .flat_map(|category| {
                category.rows.iter().flat_map(move |row| {
                    (1..=seats_per_row).map(move |number| LayoutSeat {
                        id: SeatId::new(row, number),
                        row: row.clone(),
                        number,
                        category: category.id.clone(),
                        price: category.price,
                    })
                })
            })
            .collect();

        let index = seats
            .iter()
            .enumerate()
            .map(|(i, seat)| (seat.id.clone(), i))
            .collect();

        SeatLayout { seats, index }
    }

    pub fn seats(&self) -> &[LayoutSeat] {
        &self.seats
    }

    pub fn get(&self, id: &SeatId) -> Option<&LayoutSeat> {
        self.index.get(id).map(|&i| &self.seats[i])
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }
}

/// Фильтр для `GET /shows`
#[derive(Debug, Default, Clone, Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowFilter {
    pub theater_id: Option<String>,
    pub movie_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    theaters: Vec<Theater>,
    movies: Vec<Movie>,
    shows: Vec<Show>,
    categories: Vec<SeatCategory>,
    layout: SeatLayout,
    show_index: HashMap<String, usize>,
}

impl Catalog {
    pub fn new(
        theaters: Vec<Theater>,
        movies: Vec<Movie>,
        shows: Vec<Show>,
        categories: Vec<SeatCategory>,
        seats_per_row: u32,
    ) -> Self {
        let layout = SeatLayout::new(&categories, seats_per_row);
        let show_index = shows
            .iter()
            .enumerate()
            .map(|(i, show)| (show.id.clone(), i))
            .collect();

        Catalog { theaters, movies, shows, categories, layout, show_index }
    }

    /// Демо-каталог: три кинотеатра, три фильма, сеансы на `days_ahead` дней
    /// начиная с `start_date` (по умолчанию с сегодняшнего дня)
    pub fn seeded(config: &CatalogConfig) -> Self {
        let first_day = config.start_date.unwrap_or_else(|| chrono::Local::now().date_naive());
        seed::demo_catalog(config, first_day)
    }

    /// Id сеанса: `{theaterId}_{movieId}_{YYYYMMDD}_{hour}`
    pub fn show_id(theater_id: &str, movie_id: &str, date: NaiveDate, hour: u32) -> String {
        seed::show_id(theater_id, movie_id, date, hour)
    }

    pub fn theaters(&self) -> &[Theater] {
        &self.theaters
    }

    pub fn movies(&self) -> &[Movie] {
        &self.movies
    }

    pub fn movie(&self, id: &str) -> BookingResult<&Movie> {
        self.movies
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| BookingError::not_found("movie", id))
    }

    pub fn theater(&self, id: &str) -> BookingResult<&Theater> {
        self.theaters
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| BookingError::not_found("theater", id))
    }

    pub fn all_shows(&self) -> &[Show] {
        &self.shows
    }

    pub fn shows(&self, filter: &ShowFilter) -> Vec<&Show> {
        self.shows
            .iter()
            .filter(|s| filter.theater_id.as_deref().map_or(true, |t| s.theater_id == t))
            .filter(|s| filter.movie_id.as_deref().map_or(true, |m| s.movie_id == m))
            .collect()
    }

    pub fn show(&self, id: &str) -> BookingResult<&Show> {
        self.show_index
            .get(id)
            .map(|&i| &self.shows[i])
            .ok_or_else(|| BookingError::not_found("show", id))
    }

    pub fn seat_categories(&self) -> &[SeatCategory] {
        &self.categories
    }

    pub fn layout(&self) -> &SeatLayout {
        &self.layout
    }

    /// Бронь с названиями кинотеатра и фильма и временем сеанса
    pub fn booking_view(&self, booking: Booking) -> BookingResult<BookingView> {
        let show = self.show(&booking.show_id)?;
        let theater = self.theater(&show.theater_id)?.name.clone();
        let movie = self.movie(&show.movie_id)?.title.clone();
        let datetime = show.datetime;
        Ok(BookingView { booking, theater, movie, datetime })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, d).unwrap()
    }

    fn catalog_from(first_day: NaiveDate) -> Catalog {
        Catalog::seeded(&CatalogConfig {
            days_ahead: 2,
            show_hours: vec![10, 18],
            seats_per_row: 10,
            start_date: Some(first_day),
        })
    }

    fn catalog() -> Catalog {
        catalog_from(day(15))
    }

    #[test]
    fn layout_covers_every_category_row() {
        let catalog = catalog();
        // A,B + C,D,E + F = 6 рядов по 10 мест
        assert_eq!(catalog.layout().len(), 60);

        let a1 = catalog.layout().get(&SeatId::from("A1")).expect("A1 exists");
        assert_eq!(a1.category, "platinum");
        assert_eq!(a1.price, 25);

        let f10 = catalog.layout().get(&SeatId::from("F10")).expect("F10 exists");
        assert_eq!(f10.category, "box");
        assert!(catalog.layout().get(&SeatId::from("G1")).is_none());
        assert!(catalog.layout().get(&SeatId::from("A11")).is_none());
    }

    #[test]
    fn shows_are_generated_per_theater_movie_day_and_hour() {
        let catalog = catalog();
        assert_eq!(catalog.all_shows().len(), 3 * 3 * 2 * 2);

        let show = catalog.show("t1_m2_20300116_18").expect("show exists");
        assert_eq!(show.theater_id, "t1");
        assert_eq!(show.movie_id, "m2");
        assert_eq!(show.datetime, day(16).and_hms_opt(18, 0, 0).unwrap());
    }

    #[test]
    fn show_id_names_one_screening_whatever_day_the_catalog_is_built() {
        let yesterday = catalog_from(day(15));
        let today = catalog_from(day(16));

        // Общий день (16-е) даёт те же id с теми же датами
        let mut shared = 0;
        for show in today.all_shows() {
            if let Ok(old) = yesterday.show(&show.id) {
                assert_eq!(old.datetime, show.datetime, "{} moved", show.id);
                shared += 1;
            }
        }
        assert_eq!(shared, 3 * 3 * 2);

        // Показ 15-го в новом каталоге не появляется под чужим id
        assert!(today.show("t1_m1_20300115_10").is_err());
        assert!(yesterday.show("t1_m1_20300117_10").is_err());
        assert_eq!(Catalog::show_id("t1", "m1", day(17), 10), "t1_m1_20300117_10");
    }

    #[test]
    fn show_filter_combines_theater_and_movie() {
        let catalog = catalog();

        let by_theater = catalog.shows(&ShowFilter { theater_id: Some("t2".into()), movie_id: None });
        assert_eq!(by_theater.len(), 3 * 2 * 2);
        assert!(by_theater.iter().all(|s| s.theater_id == "t2"));

        let both = catalog.shows(&ShowFilter {
            theater_id: Some("t2".into()),
            movie_id: Some("m3".into()),
        });
        assert_eq!(both.len(), 4);

        let none = catalog.shows(&ShowFilter { theater_id: Some("t9".into()), movie_id: None });
        assert!(none.is_empty());
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let catalog = catalog();
        assert!(matches!(catalog.show("nope"), Err(BookingError::NotFound { .. })));
        assert!(matches!(catalog.movie("m42"), Err(BookingError::NotFound { .. })));
    }

    #[test]
    fn booking_view_names_theater_and_movie() {
        let catalog = catalog();
        let booking = Booking {
            id: uuid::Uuid::new_v4(),
            show_id: "t2_m3_20300115_18".to_string(),
            seats: vec![SeatId::from("A1")],
            amount: 25,
            created_at: chrono::Utc::now(),
        };

        let view = catalog.booking_view(booking).unwrap();
        assert_eq!(view.theater, "Mall Multiplex");
        assert_eq!(view.movie, "Sci-Fi Adventure");
        assert_eq!(view.datetime.format("%H:%M").to_string(), "18:00");
    }
}
