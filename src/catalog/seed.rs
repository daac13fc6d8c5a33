use chrono::{Duration, NaiveDate, NaiveTime};

use super::Catalog;
use crate::{
    config::CatalogConfig,
    models::{Movie, SeatCategory, Show, Theater},
};

fn theater(id: &str, name: &str, location: &str) -> Theater {
    Theater { id: id.into(), name: name.into(), location: location.into() }
}

fn movie(id: &str, title: &str, duration: u32, genre: &str) -> Movie {
    Movie { id: id.into(), title: title.into(), genre: genre.into(), duration }
}

fn category(id: &str, name: &str, price: i64, rows: &[&str]) -> SeatCategory {
    SeatCategory {
        id: id.into(),
        name: name.into(),
        price,
        rows: rows.iter().map(|r| r.to_string()).collect(),
    }
}

/// Id сеанса содержит календарную дату, поэтому один id всегда означает один
/// и тот же показ, с какого бы дня ни строился каталог.
pub(super) fn demo_catalog(config: &CatalogConfig, first_day: NaiveDate) -> Catalog {
    let theaters = vec![
        theater("t1", "Downtown Cinema", "123 Main St, Downtown"),
        theater("t2", "Mall Multiplex", "456 Shopping Ave, Mall"),
        theater("t3", "Suburban Theater", "789 Suburb Rd, Suburbs"),
    ];

    let movies = vec![
        movie("m1", "Action Thriller", 120, "Action"),
        movie("m2", "Romantic Comedy", 105, "Romance"),
        movie("m3", "Sci-Fi Adventure", 135, "Sci-Fi"),
    ];

    let categories = vec![
        category("platinum", "Platinum", 25, &["A", "B"]),
        category("gold", "Gold", 18, &["C", "D", "E"]),
        category("box", "Box", 30, &["F"]),
    ];

    let mut shows = Vec::new();
    for t in &theaters {
        for m in &movies {
            for day in 0..config.days_ahead {
                let date = first_day + Duration::days(i64::from(day));
                for &hour in &config.show_hours {
                    // Часы вне 0..24 в конфиге просто пропускаем
                    let Some(time) = NaiveTime::from_hms_opt(hour, 0, 0) else {
                        continue;
                    };
                    shows.push(Show {
                        id: show_id(&t.id, &m.id, date, hour),
                        theater_id: t.id.clone(),
                        movie_id: m.id.clone(),
                        datetime: date.and_time(time),
                    });
                }
            }
        }
    }

    Catalog::new(theaters, movies, shows, categories, config.seats_per_row)
}

pub(super) fn show_id(theater_id: &str, movie_id: &str, date: NaiveDate, hour: u32) -> String {
    format!("{}_{}_{}_{}", theater_id, movie_id, date.format("%Y%m%d"), hour)
}
