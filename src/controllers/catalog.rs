use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::{
    catalog::ShowFilter,
    error::ApiError,
    models::{Movie, SeatCategory, Show, Theater},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/theaters", get(list_theaters))
        .route("/movies", get(list_movies))
        .route("/movies/{id}", get(get_movie))
        .route("/shows", get(list_shows))
        .route("/seat-categories", get(list_seat_categories))
}

// GET /api/theaters
async fn list_theaters(State(state): State<Arc<AppState>>) -> Json<Vec<Theater>> {
    Json(state.catalog.theaters().to_vec())
}

// GET /api/movies
async fn list_movies(State(state): State<Arc<AppState>>) -> Json<Vec<Movie>> {
    Json(state.catalog.movies().to_vec())
}

// GET /api/movies/{id}
async fn get_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Movie>, ApiError> {
    Ok(Json(state.catalog.movie(&id)?.clone()))
}

// GET /api/shows?theaterId=&movieId=
async fn list_shows(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ShowFilter>,
) -> Json<Vec<Show>> {
    Json(state.catalog.shows(&filter).into_iter().cloned().collect())
}

// GET /api/seat-categories
async fn list_seat_categories(State(state): State<Arc<AppState>>) -> Json<Vec<SeatCategory>> {
    Json(state.catalog.seat_categories().to_vec())
}
