use axum::{Router, routing::get};

use crate::state::AppState;

use super::controller::{create_city, delete_city, get_city, list_cities, update_city};

pub fn init_cities_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_cities).post(create_city))
        .route("/{key}", get(get_city).put(update_city).delete(delete_city))
}
