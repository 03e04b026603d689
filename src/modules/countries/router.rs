use axum::{Router, routing::get};

use crate::state::AppState;

use super::controller::{create_country, delete_country, get_country, list_countries, update_country};

pub fn init_countries_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_countries).post(create_country))
        .route("/{key}", get(get_country).put(update_country).delete(delete_country))
}
