use axum::{Router, routing::get};

use crate::state::AppState;

use super::controller::{create_class, delete_class, get_class, list_classes, update_class};

pub fn init_classes_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_classes).post(create_class))
        .route("/{key}", get(get_class).put(update_class).delete(delete_class))
}
