use axum::{Router, routing::get};

use crate::state::AppState;

use super::controller::{create_permission, delete_permission, get_permission, list_permissions, update_permission};

pub fn init_permissions_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_permissions).post(create_permission))
        .route("/{key}", get(get_permission).put(update_permission).delete(delete_permission))
}
