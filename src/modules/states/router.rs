use axum::{Router, routing::get};

use crate::state::AppState;

use super::controller::{create_state, delete_state, get_state, list_states, update_state};

pub fn init_states_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_states).post(create_state))
        .route("/{key}", get(get_state).put(update_state).delete(delete_state))
}
