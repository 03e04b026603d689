use axum::{
    Router,
    routing::{get, put},
};

use crate::state::AppState;

use super::controller::{
    create_user, delete_user, get_user, list_users, reset_user_password, update_user,
};

pub fn init_users_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{key}", get(get_user).put(update_user).delete(delete_user))
        .route("/{key}/password", put(reset_user_password))
}
