use axum::{
    Router,
    routing::{get, put},
};

use crate::state::AppState;

use super::controller::{
    create_role, delete_role, get_role, list_roles, set_role_permissions, update_role,
};

pub fn init_roles_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_roles).post(create_role))
        .route("/{key}", get(get_role).put(update_role).delete(delete_role))
        .route("/{key}/permissions", put(set_role_permissions))
}
