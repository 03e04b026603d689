use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

use super::controller::{
    create_profile, delete_profile, get_my_profile, get_profile, list_profiles,
    update_my_profile, update_profile, upload_profile_avatar,
};

pub fn init_profiles_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_profiles).post(create_profile))
        .route("/me", get(get_my_profile).put(update_my_profile))
        .route("/{key}", get(get_profile).put(update_profile).delete(delete_profile))
        .route("/{key}/avatar", post(upload_profile_avatar))
}
