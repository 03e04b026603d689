use axum::{Router, routing::post};

use crate::state::AppState;

use super::controller::upload_image;

pub fn init_uploads_router() -> Router<AppState> {
    Router::new().route("/images", post(upload_image))
}
