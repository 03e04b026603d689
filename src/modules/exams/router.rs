use axum::{Router, routing::get};

use crate::state::AppState;

use super::controller::{create_exam, delete_exam, get_exam, list_exams, update_exam};

pub fn init_exams_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_exams).post(create_exam))
        .route("/{key}", get(get_exam).put(update_exam).delete(delete_exam))
}
