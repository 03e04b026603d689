use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

use super::controller::{
    create_student, delete_student, get_student, list_students, update_student,
    upload_student_photo,
};

pub fn init_students_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_students).post(create_student))
        .route("/{key}", get(get_student).put(update_student).delete(delete_student))
        .route("/{key}/photo", post(upload_student_photo))
}
