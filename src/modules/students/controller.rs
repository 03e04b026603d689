use axum::extract::{Multipart, Path, State};
use schoolyard_core::codes::EntityKey;
use schoolyard_core::{ApiResponse, AppError, ListParams, ViewParams};
use serde_json::Value;
use tracing::instrument;

use crate::extract::Params;
use crate::middleware::auth::{
    RequireStudentsCreate, RequireStudentsDelete, RequireStudentsRead, RequireStudentsUpdate,
};
use crate::modules::uploads::model::ImageUploadForm;
use crate::modules::uploads::service::read_image;
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::model::{CreateStudentDto, Student, StudentFilterParams, UpdateStudentDto};
use super::service::StudentService;

#[utoipa::path(
    post,
    path = "/api/students",
    request_body = CreateStudentDto,
    responses(
        (status = 201, description = "Student created", body = ApiResponse<Student>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires students:create"),
        (status = 409, description = "Admission number already in use")
    ),
    tag = "Students",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn create_student(
    State(state): State<AppState>,
    RequireStudentsCreate(auth_user): RequireStudentsCreate,
    ValidatedJson(dto): ValidatedJson<CreateStudentDto>,
) -> Result<ApiResponse<Student>, AppError> {
    let record = StudentService::create(&state.db, &auth_user.actor(), dto).await?;
    Ok(ApiResponse::created("Student created successfully", record))
}

#[utoipa::path(
    get,
    path = "/api/students",
    params(ListParams, StudentFilterParams),
    responses(
        (status = 200, description = "Students", body = ApiResponse<Vec<Student>>),
        (status = 400, description = "Invalid listing parameters"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires students:read")
    ),
    tag = "Students",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, _auth_user))]
pub async fn list_students(
    State(state): State<AppState>,
    RequireStudentsRead(_auth_user): RequireStudentsRead,
    Params(params): Params<ListParams>,
    Params(filters): Params<StudentFilterParams>,
) -> Result<ApiResponse<Vec<Value>>, AppError> {
    let page = StudentService::list(&state.db, &params, filters).await?;
    Ok(ApiResponse::page("Students fetched successfully", page))
}

#[utoipa::path(
    get,
    path = "/api/students/{key}",
    params(("key" = String, Path, description = "Student id or code"), ViewParams),
    responses(
        (status = 200, description = "Student", body = ApiResponse<Student>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires students:read"),
        (status = 404, description = "Student not found")
    ),
    tag = "Students",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, _auth_user))]
pub async fn get_student(
    State(state): State<AppState>,
    RequireStudentsRead(_auth_user): RequireStudentsRead,
    Path(key): Path<String>,
    Params(view): Params<ViewParams>,
) -> Result<ApiResponse<Value>, AppError> {
    let record = StudentService::get(&state.db, &EntityKey::parse(&key), view.populate()).await?;
    Ok(ApiResponse::ok("Student fetched successfully", record))
}

#[utoipa::path(
    put,
    path = "/api/students/{key}",
    params(("key" = String, Path, description = "Student id or code")),
    request_body = UpdateStudentDto,
    responses(
        (status = 200, description = "Student updated", body = ApiResponse<Student>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires students:update"),
        (status = 404, description = "Student not found"),
        (status = 409, description = "Admission number already in use")
    ),
    tag = "Students",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn update_student(
    State(state): State<AppState>,
    RequireStudentsUpdate(auth_user): RequireStudentsUpdate,
    Path(key): Path<String>,
    ValidatedJson(dto): ValidatedJson<UpdateStudentDto>,
) -> Result<ApiResponse<Student>, AppError> {
    let record =
        StudentService::update(&state.db, &auth_user.actor(), &EntityKey::parse(&key), dto).await?;
    Ok(ApiResponse::ok("Student updated successfully", record))
}

#[utoipa::path(
    delete,
    path = "/api/students/{key}",
    params(("key" = String, Path, description = "Student id or code")),
    responses(
        (status = 200, description = "Student deleted", body = ApiResponse<Student>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires students:delete"),
        (status = 404, description = "Student not found"),
        (status = 409, description = "Student is still referenced")
    ),
    tag = "Students",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user), fields(user.id = %auth_user.user_id))]
pub async fn delete_student(
    State(state): State<AppState>,
    RequireStudentsDelete(auth_user): RequireStudentsDelete,
    Path(key): Path<String>,
) -> Result<ApiResponse<Student>, AppError> {
    let record = StudentService::delete(
        &state.db,
        state.media.as_ref(),
        &auth_user.actor(),
        &EntityKey::parse(&key),
    )
    .await?;
    Ok(ApiResponse::ok("Student deleted successfully", record))
}

#[utoipa::path(
    post,
    path = "/api/students/{key}/photo",
    params(("key" = String, Path, description = "Student id or code")),
    request_body(content = ImageUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Photo replaced", body = ApiResponse<Student>),
        (status = 400, description = "Missing file, empty file or unsupported type"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires students:update"),
        (status = 404, description = "Student not found"),
        (status = 413, description = "File too large"),
        (status = 502, description = "Media host failure")
    ),
    tag = "Students",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, multipart), fields(user.id = %auth_user.user_id))]
pub async fn upload_student_photo(
    State(state): State<AppState>,
    RequireStudentsUpdate(auth_user): RequireStudentsUpdate,
    Path(key): Path<String>,
    multipart: Multipart,
) -> Result<ApiResponse<Student>, AppError> {
    let image = read_image(multipart).await?;
    let folder = format!("{}/students", state.media_config.folder);
    let student = StudentService::set_photo(
        &state.db,
        state.media.as_ref(),
        &folder,
        &auth_user.actor(),
        &EntityKey::parse(&key),
        image,
    )
    .await?;
    Ok(ApiResponse::ok("Photo updated successfully", student))
}
