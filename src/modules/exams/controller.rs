use axum::extract::{Path, State};
use schoolyard_core::codes::EntityKey;
use schoolyard_core::{ApiResponse, AppError, ListParams, ViewParams};
use serde_json::Value;
use tracing::instrument;

use crate::extract::Params;
use crate::middleware::auth::{
    RequireExamsCreate, RequireExamsDelete, RequireExamsRead, RequireExamsUpdate,
};
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::model::{CreateExamDto, Exam, ExamFilterParams, UpdateExamDto};
use super::service::ExamService;

#[utoipa::path(
    post,
    path = "/api/exams",
    request_body = CreateExamDto,
    responses(
        (status = 201, description = "Exam created", body = ApiResponse<Exam>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires exams:create"),
        (status = 409, description = "Exam with this name already exists for the class and subject")
    ),
    tag = "Exams",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn create_exam(
    State(state): State<AppState>,
    RequireExamsCreate(auth_user): RequireExamsCreate,
    ValidatedJson(dto): ValidatedJson<CreateExamDto>,
) -> Result<ApiResponse<Exam>, AppError> {
    let record = ExamService::create(&state.db, &auth_user.actor(), dto).await?;
    Ok(ApiResponse::created("Exam created successfully", record))
}

#[utoipa::path(
    get,
    path = "/api/exams",
    params(ListParams, ExamFilterParams),
    responses(
        (status = 200, description = "Exams", body = ApiResponse<Vec<Exam>>),
        (status = 400, description = "Invalid listing parameters"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires exams:read")
    ),
    tag = "Exams",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, _auth_user))]
pub async fn list_exams(
    State(state): State<AppState>,
    RequireExamsRead(_auth_user): RequireExamsRead,
    Params(params): Params<ListParams>,
    Params(filters): Params<ExamFilterParams>,
) -> Result<ApiResponse<Vec<Value>>, AppError> {
    let page = ExamService::list(&state.db, &params, filters).await?;
    Ok(ApiResponse::page("Exams fetched successfully", page))
}

#[utoipa::path(
    get,
    path = "/api/exams/{key}",
    params(("key" = String, Path, description = "Exam id or code"), ViewParams),
    responses(
        (status = 200, description = "Exam", body = ApiResponse<Exam>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires exams:read"),
        (status = 404, description = "Exam not found")
    ),
    tag = "Exams",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, _auth_user))]
pub async fn get_exam(
    State(state): State<AppState>,
    RequireExamsRead(_auth_user): RequireExamsRead,
    Path(key): Path<String>,
    Params(view): Params<ViewParams>,
) -> Result<ApiResponse<Value>, AppError> {
    let record = ExamService::get(&state.db, &EntityKey::parse(&key), view.populate()).await?;
    Ok(ApiResponse::ok("Exam fetched successfully", record))
}

#[utoipa::path(
    put,
    path = "/api/exams/{key}",
    params(("key" = String, Path, description = "Exam id or code")),
    request_body = UpdateExamDto,
    responses(
        (status = 200, description = "Exam updated", body = ApiResponse<Exam>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires exams:update"),
        (status = 404, description = "Exam not found"),
        (status = 409, description = "Exam with this name already exists for the class and subject")
    ),
    tag = "Exams",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn update_exam(
    State(state): State<AppState>,
    RequireExamsUpdate(auth_user): RequireExamsUpdate,
    Path(key): Path<String>,
    ValidatedJson(dto): ValidatedJson<UpdateExamDto>,
) -> Result<ApiResponse<Exam>, AppError> {
    let record =
        ExamService::update(&state.db, &auth_user.actor(), &EntityKey::parse(&key), dto).await?;
    Ok(ApiResponse::ok("Exam updated successfully", record))
}

#[utoipa::path(
    delete,
    path = "/api/exams/{key}",
    params(("key" = String, Path, description = "Exam id or code")),
    responses(
        (status = 200, description = "Exam deleted", body = ApiResponse<Exam>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires exams:delete"),
        (status = 404, description = "Exam not found"),
        (status = 409, description = "Exam is still referenced")
    ),
    tag = "Exams",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user), fields(user.id = %auth_user.user_id))]
pub async fn delete_exam(
    State(state): State<AppState>,
    RequireExamsDelete(auth_user): RequireExamsDelete,
    Path(key): Path<String>,
) -> Result<ApiResponse<Exam>, AppError> {
    let record = ExamService::delete(&state.db, &auth_user.actor(), &EntityKey::parse(&key)).await?;
    Ok(ApiResponse::ok("Exam deleted successfully", record))
}
