use axum::extract::{Path, State};
use schoolyard_core::codes::EntityKey;
use schoolyard_core::{ApiResponse, AppError, ListParams, ViewParams};
use serde_json::Value;
use tracing::instrument;

use crate::extract::Params;
use crate::middleware::auth::{
    RequireSubjectsCreate, RequireSubjectsDelete, RequireSubjectsRead, RequireSubjectsUpdate,
};
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::model::{CreateSubjectDto, Subject, SubjectFilterParams, UpdateSubjectDto};
use super::service::SubjectService;

#[utoipa::path(
    post,
    path = "/api/subjects",
    request_body = CreateSubjectDto,
    responses(
        (status = 201, description = "Subject created", body = ApiResponse<Subject>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires subjects:create"),
        (status = 409, description = "Subject with this name already exists in the class")
    ),
    tag = "Subjects",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn create_subject(
    State(state): State<AppState>,
    RequireSubjectsCreate(auth_user): RequireSubjectsCreate,
    ValidatedJson(dto): ValidatedJson<CreateSubjectDto>,
) -> Result<ApiResponse<Subject>, AppError> {
    let record = SubjectService::create(&state.db, &auth_user.actor(), dto).await?;
    Ok(ApiResponse::created("Subject created successfully", record))
}

#[utoipa::path(
    get,
    path = "/api/subjects",
    params(ListParams, SubjectFilterParams),
    responses(
        (status = 200, description = "Subjects", body = ApiResponse<Vec<Subject>>),
        (status = 400, description = "Invalid listing parameters"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires subjects:read")
    ),
    tag = "Subjects",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, _auth_user))]
pub async fn list_subjects(
    State(state): State<AppState>,
    RequireSubjectsRead(_auth_user): RequireSubjectsRead,
    Params(params): Params<ListParams>,
    Params(filters): Params<SubjectFilterParams>,
) -> Result<ApiResponse<Vec<Value>>, AppError> {
    let page = SubjectService::list(&state.db, &params, filters).await?;
    Ok(ApiResponse::page("Subjects fetched successfully", page))
}

#[utoipa::path(
    get,
    path = "/api/subjects/{key}",
    params(("key" = String, Path, description = "Subject id or code"), ViewParams),
    responses(
        (status = 200, description = "Subject", body = ApiResponse<Subject>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires subjects:read"),
        (status = 404, description = "Subject not found")
    ),
    tag = "Subjects",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, _auth_user))]
pub async fn get_subject(
    State(state): State<AppState>,
    RequireSubjectsRead(_auth_user): RequireSubjectsRead,
    Path(key): Path<String>,
    Params(view): Params<ViewParams>,
) -> Result<ApiResponse<Value>, AppError> {
    let record = SubjectService::get(&state.db, &EntityKey::parse(&key), view.populate()).await?;
    Ok(ApiResponse::ok("Subject fetched successfully", record))
}

#[utoipa::path(
    put,
    path = "/api/subjects/{key}",
    params(("key" = String, Path, description = "Subject id or code")),
    request_body = UpdateSubjectDto,
    responses(
        (status = 200, description = "Subject updated", body = ApiResponse<Subject>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires subjects:update"),
        (status = 404, description = "Subject not found"),
        (status = 409, description = "Subject with this name already exists in the class")
    ),
    tag = "Subjects",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn update_subject(
    State(state): State<AppState>,
    RequireSubjectsUpdate(auth_user): RequireSubjectsUpdate,
    Path(key): Path<String>,
    ValidatedJson(dto): ValidatedJson<UpdateSubjectDto>,
) -> Result<ApiResponse<Subject>, AppError> {
    let record =
        SubjectService::update(&state.db, &auth_user.actor(), &EntityKey::parse(&key), dto).await?;
    Ok(ApiResponse::ok("Subject updated successfully", record))
}

#[utoipa::path(
    delete,
    path = "/api/subjects/{key}",
    params(("key" = String, Path, description = "Subject id or code")),
    responses(
        (status = 200, description = "Subject deleted", body = ApiResponse<Subject>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires subjects:delete"),
        (status = 404, description = "Subject not found"),
        (status = 409, description = "Subject is still referenced")
    ),
    tag = "Subjects",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user), fields(user.id = %auth_user.user_id))]
pub async fn delete_subject(
    State(state): State<AppState>,
    RequireSubjectsDelete(auth_user): RequireSubjectsDelete,
    Path(key): Path<String>,
) -> Result<ApiResponse<Subject>, AppError> {
    let record = SubjectService::delete(&state.db, &auth_user.actor(), &EntityKey::parse(&key)).await?;
    Ok(ApiResponse::ok("Subject deleted successfully", record))
}
