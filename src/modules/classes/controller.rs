use axum::extract::{Path, State};
use schoolyard_core::codes::EntityKey;
use schoolyard_core::{ApiResponse, AppError, ListParams, ViewParams};
use serde_json::Value;
use tracing::instrument;

use crate::extract::Params;
use crate::middleware::auth::{
    RequireClassesCreate, RequireClassesDelete, RequireClassesRead, RequireClassesUpdate,
};
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::model::{Class, CreateClassDto, UpdateClassDto};
use super::service::ClassService;

#[utoipa::path(
    post,
    path = "/api/classes",
    request_body = CreateClassDto,
    responses(
        (status = 201, description = "Class created", body = ApiResponse<Class>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires classes:create"),
        (status = 409, description = "Class with this name already exists")
    ),
    tag = "Classes",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn create_class(
    State(state): State<AppState>,
    RequireClassesCreate(auth_user): RequireClassesCreate,
    ValidatedJson(dto): ValidatedJson<CreateClassDto>,
) -> Result<ApiResponse<Class>, AppError> {
    let class = ClassService::create(&state.db, &auth_user.actor(), dto).await?;
    Ok(ApiResponse::created("Class created successfully", class))
}

#[utoipa::path(
    get,
    path = "/api/classes",
    params(ListParams),
    responses(
        (status = 200, description = "Classes", body = ApiResponse<Vec<Class>>),
        (status = 400, description = "Invalid listing parameters"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires classes:read")
    ),
    tag = "Classes",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, _auth_user))]
pub async fn list_classes(
    State(state): State<AppState>,
    RequireClassesRead(_auth_user): RequireClassesRead,
    Params(params): Params<ListParams>,
) -> Result<ApiResponse<Vec<Value>>, AppError> {
    let page = ClassService::list(&state.db, &params).await?;
    Ok(ApiResponse::page("Classes fetched successfully", page))
}

#[utoipa::path(
    get,
    path = "/api/classes/{key}",
    params(("key" = String, Path, description = "Class id or code"), ViewParams),
    responses(
        (status = 200, description = "Class", body = ApiResponse<Class>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires classes:read"),
        (status = 404, description = "Class not found")
    ),
    tag = "Classes",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, _auth_user))]
pub async fn get_class(
    State(state): State<AppState>,
    RequireClassesRead(_auth_user): RequireClassesRead,
    Path(key): Path<String>,
    Params(view): Params<ViewParams>,
) -> Result<ApiResponse<Value>, AppError> {
    let class = ClassService::get(&state.db, &EntityKey::parse(&key), view.populate()).await?;
    Ok(ApiResponse::ok("Class fetched successfully", class))
}

#[utoipa::path(
    put,
    path = "/api/classes/{key}",
    params(("key" = String, Path, description = "Class id or code")),
    request_body = UpdateClassDto,
    responses(
        (status = 200, description = "Class updated", body = ApiResponse<Class>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires classes:update"),
        (status = 404, description = "Class not found"),
        (status = 409, description = "Class with this name already exists")
    ),
    tag = "Classes",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn update_class(
    State(state): State<AppState>,
    RequireClassesUpdate(auth_user): RequireClassesUpdate,
    Path(key): Path<String>,
    ValidatedJson(dto): ValidatedJson<UpdateClassDto>,
) -> Result<ApiResponse<Class>, AppError> {
    let class =
        ClassService::update(&state.db, &auth_user.actor(), &EntityKey::parse(&key), dto).await?;
    Ok(ApiResponse::ok("Class updated successfully", class))
}

#[utoipa::path(
    delete,
    path = "/api/classes/{key}",
    params(("key" = String, Path, description = "Class id or code")),
    responses(
        (status = 200, description = "Class deleted", body = ApiResponse<Class>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires classes:delete"),
        (status = 404, description = "Class not found"),
        (status = 409, description = "Class is still referenced")
    ),
    tag = "Classes",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user), fields(user.id = %auth_user.user_id))]
pub async fn delete_class(
    State(state): State<AppState>,
    RequireClassesDelete(auth_user): RequireClassesDelete,
    Path(key): Path<String>,
) -> Result<ApiResponse<Class>, AppError> {
    let class = ClassService::delete(&state.db, &auth_user.actor(), &EntityKey::parse(&key)).await?;
    Ok(ApiResponse::ok("Class deleted successfully", class))
}
