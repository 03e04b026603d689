use axum::extract::{Path, State};
use schoolyard_core::codes::EntityKey;
use schoolyard_core::{ApiResponse, AppError, ListParams, ViewParams};
use serde_json::Value;
use tracing::instrument;

use crate::extract::Params;
use crate::middleware::auth::{
    RequirePermissionsCreate, RequirePermissionsDelete, RequirePermissionsRead, RequirePermissionsUpdate,
};
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::model::{CreatePermissionDto, Permission, PermissionFilterParams, UpdatePermissionDto};
use super::service::PermissionService;

#[utoipa::path(
    post,
    path = "/api/permissions",
    request_body = CreatePermissionDto,
    responses(
        (status = 201, description = "Permission created", body = ApiResponse<Permission>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires permissions:create"),
        (status = 409, description = "Permission with this name already exists")
    ),
    tag = "Permissions",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn create_permission(
    State(state): State<AppState>,
    RequirePermissionsCreate(auth_user): RequirePermissionsCreate,
    ValidatedJson(dto): ValidatedJson<CreatePermissionDto>,
) -> Result<ApiResponse<Permission>, AppError> {
    let record = PermissionService::create(&state.db, &auth_user.actor(), dto).await?;
    Ok(ApiResponse::created("Permission created successfully", record))
}

#[utoipa::path(
    get,
    path = "/api/permissions",
    params(ListParams, PermissionFilterParams),
    responses(
        (status = 200, description = "Permissions", body = ApiResponse<Vec<Permission>>),
        (status = 400, description = "Invalid listing parameters"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires permissions:read")
    ),
    tag = "Permissions",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, _auth_user))]
pub async fn list_permissions(
    State(state): State<AppState>,
    RequirePermissionsRead(_auth_user): RequirePermissionsRead,
    Params(params): Params<ListParams>,
    Params(filters): Params<PermissionFilterParams>,
) -> Result<ApiResponse<Vec<Value>>, AppError> {
    let page = PermissionService::list(&state.db, &params, filters).await?;
    Ok(ApiResponse::page("Permissions fetched successfully", page))
}

#[utoipa::path(
    get,
    path = "/api/permissions/{key}",
    params(("key" = String, Path, description = "Permission id or code"), ViewParams),
    responses(
        (status = 200, description = "Permission", body = ApiResponse<Permission>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires permissions:read"),
        (status = 404, description = "Permission not found")
    ),
    tag = "Permissions",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, _auth_user))]
pub async fn get_permission(
    State(state): State<AppState>,
    RequirePermissionsRead(_auth_user): RequirePermissionsRead,
    Path(key): Path<String>,
    Params(view): Params<ViewParams>,
) -> Result<ApiResponse<Value>, AppError> {
    let record = PermissionService::get(&state.db, &EntityKey::parse(&key), view.populate()).await?;
    Ok(ApiResponse::ok("Permission fetched successfully", record))
}

#[utoipa::path(
    put,
    path = "/api/permissions/{key}",
    params(("key" = String, Path, description = "Permission id or code")),
    request_body = UpdatePermissionDto,
    responses(
        (status = 200, description = "Permission updated", body = ApiResponse<Permission>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires permissions:update"),
        (status = 404, description = "Permission not found"),
        (status = 409, description = "Permission with this name already exists")
    ),
    tag = "Permissions",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn update_permission(
    State(state): State<AppState>,
    RequirePermissionsUpdate(auth_user): RequirePermissionsUpdate,
    Path(key): Path<String>,
    ValidatedJson(dto): ValidatedJson<UpdatePermissionDto>,
) -> Result<ApiResponse<Permission>, AppError> {
    let record =
        PermissionService::update(&state.db, &auth_user.actor(), &EntityKey::parse(&key), dto).await?;
    Ok(ApiResponse::ok("Permission updated successfully", record))
}

#[utoipa::path(
    delete,
    path = "/api/permissions/{key}",
    params(("key" = String, Path, description = "Permission id or code")),
    responses(
        (status = 200, description = "Permission deleted", body = ApiResponse<Permission>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires permissions:delete"),
        (status = 404, description = "Permission not found"),
        (status = 409, description = "Permission is still referenced")
    ),
    tag = "Permissions",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user), fields(user.id = %auth_user.user_id))]
pub async fn delete_permission(
    State(state): State<AppState>,
    RequirePermissionsDelete(auth_user): RequirePermissionsDelete,
    Path(key): Path<String>,
) -> Result<ApiResponse<Permission>, AppError> {
    let record = PermissionService::delete(&state.db, &auth_user.actor(), &EntityKey::parse(&key)).await?;
    Ok(ApiResponse::ok("Permission deleted successfully", record))
}
