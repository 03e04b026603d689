use axum::extract::{Path, State};
use schoolyard_core::codes::EntityKey;
use schoolyard_core::{ApiResponse, AppError, ListParams, ViewParams};
use serde_json::Value;
use tracing::instrument;

use crate::extract::Params;
use crate::middleware::auth::{
    RequireRolesCreate, RequireRolesDelete, RequireRolesRead, RequireRolesUpdate,
};
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::model::{
    CreateRoleDto, Role, RoleWithPermissions, SetRolePermissionsDto, UpdateRoleDto,
};
use super::service::RoleService;

#[utoipa::path(
    post,
    path = "/api/roles",
    request_body = CreateRoleDto,
    responses(
        (status = 201, description = "Role created", body = ApiResponse<RoleWithPermissions>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires roles:create"),
        (status = 409, description = "Role with this name already exists")
    ),
    tag = "Roles",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn create_role(
    State(state): State<AppState>,
    RequireRolesCreate(auth_user): RequireRolesCreate,
    ValidatedJson(dto): ValidatedJson<CreateRoleDto>,
) -> Result<ApiResponse<RoleWithPermissions>, AppError> {
    let record = RoleService::create(&state.db, &auth_user.actor(), dto).await?;
    Ok(ApiResponse::created("Role created successfully", record))
}

#[utoipa::path(
    get,
    path = "/api/roles",
    params(ListParams),
    responses(
        (status = 200, description = "Roles", body = ApiResponse<Vec<Role>>),
        (status = 400, description = "Invalid listing parameters"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires roles:read")
    ),
    tag = "Roles",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, _auth_user))]
pub async fn list_roles(
    State(state): State<AppState>,
    RequireRolesRead(_auth_user): RequireRolesRead,
    Params(params): Params<ListParams>,
) -> Result<ApiResponse<Vec<Value>>, AppError> {
    let page = RoleService::list(&state.db, &params).await?;
    Ok(ApiResponse::page("Roles fetched successfully", page))
}

#[utoipa::path(
    get,
    path = "/api/roles/{key}",
    params(("key" = String, Path, description = "Role id or code"), ViewParams),
    responses(
        (status = 200, description = "Role", body = ApiResponse<RoleWithPermissions>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires roles:read"),
        (status = 404, description = "Role not found")
    ),
    tag = "Roles",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, _auth_user))]
pub async fn get_role(
    State(state): State<AppState>,
    RequireRolesRead(_auth_user): RequireRolesRead,
    Path(key): Path<String>,
    Params(view): Params<ViewParams>,
) -> Result<ApiResponse<Value>, AppError> {
    let record = RoleService::get(&state.db, &EntityKey::parse(&key), view.populate()).await?;
    Ok(ApiResponse::ok("Role fetched successfully", record))
}

#[utoipa::path(
    put,
    path = "/api/roles/{key}",
    params(("key" = String, Path, description = "Role id or code")),
    request_body = UpdateRoleDto,
    responses(
        (status = 200, description = "Role updated", body = ApiResponse<RoleWithPermissions>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires roles:update"),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Role with this name already exists")
    ),
    tag = "Roles",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn update_role(
    State(state): State<AppState>,
    RequireRolesUpdate(auth_user): RequireRolesUpdate,
    Path(key): Path<String>,
    ValidatedJson(dto): ValidatedJson<UpdateRoleDto>,
) -> Result<ApiResponse<RoleWithPermissions>, AppError> {
    let record =
        RoleService::update(&state.db, &auth_user.actor(), &EntityKey::parse(&key), dto).await?;
    Ok(ApiResponse::ok("Role updated successfully", record))
}

#[utoipa::path(
    delete,
    path = "/api/roles/{key}",
    params(("key" = String, Path, description = "Role id or code")),
    responses(
        (status = 200, description = "Role deleted", body = ApiResponse<RoleWithPermissions>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires roles:delete"),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Role is still referenced")
    ),
    tag = "Roles",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user), fields(user.id = %auth_user.user_id))]
pub async fn delete_role(
    State(state): State<AppState>,
    RequireRolesDelete(auth_user): RequireRolesDelete,
    Path(key): Path<String>,
) -> Result<ApiResponse<RoleWithPermissions>, AppError> {
    let record = RoleService::delete(&state.db, &auth_user.actor(), &EntityKey::parse(&key)).await?;
    Ok(ApiResponse::ok("Role deleted successfully", record))
}

#[utoipa::path(
    put,
    path = "/api/roles/{key}/permissions",
    params(("key" = String, Path, description = "Role id or code")),
    request_body = SetRolePermissionsDto,
    responses(
        (status = 200, description = "Role permissions replaced", body = ApiResponse<RoleWithPermissions>),
        (status = 400, description = "One or more permission IDs are invalid"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires roles:update"),
        (status = 404, description = "Role not found")
    ),
    tag = "Roles",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn set_role_permissions(
    State(state): State<AppState>,
    RequireRolesUpdate(auth_user): RequireRolesUpdate,
    Path(key): Path<String>,
    ValidatedJson(dto): ValidatedJson<SetRolePermissionsDto>,
) -> Result<ApiResponse<RoleWithPermissions>, AppError> {
    let role =
        RoleService::set_permissions(&state.db, &auth_user.actor(), &EntityKey::parse(&key), dto)
            .await?;
    Ok(ApiResponse::ok("Role permissions updated successfully", role))
}
