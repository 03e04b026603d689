use axum::extract::{Path, State};
use schoolyard_core::codes::EntityKey;
use schoolyard_core::{ApiResponse, AppError, ListParams, ViewParams};
use serde_json::Value;
use tracing::instrument;

use crate::extract::Params;
use crate::middleware::auth::{
    RequireUsersCreate, RequireUsersDelete, RequireUsersRead, RequireUsersUpdate,
};
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::model::{CreateUserDto, ResetPasswordDto, UpdateUserDto, User, UserFilterParams};
use super::service::UserService;

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserDto,
    responses(
        (status = 201, description = "User created", body = ApiResponse<User>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires users:create"),
        (status = 409, description = "Username or email already in use")
    ),
    tag = "Users",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn create_user(
    State(state): State<AppState>,
    RequireUsersCreate(auth_user): RequireUsersCreate,
    ValidatedJson(dto): ValidatedJson<CreateUserDto>,
) -> Result<ApiResponse<User>, AppError> {
    let record = UserService::create(&state.db, &auth_user.actor(), dto).await?;
    Ok(ApiResponse::created("User created successfully", record))
}

#[utoipa::path(
    get,
    path = "/api/users",
    params(ListParams, UserFilterParams),
    responses(
        (status = 200, description = "Users", body = ApiResponse<Vec<User>>),
        (status = 400, description = "Invalid listing parameters"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires users:read")
    ),
    tag = "Users",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, _auth_user))]
pub async fn list_users(
    State(state): State<AppState>,
    RequireUsersRead(_auth_user): RequireUsersRead,
    Params(params): Params<ListParams>,
    Params(filters): Params<UserFilterParams>,
) -> Result<ApiResponse<Vec<Value>>, AppError> {
    let page = UserService::list(&state.db, &params, filters).await?;
    Ok(ApiResponse::page("Users fetched successfully", page))
}

#[utoipa::path(
    get,
    path = "/api/users/{key}",
    params(("key" = String, Path, description = "User id or code"), ViewParams),
    responses(
        (status = 200, description = "User", body = ApiResponse<User>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires users:read"),
        (status = 404, description = "User not found")
    ),
    tag = "Users",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, _auth_user))]
pub async fn get_user(
    State(state): State<AppState>,
    RequireUsersRead(_auth_user): RequireUsersRead,
    Path(key): Path<String>,
    Params(view): Params<ViewParams>,
) -> Result<ApiResponse<Value>, AppError> {
    let record = UserService::get(&state.db, &EntityKey::parse(&key), view.populate()).await?;
    Ok(ApiResponse::ok("User fetched successfully", record))
}

#[utoipa::path(
    put,
    path = "/api/users/{key}",
    params(("key" = String, Path, description = "User id or code")),
    request_body = UpdateUserDto,
    responses(
        (status = 200, description = "User updated", body = ApiResponse<User>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires users:update"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Username or email already in use")
    ),
    tag = "Users",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn update_user(
    State(state): State<AppState>,
    RequireUsersUpdate(auth_user): RequireUsersUpdate,
    Path(key): Path<String>,
    ValidatedJson(dto): ValidatedJson<UpdateUserDto>,
) -> Result<ApiResponse<User>, AppError> {
    let record =
        UserService::update(&state.db, &auth_user.actor(), &EntityKey::parse(&key), dto).await?;
    Ok(ApiResponse::ok("User updated successfully", record))
}

#[utoipa::path(
    delete,
    path = "/api/users/{key}",
    params(("key" = String, Path, description = "User id or code")),
    responses(
        (status = 200, description = "User deleted", body = ApiResponse<User>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires users:delete"),
        (status = 404, description = "User not found"),
        (status = 409, description = "User is still referenced")
    ),
    tag = "Users",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user), fields(user.id = %auth_user.user_id))]
pub async fn delete_user(
    State(state): State<AppState>,
    RequireUsersDelete(auth_user): RequireUsersDelete,
    Path(key): Path<String>,
) -> Result<ApiResponse<User>, AppError> {
    let record = UserService::delete(&state.db, &auth_user.actor(), &EntityKey::parse(&key)).await?;
    Ok(ApiResponse::ok("User deleted successfully", record))
}

#[utoipa::path(
    put,
    path = "/api/users/{key}/password",
    params(("key" = String, Path, description = "User id or code")),
    request_body = ResetPasswordDto,
    responses(
        (status = 200, description = "Password reset; the user's sessions are revoked", body = ApiResponse<User>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires users:update"),
        (status = 404, description = "User not found")
    ),
    tag = "Users",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn reset_user_password(
    State(state): State<AppState>,
    RequireUsersUpdate(auth_user): RequireUsersUpdate,
    Path(key): Path<String>,
    ValidatedJson(dto): ValidatedJson<ResetPasswordDto>,
) -> Result<ApiResponse<User>, AppError> {
    let user =
        UserService::reset_password(&state.db, &auth_user.actor(), &EntityKey::parse(&key), dto)
            .await?;
    Ok(ApiResponse::ok("Password reset successfully", user))
}
