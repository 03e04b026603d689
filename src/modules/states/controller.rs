use axum::extract::{self, Path};
use schoolyard_core::codes::EntityKey;
use schoolyard_core::{ApiResponse, AppError, ListParams, ViewParams};
use serde_json::Value;
use tracing::instrument;

use crate::extract::Params;
use crate::middleware::auth::{
    RequireStatesCreate, RequireStatesDelete, RequireStatesRead, RequireStatesUpdate,
};
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::model::{CreateStateDto, State, StateFilterParams, UpdateStateDto};
use super::service::StateService;

// `State` is the model here, so the axum extractor is spelled out.

#[utoipa::path(
    post,
    path = "/api/states",
    request_body = CreateStateDto,
    responses(
        (status = 201, description = "State created", body = ApiResponse<State>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires states:create"),
        (status = 409, description = "State with this name already exists in the country")
    ),
    tag = "States",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn create_state(
    extract::State(state): extract::State<AppState>,
    RequireStatesCreate(auth_user): RequireStatesCreate,
    ValidatedJson(dto): ValidatedJson<CreateStateDto>,
) -> Result<ApiResponse<State>, AppError> {
    let record = StateService::create(&state.db, &auth_user.actor(), dto).await?;
    Ok(ApiResponse::created("State created successfully", record))
}

#[utoipa::path(
    get,
    path = "/api/states",
    params(ListParams, StateFilterParams),
    responses(
        (status = 200, description = "States", body = ApiResponse<Vec<State>>),
        (status = 400, description = "Invalid listing parameters"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires states:read")
    ),
    tag = "States",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, _auth_user))]
pub async fn list_states(
    extract::State(state): extract::State<AppState>,
    RequireStatesRead(_auth_user): RequireStatesRead,
    Params(params): Params<ListParams>,
    Params(filters): Params<StateFilterParams>,
) -> Result<ApiResponse<Vec<Value>>, AppError> {
    let page = StateService::list(&state.db, &params, filters).await?;
    Ok(ApiResponse::page("States fetched successfully", page))
}

#[utoipa::path(
    get,
    path = "/api/states/{key}",
    params(("key" = String, Path, description = "State id or code"), ViewParams),
    responses(
        (status = 200, description = "State", body = ApiResponse<State>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires states:read"),
        (status = 404, description = "State not found")
    ),
    tag = "States",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, _auth_user))]
pub async fn get_state(
    extract::State(state): extract::State<AppState>,
    RequireStatesRead(_auth_user): RequireStatesRead,
    Path(key): Path<String>,
    Params(view): Params<ViewParams>,
) -> Result<ApiResponse<Value>, AppError> {
    let record = StateService::get(&state.db, &EntityKey::parse(&key), view.populate()).await?;
    Ok(ApiResponse::ok("State fetched successfully", record))
}

#[utoipa::path(
    put,
    path = "/api/states/{key}",
    params(("key" = String, Path, description = "State id or code")),
    request_body = UpdateStateDto,
    responses(
        (status = 200, description = "State updated", body = ApiResponse<State>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires states:update"),
        (status = 404, description = "State not found"),
        (status = 409, description = "State with this name already exists in the country")
    ),
    tag = "States",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn update_state(
    extract::State(state): extract::State<AppState>,
    RequireStatesUpdate(auth_user): RequireStatesUpdate,
    Path(key): Path<String>,
    ValidatedJson(dto): ValidatedJson<UpdateStateDto>,
) -> Result<ApiResponse<State>, AppError> {
    let record =
        StateService::update(&state.db, &auth_user.actor(), &EntityKey::parse(&key), dto).await?;
    Ok(ApiResponse::ok("State updated successfully", record))
}

#[utoipa::path(
    delete,
    path = "/api/states/{key}",
    params(("key" = String, Path, description = "State id or code")),
    responses(
        (status = 200, description = "State deleted", body = ApiResponse<State>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires states:delete"),
        (status = 404, description = "State not found"),
        (status = 409, description = "State is still referenced")
    ),
    tag = "States",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user), fields(user.id = %auth_user.user_id))]
pub async fn delete_state(
    extract::State(state): extract::State<AppState>,
    RequireStatesDelete(auth_user): RequireStatesDelete,
    Path(key): Path<String>,
) -> Result<ApiResponse<State>, AppError> {
    let record = StateService::delete(&state.db, &auth_user.actor(), &EntityKey::parse(&key)).await?;
    Ok(ApiResponse::ok("State deleted successfully", record))
}
