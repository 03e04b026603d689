use axum::extract::{Path, State};
use schoolyard_core::codes::EntityKey;
use schoolyard_core::{ApiResponse, AppError, ListParams, ViewParams};
use serde_json::Value;
use tracing::instrument;

use crate::extract::Params;
use crate::middleware::auth::{
    RequireCitiesCreate, RequireCitiesDelete, RequireCitiesRead, RequireCitiesUpdate,
};
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::model::{CreateCityDto, City, CityFilterParams, UpdateCityDto};
use super::service::CityService;

#[utoipa::path(
    post,
    path = "/api/cities",
    request_body = CreateCityDto,
    responses(
        (status = 201, description = "City created", body = ApiResponse<City>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires cities:create"),
        (status = 409, description = "City with this name already exists in the state")
    ),
    tag = "Cities",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn create_city(
    State(state): State<AppState>,
    RequireCitiesCreate(auth_user): RequireCitiesCreate,
    ValidatedJson(dto): ValidatedJson<CreateCityDto>,
) -> Result<ApiResponse<City>, AppError> {
    let record = CityService::create(&state.db, &auth_user.actor(), dto).await?;
    Ok(ApiResponse::created("City created successfully", record))
}

#[utoipa::path(
    get,
    path = "/api/cities",
    params(ListParams, CityFilterParams),
    responses(
        (status = 200, description = "Cities", body = ApiResponse<Vec<City>>),
        (status = 400, description = "Invalid listing parameters"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires cities:read")
    ),
    tag = "Cities",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, _auth_user))]
pub async fn list_cities(
    State(state): State<AppState>,
    RequireCitiesRead(_auth_user): RequireCitiesRead,
    Params(params): Params<ListParams>,
    Params(filters): Params<CityFilterParams>,
) -> Result<ApiResponse<Vec<Value>>, AppError> {
    let page = CityService::list(&state.db, &params, filters).await?;
    Ok(ApiResponse::page("Cities fetched successfully", page))
}

#[utoipa::path(
    get,
    path = "/api/cities/{key}",
    params(("key" = String, Path, description = "City id or code"), ViewParams),
    responses(
        (status = 200, description = "City", body = ApiResponse<City>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires cities:read"),
        (status = 404, description = "City not found")
    ),
    tag = "Cities",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, _auth_user))]
pub async fn get_city(
    State(state): State<AppState>,
    RequireCitiesRead(_auth_user): RequireCitiesRead,
    Path(key): Path<String>,
    Params(view): Params<ViewParams>,
) -> Result<ApiResponse<Value>, AppError> {
    let record = CityService::get(&state.db, &EntityKey::parse(&key), view.populate()).await?;
    Ok(ApiResponse::ok("City fetched successfully", record))
}

#[utoipa::path(
    put,
    path = "/api/cities/{key}",
    params(("key" = String, Path, description = "City id or code")),
    request_body = UpdateCityDto,
    responses(
        (status = 200, description = "City updated", body = ApiResponse<City>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires cities:update"),
        (status = 404, description = "City not found"),
        (status = 409, description = "City with this name already exists in the state")
    ),
    tag = "Cities",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn update_city(
    State(state): State<AppState>,
    RequireCitiesUpdate(auth_user): RequireCitiesUpdate,
    Path(key): Path<String>,
    ValidatedJson(dto): ValidatedJson<UpdateCityDto>,
) -> Result<ApiResponse<City>, AppError> {
    let record =
        CityService::update(&state.db, &auth_user.actor(), &EntityKey::parse(&key), dto).await?;
    Ok(ApiResponse::ok("City updated successfully", record))
}

#[utoipa::path(
    delete,
    path = "/api/cities/{key}",
    params(("key" = String, Path, description = "City id or code")),
    responses(
        (status = 200, description = "City deleted", body = ApiResponse<City>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires cities:delete"),
        (status = 404, description = "City not found"),
        (status = 409, description = "City is still referenced")
    ),
    tag = "Cities",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user), fields(user.id = %auth_user.user_id))]
pub async fn delete_city(
    State(state): State<AppState>,
    RequireCitiesDelete(auth_user): RequireCitiesDelete,
    Path(key): Path<String>,
) -> Result<ApiResponse<City>, AppError> {
    let record = CityService::delete(&state.db, &auth_user.actor(), &EntityKey::parse(&key)).await?;
    Ok(ApiResponse::ok("City deleted successfully", record))
}
