use axum::extract::{Path, State};
use schoolyard_core::codes::EntityKey;
use schoolyard_core::{ApiResponse, AppError, ListParams, ViewParams};
use serde_json::Value;
use tracing::instrument;

use crate::extract::Params;
use crate::middleware::auth::{
    RequireCountriesCreate, RequireCountriesDelete, RequireCountriesRead, RequireCountriesUpdate,
};
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::model::{CreateCountryDto, Country, UpdateCountryDto};
use super::service::CountryService;

#[utoipa::path(
    post,
    path = "/api/countries",
    request_body = CreateCountryDto,
    responses(
        (status = 201, description = "Country created", body = ApiResponse<Country>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires countries:create"),
        (status = 409, description = "Country with this name or ISO code already exists")
    ),
    tag = "Countries",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn create_country(
    State(state): State<AppState>,
    RequireCountriesCreate(auth_user): RequireCountriesCreate,
    ValidatedJson(dto): ValidatedJson<CreateCountryDto>,
) -> Result<ApiResponse<Country>, AppError> {
    let record = CountryService::create(&state.db, &auth_user.actor(), dto).await?;
    Ok(ApiResponse::created("Country created successfully", record))
}

#[utoipa::path(
    get,
    path = "/api/countries",
    params(ListParams),
    responses(
        (status = 200, description = "Countries", body = ApiResponse<Vec<Country>>),
        (status = 400, description = "Invalid listing parameters"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires countries:read")
    ),
    tag = "Countries",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, _auth_user))]
pub async fn list_countries(
    State(state): State<AppState>,
    RequireCountriesRead(_auth_user): RequireCountriesRead,
    Params(params): Params<ListParams>,
) -> Result<ApiResponse<Vec<Value>>, AppError> {
    let page = CountryService::list(&state.db, &params).await?;
    Ok(ApiResponse::page("Countries fetched successfully", page))
}

#[utoipa::path(
    get,
    path = "/api/countries/{key}",
    params(("key" = String, Path, description = "Country id or code"), ViewParams),
    responses(
        (status = 200, description = "Country", body = ApiResponse<Country>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires countries:read"),
        (status = 404, description = "Country not found")
    ),
    tag = "Countries",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, _auth_user))]
pub async fn get_country(
    State(state): State<AppState>,
    RequireCountriesRead(_auth_user): RequireCountriesRead,
    Path(key): Path<String>,
    Params(view): Params<ViewParams>,
) -> Result<ApiResponse<Value>, AppError> {
    let record = CountryService::get(&state.db, &EntityKey::parse(&key), view.populate()).await?;
    Ok(ApiResponse::ok("Country fetched successfully", record))
}

#[utoipa::path(
    put,
    path = "/api/countries/{key}",
    params(("key" = String, Path, description = "Country id or code")),
    request_body = UpdateCountryDto,
    responses(
        (status = 200, description = "Country updated", body = ApiResponse<Country>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires countries:update"),
        (status = 404, description = "Country not found"),
        (status = 409, description = "Country with this name or ISO code already exists")
    ),
    tag = "Countries",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn update_country(
    State(state): State<AppState>,
    RequireCountriesUpdate(auth_user): RequireCountriesUpdate,
    Path(key): Path<String>,
    ValidatedJson(dto): ValidatedJson<UpdateCountryDto>,
) -> Result<ApiResponse<Country>, AppError> {
    let record =
        CountryService::update(&state.db, &auth_user.actor(), &EntityKey::parse(&key), dto).await?;
    Ok(ApiResponse::ok("Country updated successfully", record))
}

#[utoipa::path(
    delete,
    path = "/api/countries/{key}",
    params(("key" = String, Path, description = "Country id or code")),
    responses(
        (status = 200, description = "Country deleted", body = ApiResponse<Country>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires countries:delete"),
        (status = 404, description = "Country not found"),
        (status = 409, description = "Country is still referenced")
    ),
    tag = "Countries",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user), fields(user.id = %auth_user.user_id))]
pub async fn delete_country(
    State(state): State<AppState>,
    RequireCountriesDelete(auth_user): RequireCountriesDelete,
    Path(key): Path<String>,
) -> Result<ApiResponse<Country>, AppError> {
    let record = CountryService::delete(&state.db, &auth_user.actor(), &EntityKey::parse(&key)).await?;
    Ok(ApiResponse::ok("Country deleted successfully", record))
}
