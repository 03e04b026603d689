use axum::extract::{Path, State};
use schoolyard_core::codes::EntityKey;
use schoolyard_core::{ApiResponse, AppError, ListParams, ViewParams};
use serde_json::Value;
use tracing::instrument;

use crate::extract::Params;
use crate::middleware::auth::{
    RequireSectionsCreate, RequireSectionsDelete, RequireSectionsRead, RequireSectionsUpdate,
};
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::model::{CreateSectionDto, Section, SectionFilterParams, UpdateSectionDto};
use super::service::SectionService;

#[utoipa::path(
    post,
    path = "/api/sections",
    request_body = CreateSectionDto,
    responses(
        (status = 201, description = "Section created", body = ApiResponse<Section>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires sections:create"),
        (status = 409, description = "Section with this name already exists in the class")
    ),
    tag = "Sections",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn create_section(
    State(state): State<AppState>,
    RequireSectionsCreate(auth_user): RequireSectionsCreate,
    ValidatedJson(dto): ValidatedJson<CreateSectionDto>,
) -> Result<ApiResponse<Section>, AppError> {
    let record = SectionService::create(&state.db, &auth_user.actor(), dto).await?;
    Ok(ApiResponse::created("Section created successfully", record))
}

#[utoipa::path(
    get,
    path = "/api/sections",
    params(ListParams, SectionFilterParams),
    responses(
        (status = 200, description = "Sections", body = ApiResponse<Vec<Section>>),
        (status = 400, description = "Invalid listing parameters"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires sections:read")
    ),
    tag = "Sections",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, _auth_user))]
pub async fn list_sections(
    State(state): State<AppState>,
    RequireSectionsRead(_auth_user): RequireSectionsRead,
    Params(params): Params<ListParams>,
    Params(filters): Params<SectionFilterParams>,
) -> Result<ApiResponse<Vec<Value>>, AppError> {
    let page = SectionService::list(&state.db, &params, filters).await?;
    Ok(ApiResponse::page("Sections fetched successfully", page))
}

#[utoipa::path(
    get,
    path = "/api/sections/{key}",
    params(("key" = String, Path, description = "Section id or code"), ViewParams),
    responses(
        (status = 200, description = "Section", body = ApiResponse<Section>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires sections:read"),
        (status = 404, description = "Section not found")
    ),
    tag = "Sections",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, _auth_user))]
pub async fn get_section(
    State(state): State<AppState>,
    RequireSectionsRead(_auth_user): RequireSectionsRead,
    Path(key): Path<String>,
    Params(view): Params<ViewParams>,
) -> Result<ApiResponse<Value>, AppError> {
    let record = SectionService::get(&state.db, &EntityKey::parse(&key), view.populate()).await?;
    Ok(ApiResponse::ok("Section fetched successfully", record))
}

#[utoipa::path(
    put,
    path = "/api/sections/{key}",
    params(("key" = String, Path, description = "Section id or code")),
    request_body = UpdateSectionDto,
    responses(
        (status = 200, description = "Section updated", body = ApiResponse<Section>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires sections:update"),
        (status = 404, description = "Section not found"),
        (status = 409, description = "Section with this name already exists in the class")
    ),
    tag = "Sections",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn update_section(
    State(state): State<AppState>,
    RequireSectionsUpdate(auth_user): RequireSectionsUpdate,
    Path(key): Path<String>,
    ValidatedJson(dto): ValidatedJson<UpdateSectionDto>,
) -> Result<ApiResponse<Section>, AppError> {
    let record =
        SectionService::update(&state.db, &auth_user.actor(), &EntityKey::parse(&key), dto).await?;
    Ok(ApiResponse::ok("Section updated successfully", record))
}

#[utoipa::path(
    delete,
    path = "/api/sections/{key}",
    params(("key" = String, Path, description = "Section id or code")),
    responses(
        (status = 200, description = "Section deleted", body = ApiResponse<Section>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires sections:delete"),
        (status = 404, description = "Section not found"),
        (status = 409, description = "Section is still referenced")
    ),
    tag = "Sections",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user), fields(user.id = %auth_user.user_id))]
pub async fn delete_section(
    State(state): State<AppState>,
    RequireSectionsDelete(auth_user): RequireSectionsDelete,
    Path(key): Path<String>,
) -> Result<ApiResponse<Section>, AppError> {
    let record = SectionService::delete(&state.db, &auth_user.actor(), &EntityKey::parse(&key)).await?;
    Ok(ApiResponse::ok("Section deleted successfully", record))
}
