use axum::extract::{Multipart, Path, State};
use schoolyard_core::codes::EntityKey;
use schoolyard_core::{ApiResponse, AppError, ListParams, ViewParams};
use serde_json::Value;
use tracing::instrument;

use crate::extract::Params;
use crate::middleware::auth::{
    AuthUser, RequireProfilesCreate, RequireProfilesDelete, RequireProfilesRead,
    RequireProfilesUpdate,
};
use crate::modules::uploads::model::ImageUploadForm;
use crate::modules::uploads::service::read_image;
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::model::{CreateProfileDto, Profile, ProfileFilterParams, UpdateProfileDto};
use super::service::ProfileService;

#[utoipa::path(
    post,
    path = "/api/profiles",
    request_body = CreateProfileDto,
    responses(
        (status = 201, description = "Profile created", body = ApiResponse<Profile>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires profiles:create"),
        (status = 409, description = "User already has a profile")
    ),
    tag = "Profiles",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn create_profile(
    State(state): State<AppState>,
    RequireProfilesCreate(auth_user): RequireProfilesCreate,
    ValidatedJson(dto): ValidatedJson<CreateProfileDto>,
) -> Result<ApiResponse<Profile>, AppError> {
    let record = ProfileService::create(&state.db, &auth_user.actor(), dto).await?;
    Ok(ApiResponse::created("Profile created successfully", record))
}

#[utoipa::path(
    get,
    path = "/api/profiles",
    params(ListParams, ProfileFilterParams),
    responses(
        (status = 200, description = "Profiles", body = ApiResponse<Vec<Profile>>),
        (status = 400, description = "Invalid listing parameters"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires profiles:read")
    ),
    tag = "Profiles",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, _auth_user))]
pub async fn list_profiles(
    State(state): State<AppState>,
    RequireProfilesRead(_auth_user): RequireProfilesRead,
    Params(params): Params<ListParams>,
    Params(filters): Params<ProfileFilterParams>,
) -> Result<ApiResponse<Vec<Value>>, AppError> {
    let page = ProfileService::list(&state.db, &params, filters).await?;
    Ok(ApiResponse::page("Profiles fetched successfully", page))
}

#[utoipa::path(
    get,
    path = "/api/profiles/{key}",
    params(("key" = String, Path, description = "Profile id or code"), ViewParams),
    responses(
        (status = 200, description = "Profile", body = ApiResponse<Profile>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires profiles:read"),
        (status = 404, description = "Profile not found")
    ),
    tag = "Profiles",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, _auth_user))]
pub async fn get_profile(
    State(state): State<AppState>,
    RequireProfilesRead(_auth_user): RequireProfilesRead,
    Path(key): Path<String>,
    Params(view): Params<ViewParams>,
) -> Result<ApiResponse<Value>, AppError> {
    let record = ProfileService::get(&state.db, &EntityKey::parse(&key), view.populate()).await?;
    Ok(ApiResponse::ok("Profile fetched successfully", record))
}

#[utoipa::path(
    put,
    path = "/api/profiles/{key}",
    params(("key" = String, Path, description = "Profile id or code")),
    request_body = UpdateProfileDto,
    responses(
        (status = 200, description = "Profile updated", body = ApiResponse<Profile>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires profiles:update"),
        (status = 404, description = "Profile not found"),
        (status = 409, description = "User already has a profile")
    ),
    tag = "Profiles",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn update_profile(
    State(state): State<AppState>,
    RequireProfilesUpdate(auth_user): RequireProfilesUpdate,
    Path(key): Path<String>,
    ValidatedJson(dto): ValidatedJson<UpdateProfileDto>,
) -> Result<ApiResponse<Profile>, AppError> {
    let record =
        ProfileService::update(&state.db, &auth_user.actor(), &EntityKey::parse(&key), dto).await?;
    Ok(ApiResponse::ok("Profile updated successfully", record))
}

#[utoipa::path(
    delete,
    path = "/api/profiles/{key}",
    params(("key" = String, Path, description = "Profile id or code")),
    responses(
        (status = 200, description = "Profile deleted", body = ApiResponse<Profile>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires profiles:delete"),
        (status = 404, description = "Profile not found"),
        (status = 409, description = "Profile is still referenced")
    ),
    tag = "Profiles",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user), fields(user.id = %auth_user.user_id))]
pub async fn delete_profile(
    State(state): State<AppState>,
    RequireProfilesDelete(auth_user): RequireProfilesDelete,
    Path(key): Path<String>,
) -> Result<ApiResponse<Profile>, AppError> {
    let record = ProfileService::delete(
        &state.db,
        state.media.as_ref(),
        &auth_user.actor(),
        &EntityKey::parse(&key),
    )
    .await?;
    Ok(ApiResponse::ok("Profile deleted successfully", record))
}

#[utoipa::path(
    get,
    path = "/api/profiles/me",
    params(ViewParams),
    responses(
        (status = 200, description = "The signed-in user's profile", body = ApiResponse<Profile>),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "You do not have a profile yet")
    ),
    tag = "Profiles",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user), fields(user.id = %auth_user.user_id))]
pub async fn get_my_profile(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Params(view): Params<ViewParams>,
) -> Result<ApiResponse<Value>, AppError> {
    let profile =
        ProfileService::get_for_user(&state.db, auth_user.user_id, view.populate()).await?;
    Ok(ApiResponse::ok("Profile fetched successfully", profile))
}

#[utoipa::path(
    put,
    path = "/api/profiles/me",
    request_body = UpdateProfileDto,
    responses(
        (status = 200, description = "Profile updated", body = ApiResponse<Profile>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "You do not have a profile yet")
    ),
    tag = "Profiles",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn update_my_profile(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ValidatedJson(dto): ValidatedJson<UpdateProfileDto>,
) -> Result<ApiResponse<Profile>, AppError> {
    let profile =
        ProfileService::update_for_user(&state.db, &auth_user.actor(), auth_user.user_id, dto)
            .await?;
    Ok(ApiResponse::ok("Profile updated successfully", profile))
}

#[utoipa::path(
    post,
    path = "/api/profiles/{key}/avatar",
    params(("key" = String, Path, description = "Profile id or code")),
    request_body(content = ImageUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Avatar replaced", body = ApiResponse<Profile>),
        (status = 400, description = "Missing file, empty file or unsupported type"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires profiles:update"),
        (status = 404, description = "Profile not found"),
        (status = 413, description = "File too large"),
        (status = 502, description = "Media host failure")
    ),
    tag = "Profiles",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, multipart), fields(user.id = %auth_user.user_id))]
pub async fn upload_profile_avatar(
    State(state): State<AppState>,
    RequireProfilesUpdate(auth_user): RequireProfilesUpdate,
    Path(key): Path<String>,
    multipart: Multipart,
) -> Result<ApiResponse<Profile>, AppError> {
    let image = read_image(multipart).await?;
    let folder = format!("{}/avatars", state.media_config.folder);
    let profile = ProfileService::set_avatar(
        &state.db,
        state.media.as_ref(),
        &folder,
        &auth_user.actor(),
        &EntityKey::parse(&key),
        image,
    )
    .await?;
    Ok(ApiResponse::ok("Avatar updated successfully", profile))
}
