use axum::extract::{Multipart, State};
use schoolyard_core::{ApiResponse, AppError, StoredMedia};
use tracing::instrument;

use crate::middleware::auth::RequireUploadsCreate;
use crate::state::AppState;

use super::model::ImageUploadForm;
use super::service::{UploadService, read_image};

#[utoipa::path(
    post,
    path = "/api/uploads/images",
    request_body(content = ImageUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Image stored", body = ApiResponse<StoredMedia>),
        (status = 400, description = "Missing file, empty file or unsupported type"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires uploads:create"),
        (status = 413, description = "File too large"),
        (status = 502, description = "Media host failure")
    ),
    tag = "Uploads",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, multipart), fields(user.id = %auth_user.user_id))]
pub async fn upload_image(
    State(state): State<AppState>,
    RequireUploadsCreate(auth_user): RequireUploadsCreate,
    multipart: Multipart,
) -> Result<ApiResponse<StoredMedia>, AppError> {
    let image = read_image(multipart).await?;
    let folder = format!("{}/uploads", state.media_config.folder);
    let stored = UploadService::store(state.media.as_ref(), &folder, &image).await?;
    Ok(ApiResponse::created("Image uploaded successfully", stored))
}
