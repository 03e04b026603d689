use anyhow::anyhow;
use axum::extract::Multipart;
use axum::http::StatusCode;
use schoolyard_core::AppError;
use schoolyard_core::media::{MediaStore, MediaUpload, StorageError, StoredMedia};
use schoolyard_observability::track_media_upload;
use tracing::{debug, error, instrument, warn};

use super::model::ImageFile;

/// Name of the multipart field carrying the image.
pub const FILE_FIELD: &str = "file";

pub fn storage_error(err: StorageError) -> AppError {
    if err.is_client_error() {
        AppError::bad_request(anyhow!(err.to_string()))
    } else {
        error!(error = %err, "Media host failure");
        AppError::new(StatusCode::BAD_GATEWAY, err)
    }
}

/// Pulls the `file` field out of a multipart body, skipping any other fields.
pub async fn read_image(mut multipart: Multipart) -> Result<ImageFile, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::new(e.status(), anyhow!(e.body_text())))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::new(e.status(), anyhow!(e.body_text())))?;

        return Ok(ImageFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Err(AppError::bad_request(anyhow!(
        "Multipart field '{}' is required",
        FILE_FIELD
    )))
}

pub struct UploadService;

impl UploadService {
    #[instrument(skip(media, image), fields(file.name = %image.file_name, file.size = image.bytes.len()))]
    pub async fn store(
        media: &dyn MediaStore,
        folder: &str,
        image: &ImageFile,
    ) -> Result<StoredMedia, AppError> {
        let upload = MediaUpload {
            folder,
            file_name: &image.file_name,
            content_type: &image.content_type,
            bytes: &image.bytes,
        };

        match media.upload(upload).await {
            Ok(stored) => {
                track_media_upload("success");
                debug!(public_id = %stored.public_id, "Image stored");
                Ok(stored)
            }
            Err(err) => {
                track_media_upload(if err.is_client_error() {
                    "rejected"
                } else {
                    "failure"
                });
                Err(storage_error(err))
            }
        }
    }

    /// Removes a replaced image. Failures are only logged.
    pub async fn discard(media: &dyn MediaStore, public_id: &str) {
        if let Err(err) = media.remove(public_id).await {
            warn!(public_id, error = %err, "Failed to remove replaced image");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_storage_errors_are_bad_requests() {
        let err = storage_error(StorageError::EmptyFile);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "Uploaded file is empty");

        let err = storage_error(StorageError::InvalidMimeType {
            received: "text/plain".to_string(),
            allowed: vec!["image/png".to_string()],
        });
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_host_failures_are_bad_gateway() {
        let err = storage_error(StorageError::Upstream {
            status: 500,
            message: "boom".to_string(),
        });
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
    }
}
