//! Image uploads.
//!
//! Files are pushed to a third-party media host. [`MediaStore`] hides which
//! host is used so handlers only deal with an uploaded image's public URL
//! and identifier:
//!
//! - [`CloudinaryStore`]: signed uploads to a Cloudinary-compatible API
//! - [`LocalMediaStore`]: writes under a local directory, for development
//!
//! # Example
//!
//! ```ignore
//! let stored = state.media.upload(MediaUpload {
//!     folder: "students",
//!     file_name: "passport.png",
//!     content_type: "image/png",
//!     bytes: &bytes,
//! }).await?;
//!
//! println!("{}", stored.url);
//! ```

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use utoipa::ToSchema;
use uuid::Uuid;

pub type MediaFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

/// An image to store.
#[derive(Debug, Clone, Copy)]
pub struct MediaUpload<'a> {
    pub folder: &'a str,
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub bytes: &'a [u8],
}

/// Where an uploaded image ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StoredMedia {
    pub url: String,
    pub public_id: String,
}

pub trait MediaStore: Send + Sync {
    fn upload<'a>(&'a self, upload: MediaUpload<'a>) -> MediaFuture<'a, StoredMedia>;

    /// Removing an unknown id is not an error.
    fn remove<'a>(&'a self, public_id: &'a str) -> MediaFuture<'a, ()>;
}

#[derive(Debug)]
pub enum StorageError {
    InvalidFileSize { max_bytes: usize },
    InvalidMimeType { received: String, allowed: Vec<String> },
    EmptyFile,
    InvalidKey(String),
    IoError(std::io::Error),
    Http(reqwest::Error),
    Upstream { status: u16, message: String },
}

impl StorageError {
    /// Whether the client sent something we refuse, as opposed to a host failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidFileSize { .. }
                | Self::InvalidMimeType { .. }
                | Self::EmptyFile
                | Self::InvalidKey(_)
        )
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFileSize { max_bytes } => {
                write!(f, "File exceeds maximum size of {} bytes", max_bytes)
            }
            Self::InvalidMimeType { received, allowed } => write!(
                f,
                "MIME type '{}' not allowed. Allowed types: {}",
                received,
                allowed.join(", ")
            ),
            Self::EmptyFile => write!(f, "Uploaded file is empty"),
            Self::InvalidKey(msg) => write!(f, "Invalid media key: {}", msg),
            Self::IoError(e) => write!(f, "I/O error: {}", e),
            Self::Http(e) => write!(f, "Media host request failed: {}", e),
            Self::Upstream { status, message } => {
                write!(f, "Media host rejected upload ({}): {}", status, message)
            }
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e)
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

/// Size and type limits applied before anything leaves the process.
#[derive(Debug, Clone)]
pub struct MediaRules {
    pub max_bytes: usize,
    pub allowed_mime_types: Vec<String>,
}

impl Default for MediaRules {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024,
            allowed_mime_types: vec![
                "image/png".to_string(),
                "image/jpeg".to_string(),
                "image/webp".to_string(),
            ],
        }
    }
}

impl MediaRules {
    pub fn check(&self, upload: &MediaUpload<'_>) -> Result<(), StorageError> {
        if upload.bytes.is_empty() {
            return Err(StorageError::EmptyFile);
        }
        if upload.bytes.len() > self.max_bytes {
            return Err(StorageError::InvalidFileSize {
                max_bytes: self.max_bytes,
            });
        }
        if !self
            .allowed_mime_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(upload.content_type))
        {
            return Err(StorageError::InvalidMimeType {
                received: upload.content_type.to_string(),
                allowed: self.allowed_mime_types.clone(),
            });
        }
        validate_folder(upload.folder)
    }
}

fn validate_folder(folder: &str) -> Result<(), StorageError> {
    if folder.is_empty() || folder.contains("..") || folder.starts_with('/') {
        return Err(StorageError::InvalidKey(
            "Folder must not be empty, contain '..', or start with '/'".to_string(),
        ));
    }
    if !folder
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '/')
    {
        return Err(StorageError::InvalidKey(
            "Folder contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

/// Derives a host-safe public id: sanitised file stem plus a short random suffix.
pub fn public_id_for(file_name: &str) -> String {
    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name);

    let mut slug: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    slug.truncate(48);
    if slug.is_empty() {
        slug.push_str("upload");
    }

    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", slug, &suffix[..8])
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type.to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        _ => "bin",
    }
}

// =============================================================================
// Cloudinary-compatible host
// =============================================================================

#[derive(Clone)]
pub struct CloudinaryStore {
    client: reqwest::Client,
    base_url: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    root_folder: String,
    rules: MediaRules,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    url: Option<String>,
    public_id: String,
}

#[derive(Debug, Deserialize)]
struct HostErrorBody {
    error: Option<HostErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct HostErrorMessage {
    message: String,
}

impl CloudinaryStore {
    pub fn new(
        base_url: String,
        cloud_name: String,
        api_key: String,
        api_secret: String,
        root_folder: String,
        rules: MediaRules,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            cloud_name,
            api_key,
            api_secret,
            root_folder: root_folder.trim_matches('/').to_string(),
            rules,
        }
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/v1_1/{}/image/{}",
            self.base_url, self.cloud_name, action
        )
    }

    fn folder_path(&self, folder: &str) -> String {
        if self.root_folder.is_empty() {
            folder.to_string()
        } else {
            format!("{}/{}", self.root_folder, folder)
        }
    }

    /// Signs request parameters: parameters sorted by name, joined as
    /// `k=v&k=v`, the API secret appended, hashed with SHA-256.
    pub fn sign(&self, params: &[(&str, String)]) -> String {
        let mut sorted: Vec<&(&str, String)> = params.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let to_sign = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(to_sign.as_bytes());
        hasher.update(self.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    async fn host_error(response: reqwest::Response) -> StorageError {
        let status = response.status().as_u16();
        let message = match response.json::<HostErrorBody>().await {
            Ok(HostErrorBody {
                error: Some(HostErrorMessage { message }),
            }) => message,
            _ => "unexpected response".to_string(),
        };
        StorageError::Upstream { status, message }
    }
}

impl MediaStore for CloudinaryStore {
    fn upload<'a>(&'a self, upload: MediaUpload<'a>) -> MediaFuture<'a, StoredMedia> {
        Box::pin(async move {
            self.rules.check(&upload)?;

            let timestamp = chrono::Utc::now().timestamp().to_string();
            let folder = self.folder_path(upload.folder);
            let public_id = public_id_for(upload.file_name);

            let signature = self.sign(&[
                ("folder", folder.clone()),
                ("public_id", public_id.clone()),
                ("timestamp", timestamp.clone()),
            ]);

            let file = reqwest::multipart::Part::bytes(upload.bytes.to_vec())
                .file_name(upload.file_name.to_string())
                .mime_str(upload.content_type)?;

            let form = reqwest::multipart::Form::new()
                .part("file", file)
                .text("api_key", self.api_key.clone())
                .text("timestamp", timestamp)
                .text("folder", folder)
                .text("public_id", public_id)
                .text("signature", signature)
                .text("signature_algorithm", "sha256");

            let response = self
                .client
                .post(self.endpoint("upload"))
                .multipart(form)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(Self::host_error(response).await);
            }

            let body: UploadResponse = response.json().await?;
            let url = body.secure_url.or(body.url).ok_or(StorageError::Upstream {
                status: 200,
                message: "response did not include a URL".to_string(),
            })?;

            tracing::debug!(media.public_id = %body.public_id, "Image uploaded to media host");

            Ok(StoredMedia {
                url,
                public_id: body.public_id,
            })
        })
    }

    fn remove<'a>(&'a self, public_id: &'a str) -> MediaFuture<'a, ()> {
        Box::pin(async move {
            let timestamp = chrono::Utc::now().timestamp().to_string();
            let signature = self.sign(&[
                ("public_id", public_id.to_string()),
                ("timestamp", timestamp.clone()),
            ]);

            let response = self
                .client
                .post(self.endpoint("destroy"))
                .form(&[
                    ("public_id", public_id),
                    ("api_key", self.api_key.as_str()),
                    ("timestamp", timestamp.as_str()),
                    ("signature", signature.as_str()),
                    ("signature_algorithm", "sha256"),
                ])
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(Self::host_error(response).await);
            }
            Ok(())
        })
    }
}

// =============================================================================
// Local disk
// =============================================================================

#[derive(Clone)]
pub struct LocalMediaStore {
    base_dir: PathBuf,
    public_url: String,
    rules: MediaRules,
}

impl LocalMediaStore {
    pub fn new(base_dir: PathBuf, public_url: String, rules: MediaRules) -> Self {
        Self {
            base_dir,
            public_url: public_url.trim_end_matches('/').to_string(),
            rules,
        }
    }

    pub fn url_for(&self, public_id: &str) -> String {
        format!("{}/{}", self.public_url, public_id)
    }
}

impl MediaStore for LocalMediaStore {
    fn upload<'a>(&'a self, upload: MediaUpload<'a>) -> MediaFuture<'a, StoredMedia> {
        Box::pin(async move {
            self.rules.check(&upload)?;

            let file_name = format!(
                "{}.{}",
                public_id_for(upload.file_name),
                extension_for(upload.content_type)
            );
            let public_id = format!("{}/{}", upload.folder.trim_matches('/'), file_name);
            let path = self.base_dir.join(&public_id);

            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&path, upload.bytes).await?;

            Ok(StoredMedia {
                url: self.url_for(&public_id),
                public_id,
            })
        })
    }

    fn remove<'a>(&'a self, public_id: &'a str) -> MediaFuture<'a, ()> {
        Box::pin(async move {
            if public_id.contains("..") || public_id.starts_with('/') {
                return Err(StorageError::InvalidKey(public_id.to_string()));
            }

            match fs::remove_file(self.base_dir.join(public_id)).await {
                Ok(_) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(bytes: &[u8]) -> MediaUpload<'_> {
        MediaUpload {
            folder: "students",
            file_name: "Passport Photo.PNG",
            content_type: "image/png",
            bytes,
        }
    }

    fn store() -> CloudinaryStore {
        CloudinaryStore::new(
            "https://api.example.com/".to_string(),
            "demo".to_string(),
            "key".to_string(),
            "secret".to_string(),
            "schoolyard".to_string(),
            MediaRules::default(),
        )
    }

    #[test]
    fn test_rules_accept_valid_image() {
        assert!(MediaRules::default().check(&png(b"\x89PNG")).is_ok());
    }

    #[test]
    fn test_rules_reject_empty_and_oversized() {
        let rules = MediaRules {
            max_bytes: 4,
            ..MediaRules::default()
        };
        assert!(matches!(rules.check(&png(b"")), Err(StorageError::EmptyFile)));
        assert!(matches!(
            rules.check(&png(b"12345")),
            Err(StorageError::InvalidFileSize { max_bytes: 4 })
        ));
    }

    #[test]
    fn test_rules_reject_mime_type() {
        let mut upload = png(b"GIF89a");
        upload.content_type = "image/gif";
        let err = MediaRules::default().check(&upload).unwrap_err();
        assert!(err.is_client_error());
        assert!(err.to_string().contains("image/gif"));
    }

    #[test]
    fn test_rules_reject_folder_traversal() {
        let mut upload = png(b"x");
        upload.folder = "../etc";
        assert!(matches!(
            MediaRules::default().check(&upload),
            Err(StorageError::InvalidKey(_))
        ));
        upload.folder = "/abs";
        assert!(MediaRules::default().check(&upload).is_err());
    }

    #[test]
    fn test_public_id_is_sanitised() {
        let id = public_id_for("Passport Photo (1).PNG");
        assert!(id.starts_with("passport-photo-1-"));
        assert_eq!(id.len(), "passport-photo-1-".len() + 8);

        let fallback = public_id_for("???.jpg");
        assert!(fallback.starts_with("upload-"));
    }

    #[test]
    fn test_signature_is_order_independent() {
        let store = store();
        let a = store.sign(&[("timestamp", "1".into()), ("folder", "f".into())]);
        let b = store.sign(&[("folder", "f".into()), ("timestamp", "1".into())]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_signature_matches_manual_digest() {
        let store = store();
        let signature = store.sign(&[("timestamp", "1700000000".into()), ("folder", "x".into())]);

        let mut hasher = Sha256::new();
        hasher.update(b"folder=x&timestamp=1700000000secret");
        assert_eq!(signature, hex::encode(hasher.finalize()));
    }

    #[test]
    fn test_endpoint_and_folder() {
        let store = store();
        assert_eq!(
            store.endpoint("upload"),
            "https://api.example.com/v1_1/demo/image/upload"
        );
        assert_eq!(store.folder_path("profiles"), "schoolyard/profiles");
    }

    #[tokio::test]
    async fn test_local_store_round_trip() {
        let dir = std::env::temp_dir().join(format!("schoolyard-media-{}", Uuid::new_v4()));
        let store = LocalMediaStore::new(
            dir.clone(),
            "http://localhost:3000/media/".to_string(),
            MediaRules::default(),
        );

        let stored = store.upload(png(b"\x89PNG")).await.unwrap();
        assert!(stored.public_id.starts_with("students/passport-photo-"));
        assert!(stored.public_id.ends_with(".png"));
        assert_eq!(
            stored.url,
            format!("http://localhost:3000/media/{}", stored.public_id)
        );
        assert!(dir.join(&stored.public_id).exists());

        store.remove(&stored.public_id).await.unwrap();
        assert!(!dir.join(&stored.public_id).exists());
        // Removing twice is fine.
        store.remove(&stored.public_id).await.unwrap();

        let _ = std::fs::remove_dir_all(dir);
    }
}
