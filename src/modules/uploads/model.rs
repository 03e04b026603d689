use utoipa::ToSchema;

/// `multipart/form-data` body accepted by every image upload route.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct ImageUploadForm {
    /// PNG, JPEG or WebP image
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// An image read from a multipart request, ready to be stored.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}
