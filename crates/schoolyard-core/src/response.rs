//! Uniform response envelope.
//!
//! ```json
//! {
//!   "status": true,
//!   "statusCode": 200,
//!   "message": "Classes fetched successfully",
//!   "data": [...],
//!   "pagination": { "total": 42, "page": 1, "limit": 10, ... }
//! }
//! ```
//!
//! Unwindowed listings (`limit=all`) carry `total` instead of `pagination`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::pagination::{Page, PaginationMeta};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status: bool,
    pub status_code: u16,
    pub message: String,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
}

impl<T> ApiResponse<T> {
    fn with_status(status: StatusCode, message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            status: status.is_success(),
            status_code: status.as_u16(),
            message: message.into(),
            data,
            pagination: None,
            total: None,
        }
    }

    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::OK, message, Some(data))
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::CREATED, message, Some(data))
    }

    pub fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        Self::with_status(status, message, None)
    }
}

impl<T> ApiResponse<Vec<T>> {
    /// Listing envelope; windowed pages get `pagination`, `limit=all` gets `total`.
    pub fn page(message: impl Into<String>, page: Page<T>) -> Self {
        let mut response = Self::with_status(StatusCode::OK, message, Some(page.items));
        match page.meta {
            Some(meta) => response.pagination = Some(meta),
            None => response.total = Some(page.total),
        }
        response
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::OK, message, None)
    }
}

impl<T> IntoResponse for ApiResponse<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::Window;

    #[test]
    fn test_ok_envelope() {
        let response = ApiResponse::ok("Fetched", vec![1, 2]);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], true);
        assert_eq!(json["statusCode"], 200);
        assert_eq!(json["message"], "Fetched");
        assert_eq!(json["data"], serde_json::json!([1, 2]));
        assert!(json.get("pagination").is_none());
        assert!(json.get("total").is_none());
    }

    #[test]
    fn test_created_envelope_status_code() {
        let response = ApiResponse::created("Created", "x");
        assert_eq!(response.status_code, 201);
        assert!(response.status);
    }

    #[test]
    fn test_failure_envelope() {
        let response = ApiResponse::<()>::failure(StatusCode::CONFLICT, "Duplicate");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], false);
        assert_eq!(json["statusCode"], 409);
        assert!(json["data"].is_null());
    }

    #[test]
    fn test_windowed_page_carries_pagination() {
        let window = Window::Paged { page: 2, limit: 10 };
        let page = Page::new(vec!["a"; 10], 25, window);
        let json = serde_json::to_value(ApiResponse::page("Listed", page)).unwrap();
        assert_eq!(json["pagination"]["total"], 25);
        assert_eq!(json["pagination"]["page"], 2);
        assert_eq!(json["pagination"]["totalPages"], 3);
        assert!(json.get("total").is_none());
    }

    #[test]
    fn test_unwindowed_page_carries_total() {
        let page = Page::new(vec!["a", "b"], 2, Window::All);
        let json = serde_json::to_value(ApiResponse::page("Listed", page)).unwrap();
        assert_eq!(json["total"], 2);
        assert!(json.get("pagination").is_none());
    }

    #[test]
    fn test_message_only_envelope() {
        let json = serde_json::to_value(ApiResponse::message("Logged out")).unwrap();
        assert_eq!(json["message"], "Logged out");
        assert!(json["data"].is_null());
    }
}
