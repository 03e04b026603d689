//! Application error type.
//!
//! Every handler returns `Result<_, AppError>`. The error carries the HTTP
//! status to answer with and an [`anyhow::Error`] describing the failure; on
//! the way out it is rendered into the standard response envelope with
//! `status: false` and `data: null`.
//!
//! Server errors (5xx) never leak their cause to the client: the detail is
//! logged and the body carries a generic message instead.

use anyhow::Error;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::response::ApiResponse;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub error: Error,
}

impl AppError {
    pub fn new<E>(status: StatusCode, err: E) -> Self
    where
        E: Into<Error>,
    {
        Self {
            status,
            error: err.into(),
        }
    }

    pub fn internal<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err)
    }

    pub fn not_found<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::NOT_FOUND, err)
    }

    pub fn bad_request<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::BAD_REQUEST, err)
    }

    pub fn conflict<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::CONFLICT, err)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, anyhow::anyhow!(message.into()))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, anyhow::anyhow!(message.into()))
    }

    /// Message sent to the client.
    pub fn public_message(&self) -> String {
        if self.status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.error.to_string()
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.error)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status.as_u16(), error = ?self.error, "Request failed");
        }

        ApiResponse::<()>::failure(self.status, self.public_message()).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<Error>,
{
    fn from(err: E) -> Self {
        AppError::internal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_constructors_set_status() {
        assert_eq!(AppError::not_found(anyhow!("x")).status, StatusCode::NOT_FOUND);
        assert_eq!(AppError::bad_request(anyhow!("x")).status, StatusCode::BAD_REQUEST);
        assert_eq!(AppError::conflict(anyhow!("x")).status, StatusCode::CONFLICT);
        assert_eq!(AppError::unauthorized("x").status, StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::forbidden("x").status, StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::internal(anyhow!("x")).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_client_error_message_is_public() {
        let err = AppError::conflict(anyhow!("Class with this name already exists"));
        assert_eq!(err.public_message(), "Class with this name already exists");
    }

    #[test]
    fn test_server_error_message_is_hidden() {
        let err = AppError::internal(anyhow!("connection refused at 10.0.0.3:5432"));
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_from_io_error_is_internal() {
        let io = std::io::Error::other("disk gone");
        let err: AppError = io.into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_into_response_uses_envelope() {
        use http_body_util::BodyExt;

        let response = AppError::not_found(anyhow!("Student not found")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], false);
        assert_eq!(body["statusCode"], 404);
        assert_eq!(body["message"], "Student not found");
        assert!(body["data"].is_null());
    }
}
