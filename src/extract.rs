//! Query-string extractor with envelope-shaped rejections.

use anyhow::anyhow;
use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use schoolyard_core::AppError;
use serde::de::DeserializeOwned;

/// Like [`Query`], but a malformed query string is a 400 in the standard
/// response envelope instead of axum's plain-text rejection.
#[derive(Debug, Clone, Copy, Default)]
pub struct Params<T>(pub T);

impl<T, S> FromRequestParts<S> for Params<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                AppError::bad_request(anyhow!("Invalid query: {}", rejection.body_text()))
            })?;
        Ok(Params(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use schoolyard_core::ListParams;

    async fn extract(uri: &str) -> Result<ListParams, AppError> {
        let (mut parts, _) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        Params::<ListParams>::from_request_parts(&mut parts, &())
            .await
            .map(|Params(p)| p)
    }

    #[tokio::test]
    async fn test_parses_list_params() {
        let params = extract("/?page=2&limit=all&keyword=blue&populate=true")
            .await
            .unwrap();
        assert_eq!(params.page, Some(2));
        assert_eq!(params.limit.as_deref(), Some("all"));
        assert_eq!(params.keyword(), Some("blue"));
        assert!(params.populate());
    }

    #[tokio::test]
    async fn test_empty_values_are_ignored() {
        let params = extract("/?page=&populate=").await.unwrap();
        assert_eq!(params.page, None);
        assert!(!params.populate());
    }

    #[tokio::test]
    async fn test_bad_value_is_bad_request() {
        let err = extract("/?page=first").await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.public_message().starts_with("Invalid query"));
    }
}
