use anyhow::anyhow;
use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use schoolyard_core::AppError;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

fn format_errors(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                error
                    .message
                    .as_ref()
                    .map(|msg| msg.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field))
            })
        })
        .collect();
    // field_errors() is a HashMap, keep the message stable
    messages.sort();
    messages.join(", ")
}

fn rejection_error(rejection: JsonRejection) -> AppError {
    if matches!(rejection, JsonRejection::MissingJsonContentType(_)) {
        return AppError::bad_request(anyhow!(
            "Missing 'Content-Type: application/json' header"
        ));
    }

    let error_msg = rejection.body_text();

    if let Some(field) = error_msg
        .split("missing field `")
        .nth(1)
        .and_then(|s| s.split('`').next())
    {
        return AppError::bad_request(anyhow!("{} is required", field));
    }

    if error_msg.contains("invalid type") || error_msg.contains("invalid value") {
        return AppError::bad_request(anyhow!("Invalid field type in request"));
    }

    AppError::bad_request(anyhow!("Invalid request body"))
}

/// JSON body extractor that runs `validator` rules and reports every failure
/// as a single 400.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(rejection_error)?;

        value
            .validate()
            .map_err(|errors| AppError::bad_request(anyhow!("{}", format_errors(&errors))))?;

        Ok(ValidatedJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{StatusCode, header};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct CreateThing {
        #[validate(length(min = 1, message = "name is required"))]
        name: String,
        #[validate(range(min = 1, message = "capacity must be at least 1"))]
        capacity: i32,
    }

    fn json_request(body: &str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn extract(req: Request) -> Result<CreateThing, AppError> {
        ValidatedJson::<CreateThing>::from_request(req, &())
            .await
            .map(|ValidatedJson(v)| v)
    }

    #[tokio::test]
    async fn test_valid_body() {
        let thing = extract(json_request(r#"{"name":"Blue","capacity":30}"#))
            .await
            .unwrap();
        assert_eq!(thing.name, "Blue");
        assert_eq!(thing.capacity, 30);
    }

    #[tokio::test]
    async fn test_missing_field_is_bad_request() {
        let err = extract(json_request(r#"{"name":"Blue"}"#)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "capacity is required");
    }

    #[tokio::test]
    async fn test_validation_messages_are_joined() {
        let err = extract(json_request(r#"{"name":"","capacity":0}"#))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            err.public_message(),
            "capacity must be at least 1, name is required"
        );
    }

    #[tokio::test]
    async fn test_missing_content_type() {
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from("{}"))
            .unwrap();
        let err = extract(req).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.public_message().contains("Content-Type"));
    }
}
