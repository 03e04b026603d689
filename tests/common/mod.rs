#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use fake::Fake;
use fake::faker::name::en::FirstName;
use http_body_util::BodyExt;
use schoolyard::cli::{NewAdmin, create_admin, sync_permissions};
use schoolyard::router::init_router;
use schoolyard::state::{AppConfig, AppState};
use schoolyard_core::{EntityKind, hash_password};
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "correct-horse-battery";

/// Router over `pool` with rate limiting off (oneshot requests carry no
/// peer address) and media written to a throwaway directory.
pub fn setup_app(pool: PgPool) -> Router {
    let media_dir = std::env::temp_dir()
        .join(format!("schoolyard-test-{}", Uuid::new_v4()))
        .to_string_lossy()
        .into_owned();

    let config = AppConfig::from_lookup(move |key| match key {
        "RATE_LIMIT_ENABLED" => Some("false".to_string()),
        "MEDIA_LOCAL_DIR" => Some(media_dir.clone()),
        "MEDIA_PUBLIC_URL" => Some("http://localhost/media".to_string()),
        _ => None,
    });

    init_router(AppState::new(pool, config, None))
}

pub fn unique_name(prefix: &str) -> String {
    format!("{} {}", prefix, &Uuid::new_v4().simple().to_string()[..8])
}

/// Syncs the permission catalogue and creates a super admin; returns the username.
pub async fn bootstrap_admin(pool: &PgPool) -> String {
    sync_permissions(pool).await.unwrap();

    let username = format!("admin{}", &Uuid::new_v4().simple().to_string()[..8]);
    create_admin(
        pool,
        NewAdmin {
            username: username.clone(),
            email: format!("{}@school.test", username),
            password: PASSWORD.to_string(),
        },
    )
    .await
    .unwrap();

    username
}

/// Creates a role holding exactly `permissions` and a user in it; returns the username.
pub async fn create_user_with_permissions(pool: &PgPool, permissions: &[&str]) -> String {
    sync_permissions(pool).await.unwrap();

    let role_id: Uuid = sqlx::query_scalar(
        "INSERT INTO roles (code, name) VALUES ($1, $2) RETURNING id",
    )
    .bind(EntityKind::Role.new_code())
    .bind(unique_name("Role"))
    .fetch_one(pool)
    .await
    .unwrap();

    let names: Vec<String> = permissions.iter().map(|p| p.to_string()).collect();
    sqlx::query(
        "INSERT INTO role_permissions (role_id, permission_id)
         SELECT $1, id FROM permissions WHERE name = ANY($2)",
    )
    .bind(role_id)
    .bind(&names)
    .execute(pool)
    .await
    .unwrap();

    let first_name: String = FirstName().fake();
    let username = format!(
        "{}{}",
        first_name.to_lowercase(),
        &Uuid::new_v4().simple().to_string()[..8]
    );
    sqlx::query(
        "INSERT INTO users (code, username, email, password_hash, role_id)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(EntityKind::User.new_code())
    .bind(&username)
    .bind(format!("{}@school.test", username))
    .bind(hash_password(PASSWORD).unwrap())
    .bind(role_id)
    .execute(pool)
    .await
    .unwrap();

    username
}

/// Logs in and returns the `name=value` pair of the session cookie.
pub async fn login(app: &Router, username: &str, password: &str) -> String {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({ "username": username, "password": password }).to_string(),
        ))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK, "login failed for {}", username);

    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
        .expect("session cookie")
}

/// Sends a JSON request and returns the status with the parsed body
/// (`Value::Null` when the body is empty).
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }

    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    read(response).await
}

pub async fn read(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            panic!(
                "Failed to parse response. Status: {}, Body: {:?}",
                status,
                String::from_utf8_lossy(&bytes)
            )
        })
    };
    (status, body)
}

pub fn data_id(body: &Value) -> String {
    body["data"]["id"]
        .as_str()
        .unwrap_or_else(|| panic!("No id in response: {}", body))
        .to_string()
}
