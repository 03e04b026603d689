mod common;

use axum::http::{Method, StatusCode};
use common::{PASSWORD, bootstrap_admin, create_user_with_permissions, login, send, setup_app};
use schoolyard_core::{EntityKind, hash_password};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

#[sqlx::test(migrations = "./migrations")]
async fn test_login_sets_session_and_me_returns_permissions(pool: PgPool) {
    let username = bootstrap_admin(&pool).await;
    let app = setup_app(pool);

    let cookie = login(&app, &username, PASSWORD).await;
    assert!(cookie.starts_with("sid="));

    let (status, body) = send(&app, Method::GET, "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], username.as_str());
    assert_eq!(body["data"]["role"]["name"], "Super Admin");
    assert!(
        body["data"]["permissions"]
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p == "classes:create")
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn test_login_accepts_email_case_insensitively(pool: PgPool) {
    let username = bootstrap_admin(&pool).await;
    let app = setup_app(pool);

    let email = format!("{}@SCHOOL.test", username.to_uppercase());
    login(&app, &email, PASSWORD).await;
}

#[sqlx::test(migrations = "./migrations")]
async fn test_login_with_wrong_password_is_unauthorized(pool: PgPool) {
    let username = bootstrap_admin(&pool).await;
    let app = setup_app(pool);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": username, "password": "not-the-password" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], false);
    assert_eq!(body["message"], "Invalid username or password");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_requests_without_session_are_unauthorized(pool: PgPool) {
    let app = setup_app(pool);

    let (status, _) = send(&app, Method::GET, "/api/classes", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/auth/me",
        Some("sid=not-a-real-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_logout_revokes_the_session(pool: PgPool) {
    let username = bootstrap_admin(&pool).await;
    let app = setup_app(pool);
    let cookie = login(&app, &username, PASSWORD).await;

    let (status, _) = send(&app, Method::POST, "/api/auth/logout", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::GET, "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_change_password_signs_out_other_sessions(pool: PgPool) {
    let username = create_user_with_permissions(&pool, &[]).await;
    let app = setup_app(pool);

    let current = login(&app, &username, PASSWORD).await;
    let other = login(&app, &username, PASSWORD).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/change-password",
        Some(&current),
        Some(json!({ "current_password": "wrong-password", "new_password": "another-secret" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Current password is incorrect");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/change-password",
        Some(&current),
        Some(json!({ "current_password": PASSWORD, "new_password": "another-secret" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::GET, "/api/auth/me", Some(&current), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, "/api/auth/me", Some(&other), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    login(&app, &username, "another-secret").await;
}

#[sqlx::test(migrations = "./migrations")]
async fn test_deactivated_user_loses_access(pool: PgPool) {
    let admin = bootstrap_admin(&pool).await;
    let username = create_user_with_permissions(&pool, &[]).await;
    let app = setup_app(pool);

    let admin_cookie = login(&app, &admin, PASSWORD).await;
    let user_cookie = login(&app, &username, PASSWORD).await;

    let (_, me) = send(&app, Method::GET, "/api/auth/me", Some(&user_cookie), None).await;
    let code = me["data"]["code"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/users/{}", code),
        Some(&admin_cookie),
        Some(json!({ "is_active": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::GET, "/api/auth/me", Some(&user_cookie), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": username, "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Account is disabled");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_login_prefers_the_exact_username_match(pool: PgPool) {
    let owner = create_user_with_permissions(&pool, &[]).await;
    let (email, role_id): (String, Uuid) =
        sqlx::query_as("SELECT email, role_id FROM users WHERE username = $1")
            .bind(&owner)
            .fetch_one(&pool)
            .await
            .unwrap();

    // A second account whose username is the first account's email.
    sqlx::query(
        "INSERT INTO users (code, username, email, password_hash, role_id)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(EntityKind::User.new_code())
    .bind(&email)
    .bind(format!("other.{}", email))
    .bind(hash_password("another-password").unwrap())
    .bind(role_id)
    .execute(&pool)
    .await
    .unwrap();

    let app = setup_app(pool);
    let cookie = login(&app, &email, "another-password").await;

    let (status, body) = send(&app, Method::GET, "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], email.as_str());
}
