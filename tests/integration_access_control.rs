mod common;

use axum::http::{Method, StatusCode};
use common::{
    PASSWORD, bootstrap_admin, create_user_with_permissions, data_id, login, send, setup_app,
    unique_name,
};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

async fn permission_id(pool: &PgPool, name: &str) -> Uuid {
    sqlx::query_scalar("SELECT id FROM permissions WHERE name = $1")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[sqlx::test(migrations = "./migrations")]
async fn test_missing_permission_is_forbidden(pool: PgPool) {
    let username = create_user_with_permissions(&pool, &["classes:read"]).await;
    let app = setup_app(pool);
    let cookie = login(&app, &username, PASSWORD).await;

    let (status, _) = send(&app, Method::GET, "/api/classes", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/classes",
        Some(&cookie),
        Some(json!({ "name": "Grade 1" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], false);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_role_permissions_are_replaced_and_take_effect(pool: PgPool) {
    let admin = bootstrap_admin(&pool).await;
    let clerk = create_user_with_permissions(&pool, &[]).await;
    let classes_read = permission_id(&pool, "classes:read").await;
    let app = setup_app(pool.clone());
    let admin_cookie = login(&app, &admin, PASSWORD).await;
    let clerk_cookie = login(&app, &clerk, PASSWORD).await;

    let (status, _) = send(&app, Method::GET, "/api/classes", Some(&clerk_cookie), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let role_id: Uuid = sqlx::query_scalar("SELECT role_id FROM users WHERE username = $1")
        .bind(&clerk)
        .fetch_one(&pool)
        .await
        .unwrap();

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/roles/{}/permissions", role_id),
        Some(&admin_cookie),
        Some(json!({ "permission_ids": [Uuid::new_v4()] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "One or more permission IDs are invalid");

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/roles/{}/permissions", role_id),
        Some(&admin_cookie),
        Some(json!({ "permission_ids": [classes_read, classes_read] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["permissions"].as_array().unwrap().len(), 1);

    // Permissions are read per request, so the existing session sees the change.
    let (status, _) = send(&app, Method::GET, "/api/classes", Some(&clerk_cookie), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_role_deletion_rules(pool: PgPool) {
    let admin = bootstrap_admin(&pool).await;
    let app = setup_app(pool.clone());
    let cookie = login(&app, &admin, PASSWORD).await;

    let super_admin: Uuid = sqlx::query_scalar("SELECT id FROM roles WHERE name = 'Super Admin'")
        .fetch_one(&pool)
        .await
        .unwrap();
    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/roles/{}", super_admin),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "This role cannot be deleted");

    let (status, role) = send(
        &app,
        Method::POST,
        "/api/roles",
        Some(&cookie),
        Some(json!({ "name": unique_name("Teacher") })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let role_id = data_id(&role);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/users",
        Some(&cookie),
        Some(json!({
            "username": "teacher1",
            "email": "teacher1@school.test",
            "password": "long-enough-password",
            "role_id": role_id,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/roles/{}", role_id),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_writes_are_audited_with_actor(pool: PgPool) {
    let admin = bootstrap_admin(&pool).await;
    let app = setup_app(pool);
    let cookie = login(&app, &admin, PASSWORD).await;

    let (_, class) = send(
        &app,
        Method::POST,
        "/api/classes",
        Some(&cookie),
        Some(json!({ "name": "Grade 3" })),
    )
    .await;
    let code = class["data"]["code"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/classes/{}", code),
        Some(&cookie),
        Some(json!({ "description": "Third year" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/audit-logs?entity_code={}&sort_by=created_at&sort_order=asc", code),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["action"], "create");
    assert_eq!(entries[1]["action"], "update");
    assert_eq!(entries[1]["actor"]["username"], admin.as_str());
    assert_eq!(entries[1]["before"]["description"], serde_json::Value::Null);
    assert_eq!(entries[1]["after"]["description"], "Third year");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_users_cannot_delete_themselves(pool: PgPool) {
    let admin = bootstrap_admin(&pool).await;
    let app = setup_app(pool);
    let cookie = login(&app, &admin, PASSWORD).await;

    let (_, me) = send(&app, Method::GET, "/api/auth/me", Some(&cookie), None).await;
    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/users/{}", me["data"]["id"].as_str().unwrap()),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_deletion_protection_cannot_be_lifted(pool: PgPool) {
    let admin = bootstrap_admin(&pool).await;
    let operator = create_user_with_permissions(
        &pool,
        &["users:update", "users:delete", "roles:update", "roles:delete"],
    )
    .await;
    let app = setup_app(pool.clone());
    let cookie = login(&app, &operator, PASSWORD).await;

    let admin_id: Uuid = sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
        .bind(&admin)
        .fetch_one(&pool)
        .await
        .unwrap();

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/users/{}", admin_id),
        Some(&cookie),
        Some(json!({ "allow_deletion": true })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Deletion protection cannot be removed");

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/users/{}", admin_id),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "This user cannot be deleted");

    let still_protected: bool =
        sqlx::query_scalar("SELECT NOT allow_deletion FROM users WHERE id = $1")
            .bind(admin_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(still_protected);

    let super_admin: Uuid = sqlx::query_scalar("SELECT id FROM roles WHERE name = 'Super Admin'")
        .fetch_one(&pool)
        .await
        .unwrap();
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/roles/{}", super_admin),
        Some(&cookie),
        Some(json!({ "allow_deletion": true })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/roles/{}", super_admin),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
