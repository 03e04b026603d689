mod common;

use axum::http::{Method, StatusCode};
use common::{PASSWORD, bootstrap_admin, login, send, setup_app, unique_name};
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test(migrations = "./migrations")]
async fn test_failed_audit_write_rolls_back_the_change(pool: PgPool) {
    let admin = bootstrap_admin(&pool).await;
    let app = setup_app(pool.clone());
    let cookie = login(&app, &admin, PASSWORD).await;

    sqlx::query(
        "CREATE FUNCTION reject_audit_insert() RETURNS TRIGGER AS $$
         BEGIN
             RAISE EXCEPTION 'audit store unavailable';
         END;
         $$ LANGUAGE plpgsql",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "CREATE TRIGGER trg_reject_audit_insert BEFORE INSERT ON audit_logs
         FOR EACH ROW EXECUTE FUNCTION reject_audit_insert()",
    )
    .execute(&pool)
    .await
    .unwrap();

    let name = unique_name("Grade");
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/classes",
        Some(&cookie),
        Some(json!({ "name": name })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Internal server error");

    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM classes WHERE name = $1")
        .bind(&name)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stored, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_audit_rows_cannot_be_changed_or_removed(pool: PgPool) {
    let admin = bootstrap_admin(&pool).await;
    let app = setup_app(pool.clone());
    let cookie = login(&app, &admin, PASSWORD).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/classes",
        Some(&cookie),
        Some(json!({ "name": unique_name("Grade") })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let before: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_logs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(before > 0);

    let update = sqlx::query("UPDATE audit_logs SET label = 'rewritten'")
        .execute(&pool)
        .await;
    let err = update.unwrap_err().to_string();
    assert!(err.contains("append-only"), "unexpected error: {}", err);

    let delete = sqlx::query("DELETE FROM audit_logs").execute(&pool).await;
    assert!(delete.is_err());

    let after: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_logs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(after, before);
}
