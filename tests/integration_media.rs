mod common;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use common::{PASSWORD, bootstrap_admin, data_id, login, read, send, setup_app, unique_name};
use serde_json::{Value, json};
use sqlx::PgPool;
use tower::ServiceExt;

const BOUNDARY: &str = "schoolyard-test-boundary";

// PNG signature and IHDR chunk header.
const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52,
];

fn multipart_body(field: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

async fn upload(
    app: &Router,
    uri: &str,
    cookie: &str,
    field: &str,
    content_type: &str,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(
            field,
            "Class Photo.png",
            content_type,
            PNG_BYTES,
        )))
        .unwrap();

    read(app.clone().oneshot(request).await.unwrap()).await
}

#[sqlx::test(migrations = "./migrations")]
async fn test_generic_image_upload(pool: PgPool) {
    let admin = bootstrap_admin(&pool).await;
    let app = setup_app(pool);
    let cookie = login(&app, &admin, PASSWORD).await;

    let (status, body) = upload(&app, "/api/uploads/images", &cookie, "file", "image/png").await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let public_id = body["data"]["public_id"].as_str().unwrap();
    assert!(public_id.starts_with("schoolyard/uploads/class-photo-"));
    assert!(body["data"]["url"].as_str().unwrap().ends_with(".png"));

    let (status, _) = upload(&app, "/api/uploads/images", &cookie, "file", "image/gif").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) =
        upload(&app, "/api/uploads/images", &cookie, "attachment", "image/png").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], false);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_student_photo_replaces_previous(pool: PgPool) {
    let admin = bootstrap_admin(&pool).await;
    let app = setup_app(pool);
    let cookie = login(&app, &admin, PASSWORD).await;

    let (_, class) = send(
        &app,
        Method::POST,
        "/api/classes",
        Some(&cookie),
        Some(json!({ "name": unique_name("Grade") })),
    )
    .await;
    let (status, student) = send(
        &app,
        Method::POST,
        "/api/students",
        Some(&cookie),
        Some(json!({
            "admission_number": "ADM-PHOTO",
            "first_name": "Kofi",
            "last_name": "Boateng",
            "class_id": data_id(&class),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/api/students/{}/photo", data_id(&student));

    let (status, first) = upload(&app, &uri, &cookie, "file", "image/png").await;
    assert_eq!(status, StatusCode::OK, "{}", first);
    let first_id = first["data"]["photo_public_id"].as_str().unwrap().to_string();
    assert!(first_id.starts_with("schoolyard/students/"));

    let (status, second) = upload(&app, &uri, &cookie, "file", "image/png").await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(second["data"]["photo_public_id"].as_str().unwrap(), first_id);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_own_profile_round_trip(pool: PgPool) {
    let admin = bootstrap_admin(&pool).await;
    let app = setup_app(pool);
    let cookie = login(&app, &admin, PASSWORD).await;

    let (status, body) = send(&app, Method::GET, "/api/profiles/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "You do not have a profile yet");

    let (_, me) = send(&app, Method::GET, "/api/auth/me", Some(&cookie), None).await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/profiles",
        Some(&cookie),
        Some(json!({
            "user_id": me["data"]["id"],
            "first_name": "Efua",
            "last_name": "Owusu",
            "gender": "female",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/profiles/me",
        Some(&cookie),
        Some(json!({ "phone": "+233200000000" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["phone"], "+233200000000");
    assert_eq!(body["data"]["first_name"], "Efua");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_photo_for_unknown_student_is_not_found(pool: PgPool) {
    let admin = bootstrap_admin(&pool).await;
    let app = setup_app(pool);
    let cookie = login(&app, &admin, PASSWORD).await;

    let uri = format!("/api/students/{}/photo", uuid::Uuid::new_v4());
    let (status, body) = upload(&app, &uri, &cookie, "file", "image/png").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Student not found");
}
