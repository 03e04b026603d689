mod common;

use axum::http::{Method, StatusCode};
use common::{PASSWORD, bootstrap_admin, data_id, login, send, setup_app, unique_name};
use serde_json::{Value, json};
use sqlx::PgPool;

async fn create(app: &axum::Router, cookie: &str, path: &str, body: Value) -> Value {
    let (status, body) = send(app, Method::POST, path, Some(cookie), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "POST {} failed: {}", path, body);
    body
}

#[sqlx::test(migrations = "./migrations")]
async fn test_geography_chain_and_delete_protection(pool: PgPool) {
    let admin = bootstrap_admin(&pool).await;
    let app = setup_app(pool);
    let cookie = login(&app, &admin, PASSWORD).await;

    let country = create(
        &app,
        &cookie,
        "/api/countries",
        json!({ "name": "Ghana", "iso_code": "GHA" }),
    )
    .await;
    let country_id = data_id(&country);
    let country_code = country["data"]["code"].as_str().unwrap().to_string();
    assert!(country_code.starts_with("COUNTRY-"));

    let state = create(
        &app,
        &cookie,
        "/api/states",
        json!({ "name": "Ashanti", "country_id": country_id }),
    )
    .await;
    let state_id = data_id(&state);

    // Country is inferred from the state when omitted.
    let city = create(
        &app,
        &cookie,
        "/api/cities",
        json!({ "name": "Kumasi", "state_id": state_id }),
    )
    .await;
    assert_eq!(city["data"]["country_id"], country_id.as_str());

    let other = create(
        &app,
        &cookie,
        "/api/countries",
        json!({ "name": "Togo", "iso_code": "TGO" }),
    )
    .await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/cities",
        Some(&cookie),
        Some(json!({ "name": "Obuasi", "state_id": state_id, "country_id": data_id(&other) })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "State does not belong to the given country");

    // Lookup by business code works the same as by id.
    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/countries/{}", country_code),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], country_id.as_str());

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/countries/{}", country_id),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], false);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/countries/{}", data_id(&other)),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_duplicate_names_conflict(pool: PgPool) {
    let admin = bootstrap_admin(&pool).await;
    let app = setup_app(pool);
    let cookie = login(&app, &admin, PASSWORD).await;

    create(&app, &cookie, "/api/classes", json!({ "name": "Grade 7" })).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/classes",
        Some(&cookie),
        Some(json!({ "name": "grade 7" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_student_placement_and_exam_rules(pool: PgPool) {
    let admin = bootstrap_admin(&pool).await;
    let app = setup_app(pool);
    let cookie = login(&app, &admin, PASSWORD).await;

    let grade_one = data_id(&create(&app, &cookie, "/api/classes", json!({ "name": unique_name("Grade") })).await);
    let grade_two = data_id(&create(&app, &cookie, "/api/classes", json!({ "name": unique_name("Grade") })).await);

    let section = data_id(
        &create(
            &app,
            &cookie,
            "/api/sections",
            json!({ "name": "A", "class_id": grade_two, "capacity": 30 }),
        )
        .await,
    );

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/students",
        Some(&cookie),
        Some(json!({
            "admission_number": "ADM-001",
            "first_name": "Ama",
            "last_name": "Mensah",
            "gender": "female",
            "class_id": grade_one,
            "section_id": section,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Section does not belong to the given class");

    let student = create(
        &app,
        &cookie,
        "/api/students",
        json!({
            "admission_number": "ADM-001",
            "first_name": "Ama",
            "last_name": "Mensah",
            "gender": "female",
            "class_id": grade_two,
            "section_id": section,
        }),
    )
    .await;
    assert!(student["data"]["code"].as_str().unwrap().starts_with("STUDENT-"));

    // The section is now in use.
    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/sections/{}", section),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let subject = data_id(
        &create(
            &app,
            &cookie,
            "/api/subjects",
            json!({ "name": "Mathematics", "subject_code": "MATH", "class_id": grade_two }),
        )
        .await,
    );

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/exams",
        Some(&cookie),
        Some(json!({
            "name": "Midterm",
            "class_id": grade_one,
            "subject_id": subject,
            "total_marks": 100,
            "passing_marks": 40,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Subject does not belong to the given class");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/exams",
        Some(&cookie),
        Some(json!({
            "name": "Midterm",
            "class_id": grade_two,
            "subject_id": subject,
            "total_marks": 100,
            "passing_marks": 140,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    create(
        &app,
        &cookie,
        "/api/exams",
        json!({
            "name": "Midterm",
            "class_id": grade_two,
            "subject_id": subject,
            "exam_date": "2025-03-14",
            "total_marks": 100,
            "passing_marks": 40,
        }),
    )
    .await;
}

#[sqlx::test(migrations = "./migrations")]
async fn test_listing_pages_searches_and_populates(pool: PgPool) {
    let admin = bootstrap_admin(&pool).await;
    let app = setup_app(pool);
    let cookie = login(&app, &admin, PASSWORD).await;

    let class_id = data_id(&create(&app, &cookie, "/api/classes", json!({ "name": "Grade 9" })).await);
    for name in ["Blue", "Green", "Red"] {
        create(
            &app,
            &cookie,
            "/api/sections",
            json!({ "name": name, "class_id": class_id }),
        )
        .await;
    }

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/sections?page=1&limit=2&sort_by=name&sort_order=asc",
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Blue", "Green"]);
    assert_eq!(body["pagination"]["total"], 3);
    assert_eq!(body["pagination"]["totalPages"], 2);
    assert_eq!(body["pagination"]["hasNextPage"], true);

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/sections?keyword=gre&limit=all&populate=true",
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert!(body.get("pagination").is_none());
    assert_eq!(body["data"][0]["class"]["name"], "Grade 9");

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/sections?sort_by=not_a_field",
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_page_past_the_offset_range_is_rejected(pool: PgPool) {
    let admin = bootstrap_admin(&pool).await;
    let app = setup_app(pool);
    let cookie = login(&app, &admin, PASSWORD).await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/classes?page=9223372036854775807&limit=100",
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], false);

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/classes?page=9223372036854775807&limit=1",
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_blank_names_are_rejected(pool: PgPool) {
    let admin = bootstrap_admin(&pool).await;
    let app = setup_app(pool);
    let cookie = login(&app, &admin, PASSWORD).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/countries",
        Some(&cookie),
        Some(json!({ "name": "   ", "iso_code": "ZZZ" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "name must not be blank");

    let class = create(&app, &cookie, "/api/classes", json!({ "name": unique_name("Grade") })).await;
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/classes/{}", data_id(&class)),
        Some(&cookie),
        Some(json!({ "name": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
