use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router, middleware};
use schoolyard_config::MediaBackend;
use schoolyard_observability::{logging_middleware, metrics_middleware};
use serde_json::json;
use tower_governor::GovernorLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable as _};
use utoipa_swagger_ui::SwaggerUi;

use crate::docs::ApiDoc;
use crate::modules::audit_logs::init_audit_logs_router;
use crate::modules::auth::init_auth_router;
use crate::modules::cities::init_cities_router;
use crate::modules::classes::init_classes_router;
use crate::modules::countries::init_countries_router;
use crate::modules::exams::init_exams_router;
use crate::modules::permissions::init_permissions_router;
use crate::modules::profiles::init_profiles_router;
use crate::modules::roles::init_roles_router;
use crate::modules::sections::init_sections_router;
use crate::modules::states::init_states_router;
use crate::modules::students::init_students_router;
use crate::modules::subjects::init_subjects_router;
use crate::modules::uploads::init_uploads_router;
use crate::modules::users::init_users_router;
use crate::state::AppState;

/// Room for multipart boundaries and headers on top of the image itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn auth_router(state: &AppState) -> Router<AppState> {
    let router = init_auth_router();
    match state.rate_limit_config.auth_governor_config() {
        Some(governor) => router.layer(GovernorLayer::new(governor)),
        None => {
            info!("Rate limiting disabled for auth routes");
            router
        }
    }
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let allowed_origins: Vec<HeaderValue> = state
        .cors_config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    // Credentials are required for the session cookie, which rules out `*`.
    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

pub fn init_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.media_config.max_bytes + MULTIPART_OVERHEAD);

    let api = Router::new()
        .nest("/auth", auth_router(&state))
        .nest("/roles", init_roles_router())
        .nest("/permissions", init_permissions_router())
        .nest("/users", init_users_router())
        .nest("/profiles", init_profiles_router().layer(upload_limit.clone()))
        .nest("/countries", init_countries_router())
        .nest("/states", init_states_router())
        .nest("/cities", init_cities_router())
        .nest("/classes", init_classes_router())
        .nest("/sections", init_sections_router())
        .nest("/subjects", init_subjects_router())
        .nest("/students", init_students_router().layer(upload_limit.clone()))
        .nest("/exams", init_exams_router())
        .nest("/uploads", init_uploads_router().layer(upload_limit))
        .nest("/audit-logs", init_audit_logs_router());

    let mut router = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .nest("/api", api)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(Scalar::with_url("/scalar", ApiDoc::openapi()));

    if let MediaBackend::Local { dir, .. } = &state.media_config.backend {
        router = router.nest_service("/media", ServeDir::new(dir));
    }

    router
        .with_state(state.clone())
        .layer(cors_layer(&state))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(logging_middleware))
}
