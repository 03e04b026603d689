use axum::{Router, routing::get};

use crate::state::AppState;

use super::controller::{get_audit_log, list_audit_logs};

/// Read-only: the trail is append-only.
pub fn init_audit_logs_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_audit_logs))
        .route("/{key}", get(get_audit_log))
}
