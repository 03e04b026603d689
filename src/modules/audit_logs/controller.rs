use axum::extract::{Path, State};
use schoolyard_core::codes::EntityKey;
use schoolyard_core::{ApiResponse, AppError, ListParams};
use serde_json::Value;
use tracing::instrument;

use crate::extract::Params;
use crate::middleware::auth::RequireAuditLogsRead;
use crate::state::AppState;

use super::model::{AuditLog, AuditLogFilterParams};
use super::service::AuditService;

#[utoipa::path(
    get,
    path = "/api/audit-logs",
    params(ListParams, AuditLogFilterParams),
    responses(
        (status = 200, description = "Audit trail, newest first", body = ApiResponse<Vec<AuditLog>>),
        (status = 400, description = "Invalid listing parameters or entity kind"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires audit_logs:read")
    ),
    tag = "Audit logs",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, _auth_user))]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    RequireAuditLogsRead(_auth_user): RequireAuditLogsRead,
    Params(params): Params<ListParams>,
    Params(filters): Params<AuditLogFilterParams>,
) -> Result<ApiResponse<Vec<Value>>, AppError> {
    let page = AuditService::list(&state.db, &params, filters).await?;
    Ok(ApiResponse::page("Audit logs fetched successfully", page))
}

#[utoipa::path(
    get,
    path = "/api/audit-logs/{key}",
    params(("key" = String, Path, description = "Audit log id or code")),
    responses(
        (status = 200, description = "Audit log entry", body = ApiResponse<AuditLog>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Requires audit_logs:read"),
        (status = 404, description = "Audit log not found")
    ),
    tag = "Audit logs",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, _auth_user))]
pub async fn get_audit_log(
    State(state): State<AppState>,
    RequireAuditLogsRead(_auth_user): RequireAuditLogsRead,
    Path(key): Path<String>,
) -> Result<ApiResponse<Value>, AppError> {
    let entry = AuditService::get(&state.db, &EntityKey::parse(&key)).await?;
    Ok(ApiResponse::ok("Audit log fetched successfully", entry))
}
