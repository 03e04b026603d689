use chrono::{DateTime, Utc};
use schoolyard_core::EntityKind;
use schoolyard_core::serde::deserialize_optional_uuid;
use schoolyard_db::{ListSpec, field};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// A record whose mutations are written to the audit trail.
pub trait Auditable: Serialize {
    const KIND: EntityKind;

    fn id(&self) -> Uuid;
    fn code(&self) -> &str;
    /// Human-readable name used in the audit label.
    fn display(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RoleSnapshot {
    pub id: Uuid,
    pub code: String,
    pub name: String,
}

/// Who performed a mutation, frozen at the time it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ActorSnapshot {
    pub id: Option<Uuid>,
    pub code: String,
    pub username: String,
    pub email: String,
    pub role: Option<RoleSnapshot>,
    pub permissions: Vec<String>,
}

impl ActorSnapshot {
    /// Actor recorded for changes made from the command line.
    pub fn system() -> Self {
        Self {
            id: None,
            code: "SYSTEM".to_string(),
            username: "system".to_string(),
            email: String::new(),
            role: None,
            permissions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AuditLog {
    pub id: Uuid,
    pub code: String,
    #[schema(value_type = ActorSnapshot)]
    pub actor: sqlx::types::Json<ActorSnapshot>,
    pub actor_id: Option<Uuid>,
    pub entity_kind: String,
    pub entity_id: Uuid,
    pub entity_code: String,
    pub action: String,
    pub label: String,
    #[schema(value_type = Option<Object>)]
    pub before: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub after: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditLogFilterParams {
    /// Entity kind, e.g. `class` or `student`
    pub entity_kind: Option<String>,
    /// Business code of the affected record
    pub entity_code: Option<String>,
    /// `create`, `update` or `delete`
    pub action: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub actor_id: Option<Uuid>,
}

pub static AUDIT_LOG_LIST: ListSpec = ListSpec {
    kind: EntityKind::AuditLog,
    table: "audit_logs",
    alias: "al",
    fields: &[
        field("id", "al.id"),
        field("code", "al.code"),
        field("actor", "al.actor"),
        field("actor_id", "al.actor_id"),
        field("entity_kind", "al.entity_kind"),
        field("entity_id", "al.entity_id"),
        field("entity_code", "al.entity_code"),
        field("action", "al.action"),
        field("label", "al.label"),
        field("before", "al.before"),
        field("after", "al.after"),
        field("created_at", "al.created_at"),
    ],
    search: &["al.label", "al.entity_code"],
    sortable: &[
        field("created_at", "al.created_at"),
        field("entity_kind", "al.entity_kind"),
        field("action", "al.action"),
    ],
    default_sort: "created_at",
    relations: &[],
};
