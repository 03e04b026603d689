use chrono::{DateTime, Utc};
use schoolyard_core::EntityKind;
use schoolyard_db::{ListSpec, Relation, field};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::modules::audit_logs::model::Auditable;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Role {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    /// When false the role can never be deleted
    pub allow_deletion: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct PermissionSummary {
    pub id: Uuid,
    pub code: String,
    pub name: String,
}

/// A role together with the permissions it grants. This is also what the
/// audit trail stores for roles, so permission changes show up in diffs.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleWithPermissions {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<PermissionSummary>,
}

impl Auditable for RoleWithPermissions {
    const KIND: EntityKind = EntityKind::Role;

    fn id(&self) -> Uuid {
        self.role.id
    }

    fn code(&self) -> &str {
        &self.role.code
    }

    fn display(&self) -> String {
        self.role.name.clone()
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRoleDto {
    #[validate(length(min = 1, max = 100, message = "name must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(length(max = 500, message = "description must not exceed 500 characters"))]
    pub description: Option<String>,
    /// Defaults to true
    pub allow_deletion: Option<bool>,
    /// Permission IDs to grant
    pub permission_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateRoleDto {
    #[validate(length(min = 1, max = 100, message = "name must be between 1 and 100 characters"))]
    pub name: Option<String>,
    /// Empty string clears the description
    #[validate(length(max = 500, message = "description must not exceed 500 characters"))]
    pub description: Option<String>,
    /// Setting this back to true on a protected record is refused
    pub allow_deletion: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetRolePermissionsDto {
    /// The complete permission set; an empty list revokes everything
    pub permission_ids: Vec<Uuid>,
}

pub const SELECT_ROLE: &str =
    "SELECT id, code, name, description, allow_deletion, created_at, updated_at FROM roles";

pub static ROLE_LIST: ListSpec = ListSpec {
    kind: EntityKind::Role,
    table: "roles",
    alias: "r",
    fields: &[
        field("id", "r.id"),
        field("code", "r.code"),
        field("name", "r.name"),
        field("description", "r.description"),
        field("allow_deletion", "r.allow_deletion"),
        field("created_at", "r.created_at"),
        field("updated_at", "r.updated_at"),
    ],
    search: &["r.name", "r.description", "r.code"],
    sortable: &[
        field("name", "r.name"),
        field("created_at", "r.created_at"),
        field("updated_at", "r.updated_at"),
    ],
    default_sort: "created_at",
    relations: &[
        Relation {
            key: "permissions",
            join: None,
            expr: "COALESCE((SELECT jsonb_agg(jsonb_build_object('id', p.id, 'code', p.code, 'name', p.name) ORDER BY p.name) FROM role_permissions rp JOIN permissions p ON p.id = rp.permission_id WHERE rp.role_id = r.id), '[]'::jsonb)",
        },
        Relation {
            key: "user_count",
            join: None,
            expr: "to_jsonb((SELECT COUNT(*) FROM users u WHERE u.role_id = r.id))",
        },
    ],
};
