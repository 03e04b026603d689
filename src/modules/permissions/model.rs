use chrono::{DateTime, Utc};
use schoolyard_core::EntityKind;
use schoolyard_db::{ListSpec, Relation, field};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::modules::audit_logs::model::Auditable;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Permission {
    pub id: Uuid,
    pub code: String,
    /// `resource:action`, e.g. `students:create`
    pub name: String,
    pub description: Option<String>,
    pub module: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auditable for Permission {
    const KIND: EntityKind = EntityKind::Permission;

    fn id(&self) -> Uuid {
        self.id
    }

    fn code(&self) -> &str {
        &self.code
    }

    fn display(&self) -> String {
        self.name.clone()
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePermissionDto {
    #[validate(length(min = 3, max = 100, message = "name must be between 3 and 100 characters"))]
    pub name: String,
    pub description: Option<String>,
    /// Defaults to the resource part of `name`
    #[validate(length(min = 1, max = 50, message = "module must be between 1 and 50 characters"))]
    pub module: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdatePermissionDto {
    #[validate(length(min = 3, max = 100, message = "name must be between 3 and 100 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 50, message = "module must be between 1 and 50 characters"))]
    pub module: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PermissionFilterParams {
    pub module: Option<String>,
}

/// Splits a permission name into `(resource, action)`; both parts must be
/// non-empty lowercase identifiers.
pub fn parse_permission_name(name: &str) -> Option<(&str, &str)> {
    let valid = |part: &str| {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    };

    let (resource, action) = name.split_once(':')?;
    (valid(resource) && valid(action)).then_some((resource, action))
}

pub const SELECT_PERMISSION: &str =
    "SELECT id, code, name, description, module, created_at, updated_at FROM permissions";

pub static PERMISSION_LIST: ListSpec = ListSpec {
    kind: EntityKind::Permission,
    table: "permissions",
    alias: "pm",
    fields: &[
        field("id", "pm.id"),
        field("code", "pm.code"),
        field("name", "pm.name"),
        field("description", "pm.description"),
        field("module", "pm.module"),
        field("created_at", "pm.created_at"),
        field("updated_at", "pm.updated_at"),
    ],
    search: &["pm.name", "pm.description", "pm.module"],
    sortable: &[
        field("name", "pm.name"),
        field("module", "pm.module"),
        field("created_at", "pm.created_at"),
    ],
    default_sort: "created_at",
    relations: &[Relation {
        key: "roles",
        join: None,
        expr: "COALESCE((SELECT jsonb_agg(jsonb_build_object('id', r.id, 'code', r.code, 'name', r.name) ORDER BY r.name) FROM role_permissions rp JOIN roles r ON r.id = rp.role_id WHERE rp.permission_id = pm.id), '[]'::jsonb)",
    }],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_permission_name() {
        assert_eq!(parse_permission_name("students:create"), Some(("students", "create")));
        assert_eq!(parse_permission_name("audit_logs:read"), Some(("audit_logs", "read")));
        assert_eq!(parse_permission_name("students"), None);
        assert_eq!(parse_permission_name(":create"), None);
        assert_eq!(parse_permission_name("students:"), None);
        assert_eq!(parse_permission_name("Students:Create"), None);
        assert_eq!(parse_permission_name("a:b:c"), None);
    }
}
