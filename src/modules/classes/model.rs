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
pub struct Class {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auditable for Class {
    const KIND: EntityKind = EntityKind::Class;

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
pub struct CreateClassDto {
    #[validate(length(min = 1, max = 100, message = "name must be between 1 and 100 characters"))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateClassDto {
    #[validate(length(min = 1, max = 100, message = "name must be between 1 and 100 characters"))]
    pub name: Option<String>,
    /// Empty string clears the description
    pub description: Option<String>,
}

pub const SELECT_CLASS: &str =
    "SELECT id, code, name, description, created_at, updated_at FROM classes";

pub static CLASS_LIST: ListSpec = ListSpec {
    kind: EntityKind::Class,
    table: "classes",
    alias: "cl",
    fields: &[
        field("id", "cl.id"),
        field("code", "cl.code"),
        field("name", "cl.name"),
        field("description", "cl.description"),
        field("created_at", "cl.created_at"),
        field("updated_at", "cl.updated_at"),
    ],
    search: &["cl.name", "cl.code", "cl.description"],
    sortable: &[
        field("name", "cl.name"),
        field("created_at", "cl.created_at"),
        field("updated_at", "cl.updated_at"),
    ],
    default_sort: "created_at",
    relations: &[
        Relation {
            key: "sections",
            join: None,
            expr: "COALESCE((SELECT jsonb_agg(jsonb_build_object('id', s.id, 'code', s.code, 'name', s.name) ORDER BY s.name) FROM sections s WHERE s.class_id = cl.id), '[]'::jsonb)",
        },
        Relation {
            key: "subjects",
            join: None,
            expr: "COALESCE((SELECT jsonb_agg(jsonb_build_object('id', sb.id, 'code', sb.code, 'name', sb.name) ORDER BY sb.name) FROM subjects sb WHERE sb.class_id = cl.id), '[]'::jsonb)",
        },
    ],
};
