use chrono::{DateTime, Utc};
use schoolyard_core::EntityKind;
use schoolyard_core::serde::deserialize_optional_uuid;
use schoolyard_db::{ListSpec, Relation, field};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::modules::audit_logs::model::Auditable;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Section {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub class_id: Uuid,
    pub capacity: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auditable for Section {
    const KIND: EntityKind = EntityKind::Section;

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
pub struct CreateSectionDto {
    #[validate(length(min = 1, max = 100, message = "name must be between 1 and 100 characters"))]
    pub name: String,
    pub class_id: Uuid,
    #[validate(range(min = 1, message = "capacity must be at least 1"))]
    pub capacity: Option<i32>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateSectionDto {
    #[validate(length(min = 1, max = 100, message = "name must be between 1 and 100 characters"))]
    pub name: Option<String>,
    pub class_id: Option<Uuid>,
    #[validate(range(min = 1, message = "capacity must be at least 1"))]
    pub capacity: Option<i32>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SectionFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub class_id: Option<Uuid>,
}

pub const SELECT_SECTION: &str =
    "SELECT id, code, name, class_id, capacity, created_at, updated_at FROM sections";

pub static SECTION_LIST: ListSpec = ListSpec {
    kind: EntityKind::Section,
    table: "sections",
    alias: "sc",
    fields: &[
        field("id", "sc.id"),
        field("code", "sc.code"),
        field("name", "sc.name"),
        field("class_id", "sc.class_id"),
        field("capacity", "sc.capacity"),
        field("created_at", "sc.created_at"),
        field("updated_at", "sc.updated_at"),
    ],
    search: &["sc.name", "sc.code"],
    sortable: &[
        field("name", "sc.name"),
        field("capacity", "sc.capacity"),
        field("created_at", "sc.created_at"),
    ],
    default_sort: "created_at",
    relations: &[Relation {
        key: "class",
        join: Some("LEFT JOIN classes cl ON cl.id = sc.class_id"),
        expr: "CASE WHEN cl.id IS NULL THEN NULL ELSE jsonb_build_object('id', cl.id, 'code', cl.code, 'name', cl.name) END",
    }],
};
