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
pub struct Subject {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    /// Timetable code such as `MTH101`
    pub subject_code: Option<String>,
    pub class_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auditable for Subject {
    const KIND: EntityKind = EntityKind::Subject;

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
pub struct CreateSubjectDto {
    #[validate(length(min = 1, max = 100, message = "name must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(length(max = 20, message = "subject_code must be at most 20 characters"))]
    pub subject_code: Option<String>,
    pub class_id: Uuid,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateSubjectDto {
    #[validate(length(min = 1, max = 100, message = "name must be between 1 and 100 characters"))]
    pub name: Option<String>,
    /// Empty string clears the subject code
    #[validate(length(max = 20, message = "subject_code must be at most 20 characters"))]
    pub subject_code: Option<String>,
    pub class_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SubjectFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub class_id: Option<Uuid>,
}

pub const SELECT_SUBJECT: &str =
    "SELECT id, code, name, subject_code, class_id, created_at, updated_at FROM subjects";

pub static SUBJECT_LIST: ListSpec = ListSpec {
    kind: EntityKind::Subject,
    table: "subjects",
    alias: "sb",
    fields: &[
        field("id", "sb.id"),
        field("code", "sb.code"),
        field("name", "sb.name"),
        field("subject_code", "sb.subject_code"),
        field("class_id", "sb.class_id"),
        field("created_at", "sb.created_at"),
        field("updated_at", "sb.updated_at"),
    ],
    search: &["sb.name", "sb.subject_code", "sb.code"],
    sortable: &[
        field("name", "sb.name"),
        field("subject_code", "sb.subject_code"),
        field("created_at", "sb.created_at"),
    ],
    default_sort: "created_at",
    relations: &[Relation {
        key: "class",
        join: Some("LEFT JOIN classes cl ON cl.id = sb.class_id"),
        expr: "CASE WHEN cl.id IS NULL THEN NULL ELSE jsonb_build_object('id', cl.id, 'code', cl.code, 'name', cl.name) END",
    }],
};
