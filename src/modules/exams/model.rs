use chrono::{DateTime, NaiveDate, Utc};
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
pub struct Exam {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub class_id: Uuid,
    pub subject_id: Uuid,
    pub exam_date: Option<NaiveDate>,
    pub total_marks: i32,
    pub passing_marks: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auditable for Exam {
    const KIND: EntityKind = EntityKind::Exam;

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
pub struct CreateExamDto {
    #[validate(length(min = 1, max = 150, message = "name must be between 1 and 150 characters"))]
    pub name: String,
    pub class_id: Uuid,
    /// Must belong to `class_id`
    pub subject_id: Uuid,
    pub exam_date: Option<NaiveDate>,
    #[validate(range(min = 1, message = "total_marks must be at least 1"))]
    pub total_marks: i32,
    #[validate(range(min = 0, message = "passing_marks cannot be negative"))]
    pub passing_marks: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateExamDto {
    #[validate(length(min = 1, max = 150, message = "name must be between 1 and 150 characters"))]
    pub name: Option<String>,
    pub class_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub exam_date: Option<NaiveDate>,
    #[validate(range(min = 1, message = "total_marks must be at least 1"))]
    pub total_marks: Option<i32>,
    #[validate(range(min = 0, message = "passing_marks cannot be negative"))]
    pub passing_marks: Option<i32>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExamFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub class_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub subject_id: Option<Uuid>,
}

pub const SELECT_EXAM: &str = "SELECT id, code, name, class_id, subject_id, exam_date, total_marks, passing_marks, created_at, updated_at FROM exams";

pub static EXAM_LIST: ListSpec = ListSpec {
    kind: EntityKind::Exam,
    table: "exams",
    alias: "ex",
    fields: &[
        field("id", "ex.id"),
        field("code", "ex.code"),
        field("name", "ex.name"),
        field("class_id", "ex.class_id"),
        field("subject_id", "ex.subject_id"),
        field("exam_date", "ex.exam_date"),
        field("total_marks", "ex.total_marks"),
        field("passing_marks", "ex.passing_marks"),
        field("created_at", "ex.created_at"),
        field("updated_at", "ex.updated_at"),
    ],
    search: &["ex.name", "ex.code"],
    sortable: &[
        field("name", "ex.name"),
        field("exam_date", "ex.exam_date"),
        field("total_marks", "ex.total_marks"),
        field("created_at", "ex.created_at"),
    ],
    default_sort: "created_at",
    relations: &[
        Relation {
            key: "class",
            join: Some("LEFT JOIN classes cl ON cl.id = ex.class_id"),
            expr: "CASE WHEN cl.id IS NULL THEN NULL ELSE jsonb_build_object('id', cl.id, 'code', cl.code, 'name', cl.name) END",
        },
        Relation {
            key: "subject",
            join: Some("LEFT JOIN subjects sb ON sb.id = ex.subject_id"),
            expr: "CASE WHEN sb.id IS NULL THEN NULL ELSE jsonb_build_object('id', sb.id, 'code', sb.code, 'name', sb.name, 'subject_code', sb.subject_code) END",
        },
    ],
};
