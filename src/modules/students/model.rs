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
use crate::modules::cities::model::Location;
use crate::modules::shared::Gender;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Student {
    pub id: Uuid,
    pub code: String,
    pub admission_number: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub class_id: Uuid,
    pub section_id: Option<Uuid>,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub address: Option<String>,
    pub city_id: Option<Uuid>,
    pub state_id: Option<Uuid>,
    pub country_id: Option<Uuid>,
    pub photo_url: Option<String>,
    pub photo_public_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auditable for Student {
    const KIND: EntityKind = EntityKind::Student;

    fn id(&self) -> Uuid {
        self.id
    }

    fn code(&self) -> &str {
        &self.code
    }

    fn display(&self) -> String {
        format!(
            "{} {} ({})",
            self.first_name, self.last_name, self.admission_number
        )
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateStudentDto {
    #[validate(length(min = 1, max = 50, message = "admission_number must be between 1 and 50 characters"))]
    pub admission_number: String,
    #[validate(length(min = 1, max = 100, message = "first_name must be between 1 and 100 characters"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "last_name must be between 1 and 100 characters"))]
    pub last_name: String,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
    pub class_id: Uuid,
    /// Must belong to `class_id`
    pub section_id: Option<Uuid>,
    #[validate(length(max = 200, message = "guardian_name must not exceed 200 characters"))]
    pub guardian_name: Option<String>,
    #[validate(length(max = 30, message = "guardian_phone must not exceed 30 characters"))]
    pub guardian_phone: Option<String>,
    #[validate(length(max = 500, message = "address must not exceed 500 characters"))]
    pub address: Option<String>,
    pub city_id: Option<Uuid>,
    pub state_id: Option<Uuid>,
    pub country_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateStudentDto {
    #[validate(length(min = 1, max = 50, message = "admission_number must be between 1 and 50 characters"))]
    pub admission_number: Option<String>,
    #[validate(length(min = 1, max = 100, message = "first_name must be between 1 and 100 characters"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "last_name must be between 1 and 100 characters"))]
    pub last_name: Option<String>,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
    pub class_id: Option<Uuid>,
    pub section_id: Option<Uuid>,
    #[validate(length(max = 200, message = "guardian_name must not exceed 200 characters"))]
    pub guardian_name: Option<String>,
    #[validate(length(max = 30, message = "guardian_phone must not exceed 30 characters"))]
    pub guardian_phone: Option<String>,
    #[validate(length(max = 500, message = "address must not exceed 500 characters"))]
    pub address: Option<String>,
    pub city_id: Option<Uuid>,
    pub state_id: Option<Uuid>,
    pub country_id: Option<Uuid>,
}

impl UpdateStudentDto {
    pub fn location(&self, current: Location) -> Location {
        Location {
            city_id: self.city_id.or(current.city_id),
            state_id: self.state_id.or(current.state_id),
            country_id: self.country_id.or(current.country_id),
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StudentFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub class_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub section_id: Option<Uuid>,
    pub gender: Option<Gender>,
}

pub const SELECT_STUDENT: &str = "SELECT id, code, admission_number, first_name, last_name, gender, date_of_birth, class_id, section_id, guardian_name, guardian_phone, address, city_id, state_id, country_id, photo_url, photo_public_id, created_at, updated_at FROM students";

pub const RETURNING_STUDENT: &str = " RETURNING id, code, admission_number, first_name, last_name, gender, date_of_birth, class_id, section_id, guardian_name, guardian_phone, address, city_id, state_id, country_id, photo_url, photo_public_id, created_at, updated_at";

pub static STUDENT_LIST: ListSpec = ListSpec {
    kind: EntityKind::Student,
    table: "students",
    alias: "sd",
    fields: &[
        field("id", "sd.id"),
        field("code", "sd.code"),
        field("admission_number", "sd.admission_number"),
        field("first_name", "sd.first_name"),
        field("last_name", "sd.last_name"),
        field("gender", "sd.gender"),
        field("date_of_birth", "sd.date_of_birth"),
        field("class_id", "sd.class_id"),
        field("section_id", "sd.section_id"),
        field("guardian_name", "sd.guardian_name"),
        field("guardian_phone", "sd.guardian_phone"),
        field("address", "sd.address"),
        field("city_id", "sd.city_id"),
        field("state_id", "sd.state_id"),
        field("country_id", "sd.country_id"),
        field("photo_url", "sd.photo_url"),
        field("photo_public_id", "sd.photo_public_id"),
        field("created_at", "sd.created_at"),
        field("updated_at", "sd.updated_at"),
    ],
    search: &[
        "sd.admission_number",
        "sd.first_name",
        "sd.last_name",
        "sd.guardian_name",
        "sd.code",
    ],
    sortable: &[
        field("admission_number", "sd.admission_number"),
        field("first_name", "sd.first_name"),
        field("last_name", "sd.last_name"),
        field("date_of_birth", "sd.date_of_birth"),
        field("created_at", "sd.created_at"),
        field("updated_at", "sd.updated_at"),
    ],
    default_sort: "created_at",
    relations: &[
        Relation {
            key: "class",
            join: Some("LEFT JOIN classes cl ON cl.id = sd.class_id"),
            expr: "CASE WHEN cl.id IS NULL THEN NULL ELSE jsonb_build_object('id', cl.id, 'code', cl.code, 'name', cl.name) END",
        },
        Relation {
            key: "section",
            join: Some("LEFT JOIN sections sc ON sc.id = sd.section_id"),
            expr: "CASE WHEN sc.id IS NULL THEN NULL ELSE jsonb_build_object('id', sc.id, 'code', sc.code, 'name', sc.name) END",
        },
        Relation {
            key: "city",
            join: Some("LEFT JOIN cities ci ON ci.id = sd.city_id"),
            expr: "CASE WHEN ci.id IS NULL THEN NULL ELSE jsonb_build_object('id', ci.id, 'code', ci.code, 'name', ci.name) END",
        },
        Relation {
            key: "state",
            join: Some("LEFT JOIN states st ON st.id = sd.state_id"),
            expr: "CASE WHEN st.id IS NULL THEN NULL ELSE jsonb_build_object('id', st.id, 'code', st.code, 'name', st.name) END",
        },
        Relation {
            key: "country",
            join: Some("LEFT JOIN countries co ON co.id = sd.country_id"),
            expr: "CASE WHEN co.id IS NULL THEN NULL ELSE jsonb_build_object('id', co.id, 'code', co.code, 'name', co.name, 'iso_code', co.iso_code) END",
        },
    ],
};
