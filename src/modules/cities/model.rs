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
pub struct City {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub state_id: Uuid,
    pub country_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auditable for City {
    const KIND: EntityKind = EntityKind::City;

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
pub struct CreateCityDto {
    #[validate(length(min = 1, max = 120, message = "name must be between 1 and 120 characters"))]
    pub name: String,
    pub state_id: Uuid,
    /// Defaults to the state's country; must match it when given
    pub country_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCityDto {
    #[validate(length(min = 1, max = 120, message = "name must be between 1 and 120 characters"))]
    pub name: Option<String>,
    pub state_id: Option<Uuid>,
    pub country_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CityFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub state_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub country_id: Option<Uuid>,
}

/// Optional city/state/country triple carried by profiles and students.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Location {
    pub city_id: Option<Uuid>,
    pub state_id: Option<Uuid>,
    pub country_id: Option<Uuid>,
}

pub const SELECT_CITY: &str =
    "SELECT id, code, name, state_id, country_id, created_at, updated_at FROM cities";

pub static CITY_LIST: ListSpec = ListSpec {
    kind: EntityKind::City,
    table: "cities",
    alias: "ci",
    fields: &[
        field("id", "ci.id"),
        field("code", "ci.code"),
        field("name", "ci.name"),
        field("state_id", "ci.state_id"),
        field("country_id", "ci.country_id"),
        field("created_at", "ci.created_at"),
        field("updated_at", "ci.updated_at"),
    ],
    search: &["ci.name", "ci.code"],
    sortable: &[
        field("name", "ci.name"),
        field("created_at", "ci.created_at"),
        field("updated_at", "ci.updated_at"),
    ],
    default_sort: "created_at",
    relations: &[
        Relation {
            key: "state",
            join: Some("LEFT JOIN states st ON st.id = ci.state_id"),
            expr: "CASE WHEN st.id IS NULL THEN NULL ELSE jsonb_build_object('id', st.id, 'code', st.code, 'name', st.name) END",
        },
        Relation {
            key: "country",
            join: Some("LEFT JOIN countries co ON co.id = ci.country_id"),
            expr: "CASE WHEN co.id IS NULL THEN NULL ELSE jsonb_build_object('id', co.id, 'code', co.code, 'name', co.name, 'iso_code', co.iso_code) END",
        },
    ],
};
