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
pub struct State {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub country_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auditable for State {
    const KIND: EntityKind = EntityKind::State;

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
pub struct CreateStateDto {
    #[validate(length(min = 1, max = 120, message = "name must be between 1 and 120 characters"))]
    pub name: String,
    pub country_id: Uuid,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateStateDto {
    #[validate(length(min = 1, max = 120, message = "name must be between 1 and 120 characters"))]
    pub name: Option<String>,
    pub country_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StateFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub country_id: Option<Uuid>,
}

pub const SELECT_STATE: &str =
    "SELECT id, code, name, country_id, created_at, updated_at FROM states";

pub static STATE_LIST: ListSpec = ListSpec {
    kind: EntityKind::State,
    table: "states",
    alias: "st",
    fields: &[
        field("id", "st.id"),
        field("code", "st.code"),
        field("name", "st.name"),
        field("country_id", "st.country_id"),
        field("created_at", "st.created_at"),
        field("updated_at", "st.updated_at"),
    ],
    search: &["st.name", "st.code"],
    sortable: &[
        field("name", "st.name"),
        field("created_at", "st.created_at"),
        field("updated_at", "st.updated_at"),
    ],
    default_sort: "created_at",
    relations: &[Relation {
        key: "country",
        join: Some("LEFT JOIN countries co ON co.id = st.country_id"),
        expr: "CASE WHEN co.id IS NULL THEN NULL ELSE jsonb_build_object('id', co.id, 'code', co.code, 'name', co.name, 'iso_code', co.iso_code) END",
    }],
};
