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
use crate::modules::shared::Gender;

/// Personal details attached to a user account, at most one per user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Profile {
    pub id: Uuid,
    pub code: String,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub city_id: Option<Uuid>,
    pub state_id: Option<Uuid>,
    pub country_id: Option<Uuid>,
    pub avatar_url: Option<String>,
    pub avatar_public_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auditable for Profile {
    const KIND: EntityKind = EntityKind::Profile;

    fn id(&self) -> Uuid {
        self.id
    }

    fn code(&self) -> &str {
        &self.code
    }

    fn display(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProfileDto {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 100, message = "first_name must be between 1 and 100 characters"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "last_name must be between 1 and 100 characters"))]
    pub last_name: String,
    #[validate(length(max = 30, message = "phone must not exceed 30 characters"))]
    pub phone: Option<String>,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
    #[validate(length(max = 500, message = "address must not exceed 500 characters"))]
    pub address: Option<String>,
    pub city_id: Option<Uuid>,
    pub state_id: Option<Uuid>,
    pub country_id: Option<Uuid>,
}

/// Also used by `PUT /api/profiles/me`. Empty strings clear text fields.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileDto {
    #[validate(length(min = 1, max = 100, message = "first_name must be between 1 and 100 characters"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "last_name must be between 1 and 100 characters"))]
    pub last_name: Option<String>,
    #[validate(length(max = 30, message = "phone must not exceed 30 characters"))]
    pub phone: Option<String>,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
    #[validate(length(max = 500, message = "address must not exceed 500 characters"))]
    pub address: Option<String>,
    pub city_id: Option<Uuid>,
    pub state_id: Option<Uuid>,
    pub country_id: Option<Uuid>,
}

impl UpdateProfileDto {
    pub fn touches_location(&self) -> bool {
        self.city_id.is_some() || self.state_id.is_some() || self.country_id.is_some()
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProfileFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub user_id: Option<Uuid>,
    pub gender: Option<Gender>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub city_id: Option<Uuid>,
}

pub const SELECT_PROFILE: &str = "SELECT id, code, user_id, first_name, last_name, phone, gender, date_of_birth, address, city_id, state_id, country_id, avatar_url, avatar_public_id, created_at, updated_at FROM profiles";

pub const RETURNING_PROFILE: &str = " RETURNING id, code, user_id, first_name, last_name, phone, gender, date_of_birth, address, city_id, state_id, country_id, avatar_url, avatar_public_id, created_at, updated_at";

pub static PROFILE_LIST: ListSpec = ListSpec {
    kind: EntityKind::Profile,
    table: "profiles",
    alias: "pf",
    fields: &[
        field("id", "pf.id"),
        field("code", "pf.code"),
        field("user_id", "pf.user_id"),
        field("first_name", "pf.first_name"),
        field("last_name", "pf.last_name"),
        field("phone", "pf.phone"),
        field("gender", "pf.gender"),
        field("date_of_birth", "pf.date_of_birth"),
        field("address", "pf.address"),
        field("city_id", "pf.city_id"),
        field("state_id", "pf.state_id"),
        field("country_id", "pf.country_id"),
        field("avatar_url", "pf.avatar_url"),
        field("avatar_public_id", "pf.avatar_public_id"),
        field("created_at", "pf.created_at"),
        field("updated_at", "pf.updated_at"),
    ],
    search: &["pf.first_name", "pf.last_name", "pf.phone", "pf.code"],
    sortable: &[
        field("first_name", "pf.first_name"),
        field("last_name", "pf.last_name"),
        field("date_of_birth", "pf.date_of_birth"),
        field("created_at", "pf.created_at"),
        field("updated_at", "pf.updated_at"),
    ],
    default_sort: "created_at",
    relations: &[
        Relation {
            key: "user",
            join: Some("LEFT JOIN users u ON u.id = pf.user_id"),
            expr: "CASE WHEN u.id IS NULL THEN NULL ELSE jsonb_build_object('id', u.id, 'code', u.code, 'username', u.username, 'email', u.email) END",
        },
        Relation {
            key: "city",
            join: Some("LEFT JOIN cities ci ON ci.id = pf.city_id"),
            expr: "CASE WHEN ci.id IS NULL THEN NULL ELSE jsonb_build_object('id', ci.id, 'code', ci.code, 'name', ci.name) END",
        },
        Relation {
            key: "state",
            join: Some("LEFT JOIN states st ON st.id = pf.state_id"),
            expr: "CASE WHEN st.id IS NULL THEN NULL ELSE jsonb_build_object('id', st.id, 'code', st.code, 'name', st.name) END",
        },
        Relation {
            key: "country",
            join: Some("LEFT JOIN countries co ON co.id = pf.country_id"),
            expr: "CASE WHEN co.id IS NULL THEN NULL ELSE jsonb_build_object('id', co.id, 'code', co.code, 'name', co.name, 'iso_code', co.iso_code) END",
        },
    ],
};
