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
pub struct Country {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub iso_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auditable for Country {
    const KIND: EntityKind = EntityKind::Country;

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
pub struct CreateCountryDto {
    #[validate(length(min = 1, max = 120, message = "name must be between 1 and 120 characters"))]
    pub name: String,
    /// ISO 3166 alpha-2 or alpha-3 code
    #[validate(length(min = 2, max = 3, message = "iso_code must be 2 or 3 letters"))]
    pub iso_code: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCountryDto {
    #[validate(length(min = 1, max = 120, message = "name must be between 1 and 120 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 2, max = 3, message = "iso_code must be 2 or 3 letters"))]
    pub iso_code: Option<String>,
}

/// Upper-cases an ISO code, rejecting anything but ASCII letters.
pub fn normalize_iso_code(raw: &str) -> Option<String> {
    let code = raw.trim();
    (matches!(code.len(), 2 | 3) && code.chars().all(|c| c.is_ascii_alphabetic()))
        .then(|| code.to_ascii_uppercase())
}

pub const SELECT_COUNTRY: &str =
    "SELECT id, code, name, iso_code, created_at, updated_at FROM countries";

pub static COUNTRY_LIST: ListSpec = ListSpec {
    kind: EntityKind::Country,
    table: "countries",
    alias: "co",
    fields: &[
        field("id", "co.id"),
        field("code", "co.code"),
        field("name", "co.name"),
        field("iso_code", "co.iso_code"),
        field("created_at", "co.created_at"),
        field("updated_at", "co.updated_at"),
    ],
    search: &["co.name", "co.iso_code", "co.code"],
    sortable: &[
        field("name", "co.name"),
        field("iso_code", "co.iso_code"),
        field("created_at", "co.created_at"),
    ],
    default_sort: "created_at",
    relations: &[Relation {
        key: "states",
        join: None,
        expr: "COALESCE((SELECT jsonb_agg(jsonb_build_object('id', st.id, 'code', st.code, 'name', st.name) ORDER BY st.name) FROM states st WHERE st.country_id = co.id), '[]'::jsonb)",
    }],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_iso_code() {
        assert_eq!(normalize_iso_code(" ng "), Some("NG".to_string()));
        assert_eq!(normalize_iso_code("gbr"), Some("GBR".to_string()));
        assert_eq!(normalize_iso_code("n"), None);
        assert_eq!(normalize_iso_code("N1"), None);
        assert_eq!(normalize_iso_code("NGAX"), None);
    }
}
