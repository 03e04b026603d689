use chrono::{DateTime, Utc};
use schoolyard_core::EntityKind;
use schoolyard_core::serde::{deserialize_optional_bool, deserialize_optional_uuid};
use schoolyard_db::{ListSpec, Relation, field};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::modules::audit_logs::model::Auditable;

/// An account that can sign in. The password hash never leaves the server,
/// not even in audit snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub code: String,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role_id: Uuid,
    pub is_active: bool,
    pub allow_deletion: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auditable for User {
    const KIND: EntityKind = EntityKind::User;

    fn id(&self) -> Uuid {
        self.id
    }

    fn code(&self) -> &str {
        &self.code
    }

    fn display(&self) -> String {
        self.username.clone()
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserDto {
    #[validate(length(min = 3, max = 50, message = "username must be between 3 and 50 characters"))]
    pub username: String,
    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "password must be between 8 and 128 characters"))]
    pub password: String,
    pub role_id: Uuid,
    /// Defaults to true
    pub is_active: Option<bool>,
    /// Defaults to true
    pub allow_deletion: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateUserDto {
    #[validate(length(min = 3, max = 50, message = "username must be between 3 and 50 characters"))]
    pub username: Option<String>,
    #[validate(email(message = "email must be a valid email address"))]
    pub email: Option<String>,
    pub role_id: Option<Uuid>,
    /// Deactivating a user ends all of their sessions
    pub is_active: Option<bool>,
    /// Setting this back to true on a protected record is refused
    pub allow_deletion: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordDto {
    #[validate(length(min = 8, max = 128, message = "new_password must be between 8 and 128 characters"))]
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub role_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_bool")]
    pub is_active: Option<bool>,
}

pub const SELECT_USER: &str = "SELECT id, code, username, email, password_hash, role_id, is_active, allow_deletion, last_login_at, created_at, updated_at FROM users";

pub const RETURNING_USER: &str = " RETURNING id, code, username, email, password_hash, role_id, is_active, allow_deletion, last_login_at, created_at, updated_at";

pub static USER_LIST: ListSpec = ListSpec {
    kind: EntityKind::User,
    table: "users",
    alias: "u",
    fields: &[
        field("id", "u.id"),
        field("code", "u.code"),
        field("username", "u.username"),
        field("email", "u.email"),
        field("role_id", "u.role_id"),
        field("is_active", "u.is_active"),
        field("allow_deletion", "u.allow_deletion"),
        field("last_login_at", "u.last_login_at"),
        field("created_at", "u.created_at"),
        field("updated_at", "u.updated_at"),
    ],
    search: &["u.username", "u.email", "u.code"],
    sortable: &[
        field("username", "u.username"),
        field("email", "u.email"),
        field("last_login_at", "u.last_login_at"),
        field("created_at", "u.created_at"),
        field("updated_at", "u.updated_at"),
    ],
    default_sort: "created_at",
    relations: &[
        Relation {
            key: "role",
            join: Some("LEFT JOIN roles r ON r.id = u.role_id"),
            expr: "CASE WHEN r.id IS NULL THEN NULL ELSE jsonb_build_object('id', r.id, 'code', r.code, 'name', r.name) END",
        },
        Relation {
            key: "profile",
            join: Some("LEFT JOIN profiles pf ON pf.user_id = u.id"),
            expr: "CASE WHEN pf.id IS NULL THEN NULL ELSE jsonb_build_object('id', pf.id, 'code', pf.code, 'first_name', pf.first_name, 'last_name', pf.last_name, 'avatar_url', pf.avatar_url) END",
        },
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_is_never_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            code: EntityKind::User.new_code(),
            username: "bursar".to_string(),
            email: "bursar@school.test".to_string(),
            password_hash: "$2b$04$secret".to_string(),
            role_id: Uuid::new_v4(),
            is_active: true,
            allow_deletion: true,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "bursar");
    }

    #[test]
    fn test_create_dto_validation() {
        let dto = CreateUserDto {
            username: "ab".to_string(),
            email: "not-an-email".to_string(),
            password: "short".to_string(),
            role_id: Uuid::new_v4(),
            is_active: None,
            allow_deletion: None,
        };

        let errors = dto.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("username"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }
}
