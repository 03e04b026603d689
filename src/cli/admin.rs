use anyhow::bail;
use schoolyard_core::{EntityKind, hash_password};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::modules::users::service::normalize_email;

pub const SUPER_ADMIN_ROLE: &str = "Super Admin";

#[derive(Debug, Validate)]
pub struct NewAdmin {
    #[validate(length(min = 3, max = 50, message = "username must be between 3 and 50 characters"))]
    pub username: String,
    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "password must be between 8 and 128 characters"))]
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct CreatedAdmin {
    pub user_id: Uuid,
    pub code: String,
    pub role_id: Uuid,
    pub granted_permissions: u64,
}

/// Finds the super admin role, creating it undeletable when missing.
async fn ensure_super_admin_role(conn: &mut PgConnection) -> anyhow::Result<Uuid> {
    let existing: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM roles WHERE LOWER(name) = LOWER($1)")
            .bind(SUPER_ADMIN_ROLE)
            .fetch_optional(&mut *conn)
            .await?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let id = sqlx::query_scalar(
        "INSERT INTO roles (code, name, description, allow_deletion)
         VALUES ($1, $2, $3, FALSE)
         RETURNING id",
    )
    .bind(EntityKind::Role.new_code())
    .bind(SUPER_ADMIN_ROLE)
    .bind("Full access to every resource")
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

/// Creates an undeletable admin user holding the super admin role, and
/// grants that role every permission currently in the table.
pub async fn create_admin(db: &PgPool, admin: NewAdmin) -> anyhow::Result<CreatedAdmin> {
    admin.validate()?;

    let username = admin.username.trim().to_string();
    let email = normalize_email(&admin.email);
    let password_hash = hash_password(&admin.password).map_err(|e| e.error)?;

    let mut tx = db.begin().await?;

    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = LOWER($1) OR LOWER(email) = LOWER($2))",
    )
    .bind(&username)
    .bind(&email)
    .fetch_one(&mut *tx)
    .await?;

    if taken {
        bail!("A user with this username or email already exists");
    }

    let role_id = ensure_super_admin_role(&mut tx).await?;

    let granted_permissions = sqlx::query(
        "INSERT INTO role_permissions (role_id, permission_id)
         SELECT $1, id FROM permissions
         ON CONFLICT DO NOTHING",
    )
    .bind(role_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let code = EntityKind::User.new_code();
    let user_id = sqlx::query_scalar(
        "INSERT INTO users (code, username, email, password_hash, role_id, is_active, allow_deletion)
         VALUES ($1, $2, $3, $4, $5, TRUE, FALSE)
         RETURNING id",
    )
    .bind(&code)
    .bind(&username)
    .bind(&email)
    .bind(password_hash)
    .bind(role_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(CreatedAdmin {
        user_id,
        code,
        role_id,
        granted_permissions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_admin_validation() {
        let admin = NewAdmin {
            username: "root".to_string(),
            email: "root@school.test".to_string(),
            password: "long-enough".to_string(),
        };
        assert!(admin.validate().is_ok());

        let admin = NewAdmin {
            username: "ab".to_string(),
            email: "nope".to_string(),
            password: "short".to_string(),
        };
        let errors = admin.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("username"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }
}
