use anyhow::anyhow;
use schoolyard_core::codes::EntityKey;
use schoolyard_core::{AppError, EntityKind, ListParams, Page, hash_password};
use schoolyard_db::{
    Filters, ListQuery, db_error, ensure_exists, ensure_unreferenced, fetch_by_key,
    fetch_document, fetch_page,
};
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::modules::audit_logs::model::ActorSnapshot;
use crate::modules::audit_logs::service::{AuditEntry, AuditService};
use crate::modules::auth::session::SessionService;
use crate::modules::shared::{clean, deletion_flag, not_found};

use super::model::{
    CreateUserDto, RETURNING_USER, ResetPasswordDto, SELECT_USER, USER_LIST, UpdateUserDto, User,
    UserFilterParams,
};

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct UserService;

impl UserService {
    async fn ensure_identity_available(
        conn: &mut PgConnection,
        username: &str,
        email: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), AppError> {
        let (username_taken, email_taken): (bool, bool) = sqlx::query_as(
            "SELECT
                EXISTS(SELECT 1 FROM users WHERE LOWER(username) = LOWER($1) AND ($3::uuid IS NULL OR id <> $3)),
                EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($2) AND ($3::uuid IS NULL OR id <> $3))",
        )
        .bind(username)
        .bind(email)
        .bind(exclude)
        .fetch_one(&mut *conn)
        .await?;

        if username_taken {
            return Err(AppError::conflict(anyhow!("Username is already taken")));
        }
        if email_taken {
            return Err(AppError::conflict(anyhow!("Email is already in use")));
        }
        Ok(())
    }

    async fn load(conn: &mut PgConnection, key: &EntityKey) -> Result<User, AppError> {
        fetch_by_key(&mut *conn, SELECT_USER, key, true)
            .await?
            .ok_or_else(|| not_found(EntityKind::User))
    }

    #[instrument(skip(db, actor, dto), fields(db.operation = "INSERT", db.table = "users"))]
    pub async fn create(
        db: &PgPool,
        actor: &ActorSnapshot,
        dto: CreateUserDto,
    ) -> Result<User, AppError> {
        let username = clean("username", &dto.username)?;
        let email = normalize_email(&dto.email);
        let password_hash = hash_password(&dto.password)?;

        let mut tx = db.begin().await?;

        ensure_exists(&mut *tx, EntityKind::Role, dto.role_id).await?;
        Self::ensure_identity_available(&mut tx, &username, &email, None).await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (code, username, email, password_hash, role_id, is_active, allow_deletion)
             VALUES ($1, $2, $3, $4, $5, $6, $7){}",
            RETURNING_USER
        ))
        .bind(EntityKind::User.new_code())
        .bind(&username)
        .bind(&email)
        .bind(&password_hash)
        .bind(dto.role_id)
        .bind(dto.is_active.unwrap_or(true))
        .bind(dto.allow_deletion.unwrap_or(true))
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::User))?;

        AuditService::created(&mut tx, actor, &user).await?;
        tx.commit().await?;

        Ok(user)
    }

    #[instrument(skip(db, params, filters), fields(db.operation = "SELECT", db.table = "users"))]
    pub async fn list(
        db: &PgPool,
        params: &ListParams,
        filters: UserFilterParams,
    ) -> Result<Page<Value>, AppError> {
        let filters = Filters::new()
            .uuid("role_id", filters.role_id)
            .boolean("is_active", filters.is_active)
            .into_vec();
        let query = ListQuery::new(&USER_LIST, params, filters)?;
        fetch_page(db, &query).await
    }

    #[instrument(skip(db), fields(db.operation = "SELECT", db.table = "users"))]
    pub async fn get(db: &PgPool, key: &EntityKey, populate: bool) -> Result<Value, AppError> {
        fetch_document(db, &USER_LIST, key, populate).await
    }

    #[instrument(skip(db, actor, dto), fields(db.operation = "UPDATE", db.table = "users"))]
    pub async fn update(
        db: &PgPool,
        actor: &ActorSnapshot,
        key: &EntityKey,
        dto: UpdateUserDto,
    ) -> Result<User, AppError> {
        let mut tx = db.begin().await?;
        let before = Self::load(&mut tx, key).await?;

        let username = dto
            .username
            .as_deref()
            .map(|v| clean("username", v))
            .transpose()?
            .unwrap_or_else(|| before.username.clone());
        let email = dto
            .email
            .as_deref()
            .map(normalize_email)
            .unwrap_or_else(|| before.email.clone());
        let role_id = dto.role_id.unwrap_or(before.role_id);
        let is_active = dto.is_active.unwrap_or(before.is_active);
        let allow_deletion = deletion_flag(before.allow_deletion, dto.allow_deletion)?;

        if actor.id == Some(before.id) && !is_active {
            return Err(AppError::forbidden("You cannot deactivate your own account"));
        }
        if role_id != before.role_id {
            ensure_exists(&mut *tx, EntityKind::Role, role_id).await?;
        }
        Self::ensure_identity_available(&mut tx, &username, &email, Some(before.id)).await?;

        let after = sqlx::query_as::<_, User>(&format!(
            "UPDATE users
             SET username = $2, email = $3, role_id = $4, is_active = $5, allow_deletion = $6
             WHERE id = $1{}",
            RETURNING_USER
        ))
        .bind(before.id)
        .bind(&username)
        .bind(&email)
        .bind(role_id)
        .bind(is_active)
        .bind(allow_deletion)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::User))?;

        if before.is_active && !after.is_active {
            let revoked = SessionService::revoke_all_for_user(&mut tx, after.id, None).await?;
            info!(user.id = %after.id, revoked, "User deactivated; sessions revoked");
        }

        AuditService::updated(&mut tx, actor, &before, &after).await?;
        tx.commit().await?;

        Ok(after)
    }

    /// Sets a new password on behalf of the user and signs them out everywhere.
    #[instrument(skip(db, actor, dto), fields(db.operation = "UPDATE", db.table = "users"))]
    pub async fn reset_password(
        db: &PgPool,
        actor: &ActorSnapshot,
        key: &EntityKey,
        dto: ResetPasswordDto,
    ) -> Result<User, AppError> {
        let password_hash = hash_password(&dto.new_password)?;

        let mut tx = db.begin().await?;
        let before = Self::load(&mut tx, key).await?;

        let after = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET password_hash = $2 WHERE id = $1{}",
            RETURNING_USER
        ))
        .bind(before.id)
        .bind(&password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::User))?;

        SessionService::revoke_all_for_user(&mut tx, after.id, None).await?;

        let entry = AuditEntry::updated(&before, &after)?
            .with_label(format!("Reset password for user {}", after.username));
        AuditService::record(&mut tx, actor, entry).await?;
        tx.commit().await?;

        info!(user.id = %after.id, "Password reset by administrator");
        Ok(after)
    }

    #[instrument(skip(db, actor), fields(db.operation = "DELETE", db.table = "users"))]
    pub async fn delete(
        db: &PgPool,
        actor: &ActorSnapshot,
        key: &EntityKey,
    ) -> Result<User, AppError> {
        let mut tx = db.begin().await?;
        let user = Self::load(&mut tx, key).await?;

        if actor.id == Some(user.id) {
            return Err(AppError::forbidden("You cannot delete your own account"));
        }
        if !user.allow_deletion {
            return Err(AppError::forbidden("This user cannot be deleted"));
        }
        ensure_unreferenced(&mut tx, EntityKind::User, user.id).await?;

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user.id)
            .execute(&mut *tx)
            .await
            .map_err(db_error(EntityKind::User))?;

        AuditService::deleted(&mut tx, actor, &user).await?;
        tx.commit().await?;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Head.Teacher@School.TEST "), "head.teacher@school.test");
    }
}
