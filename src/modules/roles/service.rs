use std::collections::BTreeSet;

use anyhow::anyhow;
use schoolyard_core::codes::EntityKey;
use schoolyard_core::{AppError, EntityKind, ListParams, Page};
use schoolyard_db::{
    ListQuery, db_error, ensure_unreferenced, fetch_by_key, fetch_document, fetch_page,
};
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::modules::audit_logs::model::ActorSnapshot;
use crate::modules::audit_logs::service::AuditService;
use crate::modules::shared::{clean, clean_optional, deletion_flag, merge_optional, not_found};

use super::model::{
    CreateRoleDto, PermissionSummary, ROLE_LIST, Role, RoleWithPermissions, SELECT_ROLE,
    SetRolePermissionsDto, UpdateRoleDto,
};

const RETURNING: &str =
    " RETURNING id, code, name, description, allow_deletion, created_at, updated_at";

/// Drops duplicate ids while keeping the result deterministic.
fn unique_ids(ids: &[Uuid]) -> Vec<Uuid> {
    ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
}

pub struct RoleService;

impl RoleService {
    async fn ensure_name_available(
        conn: &mut PgConnection,
        name: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), AppError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM roles
                WHERE LOWER(name) = LOWER($1) AND ($2::uuid IS NULL OR id <> $2)
            )",
        )
        .bind(name)
        .bind(exclude)
        .fetch_one(&mut *conn)
        .await?;

        if taken {
            return Err(AppError::conflict(anyhow!(
                "Role with this name already exists"
            )));
        }
        Ok(())
    }

    pub async fn permissions_of(
        conn: &mut PgConnection,
        role_id: Uuid,
    ) -> Result<Vec<PermissionSummary>, AppError> {
        let permissions = sqlx::query_as::<_, PermissionSummary>(
            "SELECT p.id, p.code, p.name
             FROM permissions p
             JOIN role_permissions rp ON rp.permission_id = p.id
             WHERE rp.role_id = $1
             ORDER BY p.name",
        )
        .bind(role_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(permissions)
    }

    /// Replaces the role's grants with `permission_ids`, all of which must exist.
    async fn replace_permissions(
        conn: &mut PgConnection,
        role_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<(), AppError> {
        let ids = unique_ids(permission_ids);

        let found: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM permissions WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_one(&mut *conn)
            .await?;
        if found != ids.len() as i64 {
            return Err(AppError::bad_request(anyhow!(
                "One or more permission IDs are invalid"
            )));
        }

        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id)
             SELECT $1, UNNEST($2::uuid[])",
        )
        .bind(role_id)
        .bind(&ids)
        .execute(&mut *conn)
        .await?;

        debug!(role.id = %role_id, granted = ids.len(), "Role permissions replaced");
        Ok(())
    }

    async fn load_for_update(
        conn: &mut PgConnection,
        key: &EntityKey,
    ) -> Result<RoleWithPermissions, AppError> {
        let role: Role = fetch_by_key(&mut *conn, SELECT_ROLE, key, true)
            .await?
            .ok_or_else(|| not_found(EntityKind::Role))?;
        let permissions = Self::permissions_of(conn, role.id).await?;
        Ok(RoleWithPermissions { role, permissions })
    }

    #[instrument(skip(db, actor, dto), fields(db.operation = "INSERT", db.table = "roles"))]
    pub async fn create(
        db: &PgPool,
        actor: &ActorSnapshot,
        dto: CreateRoleDto,
    ) -> Result<RoleWithPermissions, AppError> {
        let name = clean("name", &dto.name)?;
        let mut tx = db.begin().await?;

        Self::ensure_name_available(&mut tx, &name, None).await?;

        let role = sqlx::query_as::<_, Role>(&format!(
            "INSERT INTO roles (code, name, description, allow_deletion) VALUES ($1, $2, $3, $4){}",
            RETURNING
        ))
        .bind(EntityKind::Role.new_code())
        .bind(&name)
        .bind(clean_optional(dto.description))
        .bind(dto.allow_deletion.unwrap_or(true))
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::Role))?;

        if let Some(permission_ids) = dto.permission_ids.as_deref() {
            Self::replace_permissions(&mut tx, role.id, permission_ids).await?;
        }
        let permissions = Self::permissions_of(&mut tx, role.id).await?;
        let created = RoleWithPermissions { role, permissions };

        AuditService::created(&mut tx, actor, &created).await?;
        tx.commit().await?;

        Ok(created)
    }

    #[instrument(skip(db, params), fields(db.operation = "SELECT", db.table = "roles"))]
    pub async fn list(db: &PgPool, params: &ListParams) -> Result<Page<Value>, AppError> {
        let query = ListQuery::new(&ROLE_LIST, params, Vec::new())?;
        fetch_page(db, &query).await
    }

    #[instrument(skip(db), fields(db.operation = "SELECT", db.table = "roles"))]
    pub async fn get(db: &PgPool, key: &EntityKey, populate: bool) -> Result<Value, AppError> {
        fetch_document(db, &ROLE_LIST, key, populate).await
    }

    #[instrument(skip(db, actor, dto), fields(db.operation = "UPDATE", db.table = "roles"))]
    pub async fn update(
        db: &PgPool,
        actor: &ActorSnapshot,
        key: &EntityKey,
        dto: UpdateRoleDto,
    ) -> Result<RoleWithPermissions, AppError> {
        let mut tx = db.begin().await?;
        let before = Self::load_for_update(&mut tx, key).await?;

        let name = dto
            .name
            .as_deref()
            .map(|v| clean("name", v))
            .transpose()?
            .unwrap_or_else(|| before.role.name.clone());
        Self::ensure_name_available(&mut tx, &name, Some(before.role.id)).await?;
        let allow_deletion = deletion_flag(before.role.allow_deletion, dto.allow_deletion)?;

        let role = sqlx::query_as::<_, Role>(&format!(
            "UPDATE roles SET name = $2, description = $3, allow_deletion = $4 WHERE id = $1{}",
            RETURNING
        ))
        .bind(before.role.id)
        .bind(&name)
        .bind(merge_optional(dto.description, before.role.description.clone()))
        .bind(allow_deletion)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::Role))?;

        let after = RoleWithPermissions {
            role,
            permissions: before.permissions.clone(),
        };

        AuditService::updated(&mut tx, actor, &before, &after).await?;
        tx.commit().await?;

        Ok(after)
    }

    #[instrument(skip(db, actor, dto), fields(db.operation = "UPDATE", db.table = "role_permissions"))]
    pub async fn set_permissions(
        db: &PgPool,
        actor: &ActorSnapshot,
        key: &EntityKey,
        dto: SetRolePermissionsDto,
    ) -> Result<RoleWithPermissions, AppError> {
        let mut tx = db.begin().await?;
        let before = Self::load_for_update(&mut tx, key).await?;

        Self::replace_permissions(&mut tx, before.role.id, &dto.permission_ids).await?;

        // touch updated_at so the role reflects the change
        let role = sqlx::query_as::<_, Role>(&format!(
            "UPDATE roles SET updated_at = NOW() WHERE id = $1{}",
            RETURNING
        ))
        .bind(before.role.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::Role))?;

        let permissions = Self::permissions_of(&mut tx, role.id).await?;
        let after = RoleWithPermissions { role, permissions };

        AuditService::updated(&mut tx, actor, &before, &after).await?;
        tx.commit().await?;

        Ok(after)
    }

    #[instrument(skip(db, actor), fields(db.operation = "DELETE", db.table = "roles"))]
    pub async fn delete(
        db: &PgPool,
        actor: &ActorSnapshot,
        key: &EntityKey,
    ) -> Result<RoleWithPermissions, AppError> {
        let mut tx = db.begin().await?;
        let role = Self::load_for_update(&mut tx, key).await?;

        if !role.role.allow_deletion {
            return Err(AppError::forbidden("This role cannot be deleted"));
        }
        ensure_unreferenced(&mut tx, EntityKind::Role, role.role.id).await?;

        sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(role.role.id)
            .execute(&mut *tx)
            .await
            .map_err(db_error(EntityKind::Role))?;

        AuditService::deleted(&mut tx, actor, &role).await?;
        tx.commit().await?;

        Ok(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ids = unique_ids(&[a, b, a, a]);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a) && ids.contains(&b));
    }

    #[test]
    fn test_permission_change_shows_in_audit_label() {
        use crate::modules::audit_logs::service::AuditEntry;
        use chrono::Utc;

        let role = Role {
            id: Uuid::new_v4(),
            code: EntityKind::Role.new_code(),
            name: "Registrar".to_string(),
            description: None,
            allow_deletion: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let before = RoleWithPermissions {
            role: role.clone(),
            permissions: Vec::new(),
        };
        let after = RoleWithPermissions {
            role,
            permissions: vec![PermissionSummary {
                id: Uuid::new_v4(),
                code: EntityKind::Permission.new_code(),
                name: "students:read".to_string(),
            }],
        };

        let entry = AuditEntry::updated(&before, &after).unwrap();
        assert_eq!(entry.label, "Updated role Registrar (permissions)");
        assert_eq!(entry.after.unwrap()["name"], "Registrar");
    }
}
