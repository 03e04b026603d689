use anyhow::anyhow;
use schoolyard_core::codes::EntityKey;
use schoolyard_core::{AppError, EntityKind, ListParams, Page};
use schoolyard_db::{
    Filters, ListQuery, db_error, ensure_unreferenced, fetch_by_key, fetch_document, fetch_page,
};
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use uuid::Uuid;

use crate::modules::audit_logs::model::ActorSnapshot;
use crate::modules::audit_logs::service::AuditService;
use crate::modules::shared::{clean, clean_optional, merge_optional, not_found};

use super::model::{
    CreatePermissionDto, PERMISSION_LIST, Permission, PermissionFilterParams, SELECT_PERMISSION,
    UpdatePermissionDto, parse_permission_name,
};

const RETURNING: &str = " RETURNING id, code, name, description, module, created_at, updated_at";

/// Normalises a permission name, returning it with its resource part.
fn permission_name(raw: &str) -> Result<(String, String), AppError> {
    let name = raw.trim().to_string();
    let (resource, _) = parse_permission_name(&name).ok_or_else(|| {
        AppError::bad_request(anyhow!("name must have the form resource:action"))
    })?;
    let resource = resource.to_string();
    Ok((name, resource))
}

pub struct PermissionService;

impl PermissionService {
    async fn ensure_name_available(
        conn: &mut PgConnection,
        name: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), AppError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM permissions WHERE name = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(name)
        .bind(exclude)
        .fetch_one(&mut *conn)
        .await?;

        if taken {
            return Err(AppError::conflict(anyhow!(
                "Permission with this name already exists"
            )));
        }
        Ok(())
    }

    #[instrument(skip(db, actor, dto), fields(db.operation = "INSERT", db.table = "permissions"))]
    pub async fn create(
        db: &PgPool,
        actor: &ActorSnapshot,
        dto: CreatePermissionDto,
    ) -> Result<Permission, AppError> {
        let (name, resource) = permission_name(&dto.name)?;
        let module = dto
            .module
            .as_deref()
            .map(|v| clean("module", v))
            .transpose()?
            .unwrap_or(resource);
        let mut tx = db.begin().await?;

        Self::ensure_name_available(&mut tx, &name, None).await?;

        let permission = sqlx::query_as::<_, Permission>(&format!(
            "INSERT INTO permissions (code, name, description, module) VALUES ($1, $2, $3, $4){}",
            RETURNING
        ))
        .bind(EntityKind::Permission.new_code())
        .bind(&name)
        .bind(clean_optional(dto.description))
        .bind(&module)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::Permission))?;

        AuditService::created(&mut tx, actor, &permission).await?;
        tx.commit().await?;

        Ok(permission)
    }

    #[instrument(skip(db, params), fields(db.operation = "SELECT", db.table = "permissions"))]
    pub async fn list(
        db: &PgPool,
        params: &ListParams,
        filters: PermissionFilterParams,
    ) -> Result<Page<Value>, AppError> {
        let filters = Filters::new()
            .text("module", filters.module.as_deref())
            .into_vec();
        let query = ListQuery::new(&PERMISSION_LIST, params, filters)?;
        fetch_page(db, &query).await
    }

    #[instrument(skip(db), fields(db.operation = "SELECT", db.table = "permissions"))]
    pub async fn get(db: &PgPool, key: &EntityKey, populate: bool) -> Result<Value, AppError> {
        fetch_document(db, &PERMISSION_LIST, key, populate).await
    }

    #[instrument(skip(db, actor, dto), fields(db.operation = "UPDATE", db.table = "permissions"))]
    pub async fn update(
        db: &PgPool,
        actor: &ActorSnapshot,
        key: &EntityKey,
        dto: UpdatePermissionDto,
    ) -> Result<Permission, AppError> {
        let mut tx = db.begin().await?;

        let before: Permission = fetch_by_key(&mut *tx, SELECT_PERMISSION, key, true)
            .await?
            .ok_or_else(|| not_found(EntityKind::Permission))?;

        let name = match dto.name.as_deref() {
            Some(raw) => permission_name(raw)?.0,
            None => before.name.clone(),
        };
        Self::ensure_name_available(&mut tx, &name, Some(before.id)).await?;

        let module = dto
            .module
            .as_deref()
            .map(|v| clean("module", v))
            .transpose()?
            .unwrap_or_else(|| before.module.clone());

        let after = sqlx::query_as::<_, Permission>(&format!(
            "UPDATE permissions SET name = $2, description = $3, module = $4 WHERE id = $1{}",
            RETURNING
        ))
        .bind(before.id)
        .bind(&name)
        .bind(merge_optional(dto.description, before.description.clone()))
        .bind(&module)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::Permission))?;

        AuditService::updated(&mut tx, actor, &before, &after).await?;
        tx.commit().await?;

        Ok(after)
    }

    #[instrument(skip(db, actor), fields(db.operation = "DELETE", db.table = "permissions"))]
    pub async fn delete(
        db: &PgPool,
        actor: &ActorSnapshot,
        key: &EntityKey,
    ) -> Result<Permission, AppError> {
        let mut tx = db.begin().await?;

        let permission: Permission = fetch_by_key(&mut *tx, SELECT_PERMISSION, key, true)
            .await?
            .ok_or_else(|| not_found(EntityKind::Permission))?;

        ensure_unreferenced(&mut tx, EntityKind::Permission, permission.id).await?;

        sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(permission.id)
            .execute(&mut *tx)
            .await
            .map_err(db_error(EntityKind::Permission))?;

        AuditService::deleted(&mut tx, actor, &permission).await?;
        tx.commit().await?;

        Ok(permission)
    }
}
