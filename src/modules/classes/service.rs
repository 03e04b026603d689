use anyhow::anyhow;
use schoolyard_core::codes::EntityKey;
use schoolyard_core::{AppError, EntityKind, ListParams, Page};
use schoolyard_db::{
    ListQuery, db_error, ensure_unreferenced, fetch_by_key, fetch_document, fetch_page,
};
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use uuid::Uuid;

use crate::modules::audit_logs::model::ActorSnapshot;
use crate::modules::audit_logs::service::AuditService;
use crate::modules::shared::{clean, clean_optional, merge_optional, not_found};

use super::model::{CLASS_LIST, Class, CreateClassDto, SELECT_CLASS, UpdateClassDto};

const RETURNING: &str = " RETURNING id, code, name, description, created_at, updated_at";

pub struct ClassService;

impl ClassService {
    async fn ensure_name_available(
        conn: &mut PgConnection,
        name: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), AppError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM classes
                WHERE LOWER(name) = LOWER($1) AND ($2::uuid IS NULL OR id <> $2)
            )",
        )
        .bind(name)
        .bind(exclude)
        .fetch_one(&mut *conn)
        .await?;

        if taken {
            return Err(AppError::conflict(anyhow!(
                "Class with this name already exists"
            )));
        }
        Ok(())
    }

    #[instrument(skip(db, actor, dto), fields(db.operation = "INSERT", db.table = "classes"))]
    pub async fn create(
        db: &PgPool,
        actor: &ActorSnapshot,
        dto: CreateClassDto,
    ) -> Result<Class, AppError> {
        let name = clean("name", &dto.name)?;
        let mut tx = db.begin().await?;

        Self::ensure_name_available(&mut tx, &name, None).await?;

        let class = sqlx::query_as::<_, Class>(&format!(
            "INSERT INTO classes (code, name, description) VALUES ($1, $2, $3){}",
            RETURNING
        ))
        .bind(EntityKind::Class.new_code())
        .bind(&name)
        .bind(clean_optional(dto.description))
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::Class))?;

        AuditService::created(&mut tx, actor, &class).await?;
        tx.commit().await?;

        Ok(class)
    }

    #[instrument(skip(db, params), fields(db.operation = "SELECT", db.table = "classes"))]
    pub async fn list(db: &PgPool, params: &ListParams) -> Result<Page<Value>, AppError> {
        let query = ListQuery::new(&CLASS_LIST, params, Vec::new())?;
        fetch_page(db, &query).await
    }

    #[instrument(skip(db), fields(db.operation = "SELECT", db.table = "classes"))]
    pub async fn get(db: &PgPool, key: &EntityKey, populate: bool) -> Result<Value, AppError> {
        fetch_document(db, &CLASS_LIST, key, populate).await
    }

    #[instrument(skip(db, actor, dto), fields(db.operation = "UPDATE", db.table = "classes"))]
    pub async fn update(
        db: &PgPool,
        actor: &ActorSnapshot,
        key: &EntityKey,
        dto: UpdateClassDto,
    ) -> Result<Class, AppError> {
        let mut tx = db.begin().await?;

        let before: Class = fetch_by_key(&mut *tx, SELECT_CLASS, key, true)
            .await?
            .ok_or_else(|| not_found(EntityKind::Class))?;

        let name = dto
            .name
            .as_deref()
            .map(|v| clean("name", v))
            .transpose()?
            .unwrap_or_else(|| before.name.clone());
        Self::ensure_name_available(&mut tx, &name, Some(before.id)).await?;

        let after = sqlx::query_as::<_, Class>(&format!(
            "UPDATE classes SET name = $2, description = $3 WHERE id = $1{}",
            RETURNING
        ))
        .bind(before.id)
        .bind(&name)
        .bind(merge_optional(dto.description, before.description.clone()))
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::Class))?;

        AuditService::updated(&mut tx, actor, &before, &after).await?;
        tx.commit().await?;

        Ok(after)
    }

    #[instrument(skip(db, actor), fields(db.operation = "DELETE", db.table = "classes"))]
    pub async fn delete(
        db: &PgPool,
        actor: &ActorSnapshot,
        key: &EntityKey,
    ) -> Result<Class, AppError> {
        let mut tx = db.begin().await?;

        let class: Class = fetch_by_key(&mut *tx, SELECT_CLASS, key, true)
            .await?
            .ok_or_else(|| not_found(EntityKind::Class))?;

        ensure_unreferenced(&mut tx, EntityKind::Class, class.id).await?;

        sqlx::query("DELETE FROM classes WHERE id = $1")
            .bind(class.id)
            .execute(&mut *tx)
            .await
            .map_err(db_error(EntityKind::Class))?;

        AuditService::deleted(&mut tx, actor, &class).await?;
        tx.commit().await?;

        Ok(class)
    }
}
