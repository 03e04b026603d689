use anyhow::anyhow;
use schoolyard_core::codes::EntityKey;
use schoolyard_core::{AppError, EntityKind, ListParams, Page};
use schoolyard_db::{
    Filters, ListQuery, db_error, ensure_exists, ensure_unreferenced, fetch_by_key,
    fetch_document, fetch_page,
};
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use uuid::Uuid;

use crate::modules::audit_logs::model::ActorSnapshot;
use crate::modules::audit_logs::service::AuditService;
use crate::modules::shared::{clean, not_found};

use super::model::{
    CreateSectionDto, SECTION_LIST, SELECT_SECTION, Section, SectionFilterParams,
    UpdateSectionDto,
};

const RETURNING: &str = " RETURNING id, code, name, class_id, capacity, created_at, updated_at";

pub struct SectionService;

impl SectionService {
    async fn ensure_name_available(
        conn: &mut PgConnection,
        class_id: Uuid,
        name: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), AppError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM sections
                WHERE class_id = $1 AND LOWER(name) = LOWER($2) AND ($3::uuid IS NULL OR id <> $3)
            )",
        )
        .bind(class_id)
        .bind(name)
        .bind(exclude)
        .fetch_one(&mut *conn)
        .await?;

        if taken {
            return Err(AppError::conflict(anyhow!(
                "Section with this name already exists in the class"
            )));
        }
        Ok(())
    }

    #[instrument(skip(db, actor, dto), fields(db.operation = "INSERT", db.table = "sections"))]
    pub async fn create(
        db: &PgPool,
        actor: &ActorSnapshot,
        dto: CreateSectionDto,
    ) -> Result<Section, AppError> {
        let name = clean("name", &dto.name)?;
        let mut tx = db.begin().await?;

        ensure_exists(&mut *tx, EntityKind::Class, dto.class_id).await?;
        Self::ensure_name_available(&mut tx, dto.class_id, &name, None).await?;

        let section = sqlx::query_as::<_, Section>(&format!(
            "INSERT INTO sections (code, name, class_id, capacity) VALUES ($1, $2, $3, $4){}",
            RETURNING
        ))
        .bind(EntityKind::Section.new_code())
        .bind(&name)
        .bind(dto.class_id)
        .bind(dto.capacity)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::Section))?;

        AuditService::created(&mut tx, actor, &section).await?;
        tx.commit().await?;

        Ok(section)
    }

    #[instrument(skip(db, params), fields(db.operation = "SELECT", db.table = "sections"))]
    pub async fn list(
        db: &PgPool,
        params: &ListParams,
        filters: SectionFilterParams,
    ) -> Result<Page<Value>, AppError> {
        let filters = Filters::new().uuid("class_id", filters.class_id).into_vec();
        let query = ListQuery::new(&SECTION_LIST, params, filters)?;
        fetch_page(db, &query).await
    }

    #[instrument(skip(db), fields(db.operation = "SELECT", db.table = "sections"))]
    pub async fn get(db: &PgPool, key: &EntityKey, populate: bool) -> Result<Value, AppError> {
        fetch_document(db, &SECTION_LIST, key, populate).await
    }

    #[instrument(skip(db, actor, dto), fields(db.operation = "UPDATE", db.table = "sections"))]
    pub async fn update(
        db: &PgPool,
        actor: &ActorSnapshot,
        key: &EntityKey,
        dto: UpdateSectionDto,
    ) -> Result<Section, AppError> {
        let mut tx = db.begin().await?;

        let before: Section = fetch_by_key(&mut *tx, SELECT_SECTION, key, true)
            .await?
            .ok_or_else(|| not_found(EntityKind::Section))?;

        let name = dto
            .name
            .as_deref()
            .map(|v| clean("name", v))
            .transpose()?
            .unwrap_or_else(|| before.name.clone());
        let class_id = dto.class_id.unwrap_or(before.class_id);

        if class_id != before.class_id {
            ensure_exists(&mut *tx, EntityKind::Class, class_id).await?;

            let has_students: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM students WHERE section_id = $1)")
                    .bind(before.id)
                    .fetch_one(&mut *tx)
                    .await?;
            if has_students {
                return Err(AppError::conflict(anyhow!(
                    "Section has students and cannot be moved to another class"
                )));
            }
        }
        Self::ensure_name_available(&mut tx, class_id, &name, Some(before.id)).await?;

        let after = sqlx::query_as::<_, Section>(&format!(
            "UPDATE sections SET name = $2, class_id = $3, capacity = $4 WHERE id = $1{}",
            RETURNING
        ))
        .bind(before.id)
        .bind(&name)
        .bind(class_id)
        .bind(dto.capacity.or(before.capacity))
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::Section))?;

        AuditService::updated(&mut tx, actor, &before, &after).await?;
        tx.commit().await?;

        Ok(after)
    }

    #[instrument(skip(db, actor), fields(db.operation = "DELETE", db.table = "sections"))]
    pub async fn delete(
        db: &PgPool,
        actor: &ActorSnapshot,
        key: &EntityKey,
    ) -> Result<Section, AppError> {
        let mut tx = db.begin().await?;

        let section: Section = fetch_by_key(&mut *tx, SELECT_SECTION, key, true)
            .await?
            .ok_or_else(|| not_found(EntityKind::Section))?;

        ensure_unreferenced(&mut tx, EntityKind::Section, section.id).await?;

        sqlx::query("DELETE FROM sections WHERE id = $1")
            .bind(section.id)
            .execute(&mut *tx)
            .await
            .map_err(db_error(EntityKind::Section))?;

        AuditService::deleted(&mut tx, actor, &section).await?;
        tx.commit().await?;

        Ok(section)
    }
}
