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
use crate::modules::shared::{clean, clean_optional, merge_optional, not_found};

use super::model::{
    CreateSubjectDto, SELECT_SUBJECT, SUBJECT_LIST, Subject, SubjectFilterParams,
    UpdateSubjectDto,
};

const RETURNING: &str =
    " RETURNING id, code, name, subject_code, class_id, created_at, updated_at";

pub struct SubjectService;

impl SubjectService {
    async fn ensure_name_available(
        conn: &mut PgConnection,
        class_id: Uuid,
        name: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), AppError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM subjects
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
                "Subject with this name already exists in the class"
            )));
        }
        Ok(())
    }

    #[instrument(skip(db, actor, dto), fields(db.operation = "INSERT", db.table = "subjects"))]
    pub async fn create(
        db: &PgPool,
        actor: &ActorSnapshot,
        dto: CreateSubjectDto,
    ) -> Result<Subject, AppError> {
        let name = clean("name", &dto.name)?;
        let mut tx = db.begin().await?;

        ensure_exists(&mut *tx, EntityKind::Class, dto.class_id).await?;
        Self::ensure_name_available(&mut tx, dto.class_id, &name, None).await?;

        let subject = sqlx::query_as::<_, Subject>(&format!(
            "INSERT INTO subjects (code, name, subject_code, class_id) VALUES ($1, $2, $3, $4){}",
            RETURNING
        ))
        .bind(EntityKind::Subject.new_code())
        .bind(&name)
        .bind(clean_optional(dto.subject_code).map(|c| c.to_ascii_uppercase()))
        .bind(dto.class_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::Subject))?;

        AuditService::created(&mut tx, actor, &subject).await?;
        tx.commit().await?;

        Ok(subject)
    }

    #[instrument(skip(db, params), fields(db.operation = "SELECT", db.table = "subjects"))]
    pub async fn list(
        db: &PgPool,
        params: &ListParams,
        filters: SubjectFilterParams,
    ) -> Result<Page<Value>, AppError> {
        let filters = Filters::new().uuid("class_id", filters.class_id).into_vec();
        let query = ListQuery::new(&SUBJECT_LIST, params, filters)?;
        fetch_page(db, &query).await
    }

    #[instrument(skip(db), fields(db.operation = "SELECT", db.table = "subjects"))]
    pub async fn get(db: &PgPool, key: &EntityKey, populate: bool) -> Result<Value, AppError> {
        fetch_document(db, &SUBJECT_LIST, key, populate).await
    }

    #[instrument(skip(db, actor, dto), fields(db.operation = "UPDATE", db.table = "subjects"))]
    pub async fn update(
        db: &PgPool,
        actor: &ActorSnapshot,
        key: &EntityKey,
        dto: UpdateSubjectDto,
    ) -> Result<Subject, AppError> {
        let mut tx = db.begin().await?;

        let before: Subject = fetch_by_key(&mut *tx, SELECT_SUBJECT, key, true)
            .await?
            .ok_or_else(|| not_found(EntityKind::Subject))?;

        let name = dto
            .name
            .as_deref()
            .map(|v| clean("name", v))
            .transpose()?
            .unwrap_or_else(|| before.name.clone());
        let class_id = dto.class_id.unwrap_or(before.class_id);

        if class_id != before.class_id {
            ensure_exists(&mut *tx, EntityKind::Class, class_id).await?;

            let has_exams: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM exams WHERE subject_id = $1)")
                    .bind(before.id)
                    .fetch_one(&mut *tx)
                    .await?;
            if has_exams {
                return Err(AppError::conflict(anyhow!(
                    "Subject has exams and cannot be moved to another class"
                )));
            }
        }
        Self::ensure_name_available(&mut tx, class_id, &name, Some(before.id)).await?;

        let subject_code = merge_optional(dto.subject_code, before.subject_code.clone())
            .map(|c| c.to_ascii_uppercase());

        let after = sqlx::query_as::<_, Subject>(&format!(
            "UPDATE subjects SET name = $2, subject_code = $3, class_id = $4 WHERE id = $1{}",
            RETURNING
        ))
        .bind(before.id)
        .bind(&name)
        .bind(subject_code)
        .bind(class_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::Subject))?;

        AuditService::updated(&mut tx, actor, &before, &after).await?;
        tx.commit().await?;

        Ok(after)
    }

    #[instrument(skip(db, actor), fields(db.operation = "DELETE", db.table = "subjects"))]
    pub async fn delete(
        db: &PgPool,
        actor: &ActorSnapshot,
        key: &EntityKey,
    ) -> Result<Subject, AppError> {
        let mut tx = db.begin().await?;

        let subject: Subject = fetch_by_key(&mut *tx, SELECT_SUBJECT, key, true)
            .await?
            .ok_or_else(|| not_found(EntityKind::Subject))?;

        ensure_unreferenced(&mut tx, EntityKind::Subject, subject.id).await?;

        sqlx::query("DELETE FROM subjects WHERE id = $1")
            .bind(subject.id)
            .execute(&mut *tx)
            .await
            .map_err(db_error(EntityKind::Subject))?;

        AuditService::deleted(&mut tx, actor, &subject).await?;
        tx.commit().await?;

        Ok(subject)
    }
}
