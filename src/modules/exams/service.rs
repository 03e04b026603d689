use anyhow::anyhow;
use schoolyard_core::codes::EntityKey;
use schoolyard_core::{AppError, EntityKind, ListParams, Page};
use schoolyard_db::{
    Filters, ListQuery, db_error, ensure_exists, fetch_by_key, fetch_document, fetch_page,
};
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use uuid::Uuid;

use crate::modules::audit_logs::model::ActorSnapshot;
use crate::modules::audit_logs::service::AuditService;
use crate::modules::shared::{clean, not_found};

use super::model::{CreateExamDto, EXAM_LIST, Exam, ExamFilterParams, SELECT_EXAM, UpdateExamDto};

const RETURNING: &str = " RETURNING id, code, name, class_id, subject_id, exam_date, total_marks, passing_marks, created_at, updated_at";

pub fn check_marks(total_marks: i32, passing_marks: i32) -> Result<(), AppError> {
    if passing_marks > total_marks {
        return Err(AppError::bad_request(anyhow!(
            "passing_marks cannot exceed total_marks"
        )));
    }
    Ok(())
}

/// The subject must exist and be taught in the exam's class.
async fn check_subject(
    conn: &mut PgConnection,
    class_id: Uuid,
    subject_id: Uuid,
) -> Result<(), AppError> {
    let subject_class: Uuid = sqlx::query_scalar("SELECT class_id FROM subjects WHERE id = $1")
        .bind(subject_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| not_found(EntityKind::Subject))?;

    if subject_class != class_id {
        return Err(AppError::bad_request(anyhow!(
            "Subject does not belong to the given class"
        )));
    }
    Ok(())
}

pub struct ExamService;

impl ExamService {
    async fn ensure_name_available(
        conn: &mut PgConnection,
        class_id: Uuid,
        subject_id: Uuid,
        name: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), AppError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM exams
                WHERE class_id = $1 AND subject_id = $2 AND LOWER(name) = LOWER($3)
                  AND ($4::uuid IS NULL OR id <> $4)
            )",
        )
        .bind(class_id)
        .bind(subject_id)
        .bind(name)
        .bind(exclude)
        .fetch_one(&mut *conn)
        .await?;

        if taken {
            return Err(AppError::conflict(anyhow!(
                "Exam with this name already exists for the class and subject"
            )));
        }
        Ok(())
    }

    #[instrument(skip(db, actor, dto), fields(db.operation = "INSERT", db.table = "exams"))]
    pub async fn create(
        db: &PgPool,
        actor: &ActorSnapshot,
        dto: CreateExamDto,
    ) -> Result<Exam, AppError> {
        check_marks(dto.total_marks, dto.passing_marks)?;
        let name = clean("name", &dto.name)?;
        let mut tx = db.begin().await?;

        ensure_exists(&mut *tx, EntityKind::Class, dto.class_id).await?;
        check_subject(&mut tx, dto.class_id, dto.subject_id).await?;
        Self::ensure_name_available(&mut tx, dto.class_id, dto.subject_id, &name, None).await?;

        let exam = sqlx::query_as::<_, Exam>(&format!(
            "INSERT INTO exams (code, name, class_id, subject_id, exam_date, total_marks, passing_marks)
             VALUES ($1, $2, $3, $4, $5, $6, $7){}",
            RETURNING
        ))
        .bind(EntityKind::Exam.new_code())
        .bind(&name)
        .bind(dto.class_id)
        .bind(dto.subject_id)
        .bind(dto.exam_date)
        .bind(dto.total_marks)
        .bind(dto.passing_marks)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::Exam))?;

        AuditService::created(&mut tx, actor, &exam).await?;
        tx.commit().await?;

        Ok(exam)
    }

    #[instrument(skip(db, params), fields(db.operation = "SELECT", db.table = "exams"))]
    pub async fn list(
        db: &PgPool,
        params: &ListParams,
        filters: ExamFilterParams,
    ) -> Result<Page<Value>, AppError> {
        let filters = Filters::new()
            .uuid("class_id", filters.class_id)
            .uuid("subject_id", filters.subject_id)
            .into_vec();
        let query = ListQuery::new(&EXAM_LIST, params, filters)?;
        fetch_page(db, &query).await
    }

    #[instrument(skip(db), fields(db.operation = "SELECT", db.table = "exams"))]
    pub async fn get(db: &PgPool, key: &EntityKey, populate: bool) -> Result<Value, AppError> {
        fetch_document(db, &EXAM_LIST, key, populate).await
    }

    #[instrument(skip(db, actor, dto), fields(db.operation = "UPDATE", db.table = "exams"))]
    pub async fn update(
        db: &PgPool,
        actor: &ActorSnapshot,
        key: &EntityKey,
        dto: UpdateExamDto,
    ) -> Result<Exam, AppError> {
        let mut tx = db.begin().await?;

        let before: Exam = fetch_by_key(&mut *tx, SELECT_EXAM, key, true)
            .await?
            .ok_or_else(|| not_found(EntityKind::Exam))?;

        let name = dto
            .name
            .as_deref()
            .map(|v| clean("name", v))
            .transpose()?
            .unwrap_or_else(|| before.name.clone());
        let class_id = dto.class_id.unwrap_or(before.class_id);
        let subject_id = dto.subject_id.unwrap_or(before.subject_id);
        let total_marks = dto.total_marks.unwrap_or(before.total_marks);
        let passing_marks = dto.passing_marks.unwrap_or(before.passing_marks);

        check_marks(total_marks, passing_marks)?;
        if class_id != before.class_id {
            ensure_exists(&mut *tx, EntityKind::Class, class_id).await?;
        }
        if class_id != before.class_id || subject_id != before.subject_id {
            check_subject(&mut tx, class_id, subject_id).await?;
        }
        Self::ensure_name_available(&mut tx, class_id, subject_id, &name, Some(before.id))
            .await?;

        let after = sqlx::query_as::<_, Exam>(&format!(
            "UPDATE exams
             SET name = $2, class_id = $3, subject_id = $4, exam_date = $5,
                 total_marks = $6, passing_marks = $7
             WHERE id = $1{}",
            RETURNING
        ))
        .bind(before.id)
        .bind(&name)
        .bind(class_id)
        .bind(subject_id)
        .bind(dto.exam_date.or(before.exam_date))
        .bind(total_marks)
        .bind(passing_marks)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::Exam))?;

        AuditService::updated(&mut tx, actor, &before, &after).await?;
        tx.commit().await?;

        Ok(after)
    }

    /// Nothing references exams, so there is no reference scan.
    #[instrument(skip(db, actor), fields(db.operation = "DELETE", db.table = "exams"))]
    pub async fn delete(
        db: &PgPool,
        actor: &ActorSnapshot,
        key: &EntityKey,
    ) -> Result<Exam, AppError> {
        let mut tx = db.begin().await?;

        let exam: Exam = fetch_by_key(&mut *tx, SELECT_EXAM, key, true)
            .await?
            .ok_or_else(|| not_found(EntityKind::Exam))?;

        sqlx::query("DELETE FROM exams WHERE id = $1")
            .bind(exam.id)
            .execute(&mut *tx)
            .await
            .map_err(db_error(EntityKind::Exam))?;

        AuditService::deleted(&mut tx, actor, &exam).await?;
        tx.commit().await?;

        Ok(exam)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_marks() {
        assert!(check_marks(100, 40).is_ok());
        assert!(check_marks(100, 100).is_ok());
        assert!(check_marks(100, 0).is_ok());

        let err = check_marks(50, 51).unwrap_err();
        assert_eq!(err.status.as_u16(), 400);
        assert_eq!(err.public_message(), "passing_marks cannot exceed total_marks");
    }
}
