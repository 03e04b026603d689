use anyhow::anyhow;
use schoolyard_core::codes::EntityKey;
use schoolyard_core::media::{MediaStore, StoredMedia};
use schoolyard_core::{AppError, EntityKind, ListParams, Page};
use schoolyard_db::{
    Filters, ListQuery, db_error, ensure_exists, ensure_unreferenced, fetch_by_key,
    fetch_document, fetch_page,
};
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::modules::audit_logs::model::ActorSnapshot;
use crate::modules::audit_logs::service::{AuditEntry, AuditService};
use crate::modules::cities::model::Location;
use crate::modules::cities::service::check_location;
use crate::modules::shared::{clean, clean_optional, merge_optional, not_found};
use crate::modules::uploads::model::ImageFile;
use crate::modules::uploads::service::UploadService;

use super::model::{
    CreateStudentDto, RETURNING_STUDENT, SELECT_STUDENT, STUDENT_LIST, Student,
    StudentFilterParams, UpdateStudentDto,
};

/// The class must exist, and the section, when given, must be one of its sections.
async fn check_placement(
    conn: &mut PgConnection,
    class_id: Uuid,
    section_id: Option<Uuid>,
) -> Result<(), AppError> {
    ensure_exists(&mut *conn, EntityKind::Class, class_id).await?;

    if let Some(section_id) = section_id {
        let section_class: Uuid =
            sqlx::query_scalar("SELECT class_id FROM sections WHERE id = $1")
                .bind(section_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| not_found(EntityKind::Section))?;

        if section_class != class_id {
            return Err(AppError::bad_request(anyhow!(
                "Section does not belong to the given class"
            )));
        }
    }
    Ok(())
}

pub struct StudentService;

impl StudentService {
    async fn ensure_admission_number_available(
        conn: &mut PgConnection,
        admission_number: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), AppError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM students
                WHERE admission_number = $1 AND ($2::uuid IS NULL OR id <> $2)
            )",
        )
        .bind(admission_number)
        .bind(exclude)
        .fetch_one(&mut *conn)
        .await?;

        if taken {
            return Err(AppError::conflict(anyhow!(
                "Student with this admission number already exists"
            )));
        }
        Ok(())
    }

    async fn load(conn: &mut PgConnection, key: &EntityKey) -> Result<Student, AppError> {
        fetch_by_key(&mut *conn, SELECT_STUDENT, key, true)
            .await?
            .ok_or_else(|| not_found(EntityKind::Student))
    }

    #[instrument(skip(db, actor, dto), fields(db.operation = "INSERT", db.table = "students"))]
    pub async fn create(
        db: &PgPool,
        actor: &ActorSnapshot,
        dto: CreateStudentDto,
    ) -> Result<Student, AppError> {
        let admission_number = clean("admission_number", &dto.admission_number)?;
        let location = Location {
            city_id: dto.city_id,
            state_id: dto.state_id,
            country_id: dto.country_id,
        };

        let mut tx = db.begin().await?;

        check_placement(&mut tx, dto.class_id, dto.section_id).await?;
        check_location(&mut tx, location).await?;
        Self::ensure_admission_number_available(&mut tx, &admission_number, None).await?;

        let student = sqlx::query_as::<_, Student>(&format!(
            "INSERT INTO students
                (code, admission_number, first_name, last_name, gender, date_of_birth, class_id,
                 section_id, guardian_name, guardian_phone, address, city_id, state_id, country_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14){}",
            RETURNING_STUDENT
        ))
        .bind(EntityKind::Student.new_code())
        .bind(&admission_number)
        .bind(clean("first_name", &dto.first_name)?)
        .bind(clean("last_name", &dto.last_name)?)
        .bind(dto.gender.map(|g| g.as_str()))
        .bind(dto.date_of_birth)
        .bind(dto.class_id)
        .bind(dto.section_id)
        .bind(clean_optional(dto.guardian_name))
        .bind(clean_optional(dto.guardian_phone))
        .bind(clean_optional(dto.address))
        .bind(location.city_id)
        .bind(location.state_id)
        .bind(location.country_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::Student))?;

        AuditService::created(&mut tx, actor, &student).await?;
        tx.commit().await?;

        Ok(student)
    }

    #[instrument(skip(db, params, filters), fields(db.operation = "SELECT", db.table = "students"))]
    pub async fn list(
        db: &PgPool,
        params: &ListParams,
        filters: StudentFilterParams,
    ) -> Result<Page<Value>, AppError> {
        let filters = Filters::new()
            .uuid("class_id", filters.class_id)
            .uuid("section_id", filters.section_id)
            .text("gender", filters.gender.map(|g| g.as_str()))
            .into_vec();
        let query = ListQuery::new(&STUDENT_LIST, params, filters)?;
        fetch_page(db, &query).await
    }

    #[instrument(skip(db), fields(db.operation = "SELECT", db.table = "students"))]
    pub async fn get(db: &PgPool, key: &EntityKey, populate: bool) -> Result<Value, AppError> {
        fetch_document(db, &STUDENT_LIST, key, populate).await
    }

    #[instrument(skip(db, actor, dto), fields(db.operation = "UPDATE", db.table = "students"))]
    pub async fn update(
        db: &PgPool,
        actor: &ActorSnapshot,
        key: &EntityKey,
        dto: UpdateStudentDto,
    ) -> Result<Student, AppError> {
        let mut tx = db.begin().await?;
        let before = Self::load(&mut tx, key).await?;

        let class_id = dto.class_id.unwrap_or(before.class_id);
        let section_id = dto.section_id.or(before.section_id);
        if dto.class_id.is_some() || dto.section_id.is_some() {
            check_placement(&mut tx, class_id, section_id).await?;
        }

        let current = Location {
            city_id: before.city_id,
            state_id: before.state_id,
            country_id: before.country_id,
        };
        let location = dto.location(current);
        if location != current {
            check_location(&mut tx, location).await?;
        }

        let requested_number = dto
            .admission_number
            .as_deref()
            .map(|v| clean("admission_number", v))
            .transpose()?;
        let admission_number = match requested_number {
            Some(number) if number != before.admission_number => {
                Self::ensure_admission_number_available(&mut tx, &number, Some(before.id))
                    .await?;
                number
            }
            _ => before.admission_number.clone(),
        };

        let after = sqlx::query_as::<_, Student>(&format!(
            "UPDATE students
             SET admission_number = $2, first_name = $3, last_name = $4, gender = $5,
                 date_of_birth = $6, class_id = $7, section_id = $8, guardian_name = $9,
                 guardian_phone = $10, address = $11, city_id = $12, state_id = $13,
                 country_id = $14
             WHERE id = $1{}",
            RETURNING_STUDENT
        ))
        .bind(before.id)
        .bind(&admission_number)
        .bind(
            dto.first_name
                .as_deref()
                .map(|v| clean("first_name", v))
                .transpose()?
                .unwrap_or_else(|| before.first_name.clone()),
        )
        .bind(
            dto.last_name
                .as_deref()
                .map(|v| clean("last_name", v))
                .transpose()?
                .unwrap_or_else(|| before.last_name.clone()),
        )
        .bind(
            dto.gender
                .map(|g| g.as_str().to_string())
                .or_else(|| before.gender.clone()),
        )
        .bind(dto.date_of_birth.or(before.date_of_birth))
        .bind(class_id)
        .bind(section_id)
        .bind(merge_optional(dto.guardian_name, before.guardian_name.clone()))
        .bind(merge_optional(dto.guardian_phone, before.guardian_phone.clone()))
        .bind(merge_optional(dto.address, before.address.clone()))
        .bind(location.city_id)
        .bind(location.state_id)
        .bind(location.country_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::Student))?;

        AuditService::updated(&mut tx, actor, &before, &after).await?;
        tx.commit().await?;

        Ok(after)
    }

    /// Uploads a new photo, points the student at it and drops the old one.
    #[instrument(skip(db, media, actor, image), fields(db.operation = "UPDATE", db.table = "students"))]
    pub async fn set_photo(
        db: &PgPool,
        media: &dyn MediaStore,
        folder: &str,
        actor: &ActorSnapshot,
        key: &EntityKey,
        image: ImageFile,
    ) -> Result<Student, AppError> {
        let existing: Student = fetch_by_key(db, SELECT_STUDENT, key, false)
            .await?
            .ok_or_else(|| not_found(EntityKind::Student))?;

        let stored = UploadService::store(media, folder, &image).await?;

        let (before, after) = match Self::attach_photo(db, actor, existing.id, &stored).await {
            Ok(pair) => pair,
            Err(err) => {
                UploadService::discard(media, &stored.public_id).await;
                return Err(err);
            }
        };

        if let Some(old) = before.photo_public_id.as_deref() {
            debug!(public_id = old, "Removing replaced photo");
            UploadService::discard(media, old).await;
        }

        Ok(after)
    }

    /// Points the row at an already stored image; returns the row before and after.
    async fn attach_photo(
        db: &PgPool,
        actor: &ActorSnapshot,
        id: Uuid,
        stored: &StoredMedia,
    ) -> Result<(Student, Student), AppError> {
        let mut tx = db.begin().await?;
        let before = Self::load(&mut tx, &EntityKey::Id(id)).await?;

        let after = sqlx::query_as::<_, Student>(&format!(
            "UPDATE students SET photo_url = $2, photo_public_id = $3 WHERE id = $1{}",
            RETURNING_STUDENT
        ))
        .bind(before.id)
        .bind(&stored.url)
        .bind(&stored.public_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::Student))?;

        let entry = AuditEntry::updated(&before, &after)?.with_label(format!(
            "Updated photo for student {} {}",
            after.first_name, after.last_name
        ));
        AuditService::record_and_commit(tx, actor, entry).await?;

        Ok((before, after))
    }

    #[instrument(skip(db, media, actor), fields(db.operation = "DELETE", db.table = "students"))]
    pub async fn delete(
        db: &PgPool,
        media: &dyn MediaStore,
        actor: &ActorSnapshot,
        key: &EntityKey,
    ) -> Result<Student, AppError> {
        let mut tx = db.begin().await?;
        let student = Self::load(&mut tx, key).await?;

        ensure_unreferenced(&mut tx, EntityKind::Student, student.id).await?;

        sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(student.id)
            .execute(&mut *tx)
            .await
            .map_err(db_error(EntityKind::Student))?;

        AuditService::deleted(&mut tx, actor, &student).await?;
        tx.commit().await?;

        if let Some(public_id) = student.photo_public_id.as_deref() {
            UploadService::discard(media, public_id).await;
        }

        Ok(student)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_location_keeps_unset_parts() {
        let current = Location {
            city_id: Some(Uuid::new_v4()),
            state_id: Some(Uuid::new_v4()),
            country_id: Some(Uuid::new_v4()),
        };
        let new_city = Uuid::new_v4();
        let dto: UpdateStudentDto =
            serde_json::from_value(serde_json::json!({ "city_id": new_city })).unwrap();

        let merged = dto.location(current);
        assert_eq!(merged.city_id, Some(new_city));
        assert_eq!(merged.state_id, current.state_id);
        assert_eq!(merged.country_id, current.country_id);
    }

    #[test]
    fn test_unknown_gender_is_rejected() {
        let result = serde_json::from_value::<UpdateStudentDto>(serde_json::json!({
            "gender": "unknown"
        }));
        assert!(result.is_err());
    }
}
