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
    CreateProfileDto, PROFILE_LIST, Profile, ProfileFilterParams, RETURNING_PROFILE,
    SELECT_PROFILE, UpdateProfileDto,
};

pub struct ProfileService;

impl ProfileService {
    async fn load(conn: &mut PgConnection, key: &EntityKey) -> Result<Profile, AppError> {
        fetch_by_key(&mut *conn, SELECT_PROFILE, key, true)
            .await?
            .ok_or_else(|| not_found(EntityKind::Profile))
    }

    async fn load_for_user(conn: &mut PgConnection, user_id: Uuid) -> Result<Profile, AppError> {
        sqlx::query_as::<_, Profile>(&format!("{} WHERE user_id = $1 FOR UPDATE", SELECT_PROFILE))
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow!("You do not have a profile yet")))
    }

    async fn apply_update(
        conn: &mut PgConnection,
        actor: &ActorSnapshot,
        before: Profile,
        dto: UpdateProfileDto,
    ) -> Result<Profile, AppError> {
        let location = Location {
            city_id: dto.city_id.or(before.city_id),
            state_id: dto.state_id.or(before.state_id),
            country_id: dto.country_id.or(before.country_id),
        };
        if dto.touches_location() {
            check_location(conn, location).await?;
        }

        let first_name = dto
            .first_name
            .as_deref()
            .map(|v| clean("first_name", v))
            .transpose()?
            .unwrap_or_else(|| before.first_name.clone());
        let last_name = dto
            .last_name
            .as_deref()
            .map(|v| clean("last_name", v))
            .transpose()?
            .unwrap_or_else(|| before.last_name.clone());
        let gender = dto
            .gender
            .map(|g| g.as_str().to_string())
            .or_else(|| before.gender.clone());

        let after = sqlx::query_as::<_, Profile>(&format!(
            "UPDATE profiles
             SET first_name = $2, last_name = $3, phone = $4, gender = $5, date_of_birth = $6,
                 address = $7, city_id = $8, state_id = $9, country_id = $10
             WHERE id = $1{}",
            RETURNING_PROFILE
        ))
        .bind(before.id)
        .bind(&first_name)
        .bind(&last_name)
        .bind(merge_optional(dto.phone, before.phone.clone()))
        .bind(gender)
        .bind(dto.date_of_birth.or(before.date_of_birth))
        .bind(merge_optional(dto.address, before.address.clone()))
        .bind(location.city_id)
        .bind(location.state_id)
        .bind(location.country_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_error(EntityKind::Profile))?;

        AuditService::updated(conn, actor, &before, &after).await?;
        Ok(after)
    }

    #[instrument(skip(db, actor, dto), fields(db.operation = "INSERT", db.table = "profiles"))]
    pub async fn create(
        db: &PgPool,
        actor: &ActorSnapshot,
        dto: CreateProfileDto,
    ) -> Result<Profile, AppError> {
        let mut tx = db.begin().await?;

        ensure_exists(&mut *tx, EntityKind::User, dto.user_id).await?;

        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM profiles WHERE user_id = $1)")
                .bind(dto.user_id)
                .fetch_one(&mut *tx)
                .await?;
        if taken {
            return Err(AppError::conflict(anyhow!("User already has a profile")));
        }

        let location = Location {
            city_id: dto.city_id,
            state_id: dto.state_id,
            country_id: dto.country_id,
        };
        check_location(&mut tx, location).await?;

        let profile = sqlx::query_as::<_, Profile>(&format!(
            "INSERT INTO profiles
                (code, user_id, first_name, last_name, phone, gender, date_of_birth, address, city_id, state_id, country_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11){}",
            RETURNING_PROFILE
        ))
        .bind(EntityKind::Profile.new_code())
        .bind(dto.user_id)
        .bind(clean("first_name", &dto.first_name)?)
        .bind(clean("last_name", &dto.last_name)?)
        .bind(clean_optional(dto.phone))
        .bind(dto.gender.map(|g| g.as_str()))
        .bind(dto.date_of_birth)
        .bind(clean_optional(dto.address))
        .bind(location.city_id)
        .bind(location.state_id)
        .bind(location.country_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::Profile))?;

        AuditService::created(&mut tx, actor, &profile).await?;
        tx.commit().await?;

        Ok(profile)
    }

    #[instrument(skip(db, params, filters), fields(db.operation = "SELECT", db.table = "profiles"))]
    pub async fn list(
        db: &PgPool,
        params: &ListParams,
        filters: ProfileFilterParams,
    ) -> Result<Page<Value>, AppError> {
        let filters = Filters::new()
            .uuid("user_id", filters.user_id)
            .text("gender", filters.gender.map(|g| g.as_str()))
            .uuid("city_id", filters.city_id)
            .into_vec();
        let query = ListQuery::new(&PROFILE_LIST, params, filters)?;
        fetch_page(db, &query).await
    }

    #[instrument(skip(db), fields(db.operation = "SELECT", db.table = "profiles"))]
    pub async fn get(db: &PgPool, key: &EntityKey, populate: bool) -> Result<Value, AppError> {
        fetch_document(db, &PROFILE_LIST, key, populate).await
    }

    /// The signed-in user's own profile.
    #[instrument(skip(db), fields(db.operation = "SELECT", db.table = "profiles"))]
    pub async fn get_for_user(
        db: &PgPool,
        user_id: Uuid,
        populate: bool,
    ) -> Result<Value, AppError> {
        let id: Uuid = sqlx::query_scalar("SELECT id FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow!("You do not have a profile yet")))?;

        fetch_document(db, &PROFILE_LIST, &EntityKey::Id(id), populate).await
    }

    #[instrument(skip(db, actor, dto), fields(db.operation = "UPDATE", db.table = "profiles"))]
    pub async fn update(
        db: &PgPool,
        actor: &ActorSnapshot,
        key: &EntityKey,
        dto: UpdateProfileDto,
    ) -> Result<Profile, AppError> {
        let mut tx = db.begin().await?;
        let before = Self::load(&mut tx, key).await?;
        let after = Self::apply_update(&mut tx, actor, before, dto).await?;
        tx.commit().await?;
        Ok(after)
    }

    #[instrument(skip(db, actor, dto), fields(db.operation = "UPDATE", db.table = "profiles"))]
    pub async fn update_for_user(
        db: &PgPool,
        actor: &ActorSnapshot,
        user_id: Uuid,
        dto: UpdateProfileDto,
    ) -> Result<Profile, AppError> {
        let mut tx = db.begin().await?;
        let before = Self::load_for_user(&mut tx, user_id).await?;
        let after = Self::apply_update(&mut tx, actor, before, dto).await?;
        tx.commit().await?;
        Ok(after)
    }

    /// Uploads a new avatar, points the profile at it and drops the old one.
    #[instrument(skip(db, media, actor, image), fields(db.operation = "UPDATE", db.table = "profiles"))]
    pub async fn set_avatar(
        db: &PgPool,
        media: &dyn MediaStore,
        folder: &str,
        actor: &ActorSnapshot,
        key: &EntityKey,
        image: ImageFile,
    ) -> Result<Profile, AppError> {
        let existing: Profile = fetch_by_key(db, SELECT_PROFILE, key, false)
            .await?
            .ok_or_else(|| not_found(EntityKind::Profile))?;

        let stored = UploadService::store(media, folder, &image).await?;

        let (before, after) = match Self::attach_avatar(db, actor, existing.id, &stored).await {
            Ok(pair) => pair,
            Err(err) => {
                UploadService::discard(media, &stored.public_id).await;
                return Err(err);
            }
        };

        if let Some(old) = before.avatar_public_id.as_deref() {
            debug!(public_id = old, "Removing replaced avatar");
            UploadService::discard(media, old).await;
        }

        Ok(after)
    }

    /// Points the row at an already stored image; returns the row before and after.
    async fn attach_avatar(
        db: &PgPool,
        actor: &ActorSnapshot,
        id: Uuid,
        stored: &StoredMedia,
    ) -> Result<(Profile, Profile), AppError> {
        let mut tx = db.begin().await?;
        let before = Self::load(&mut tx, &EntityKey::Id(id)).await?;

        let after = sqlx::query_as::<_, Profile>(&format!(
            "UPDATE profiles SET avatar_url = $2, avatar_public_id = $3 WHERE id = $1{}",
            RETURNING_PROFILE
        ))
        .bind(before.id)
        .bind(&stored.url)
        .bind(&stored.public_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::Profile))?;

        let entry = AuditEntry::updated(&before, &after)?.with_label(format!(
            "Updated avatar for profile {} {}",
            after.first_name, after.last_name
        ));
        AuditService::record_and_commit(tx, actor, entry).await?;

        Ok((before, after))
    }

    #[instrument(skip(db, media, actor), fields(db.operation = "DELETE", db.table = "profiles"))]
    pub async fn delete(
        db: &PgPool,
        media: &dyn MediaStore,
        actor: &ActorSnapshot,
        key: &EntityKey,
    ) -> Result<Profile, AppError> {
        let mut tx = db.begin().await?;
        let profile = Self::load(&mut tx, key).await?;

        ensure_unreferenced(&mut tx, EntityKind::Profile, profile.id).await?;

        sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(profile.id)
            .execute(&mut *tx)
            .await
            .map_err(db_error(EntityKind::Profile))?;

        AuditService::deleted(&mut tx, actor, &profile).await?;
        tx.commit().await?;

        if let Some(public_id) = profile.avatar_public_id.as_deref() {
            UploadService::discard(media, public_id).await;
        }

        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::shared::Gender;

    fn dto() -> UpdateProfileDto {
        UpdateProfileDto {
            first_name: None,
            last_name: None,
            phone: None,
            gender: Some(Gender::Female),
            date_of_birth: None,
            address: None,
            city_id: None,
            state_id: None,
            country_id: None,
        }
    }

    #[test]
    fn test_touches_location() {
        assert!(!dto().touches_location());

        let mut moved = dto();
        moved.city_id = Some(Uuid::new_v4());
        assert!(moved.touches_location());
    }
}
