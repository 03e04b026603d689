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
use crate::modules::shared::{clean, not_found};

use super::model::{
    CITY_LIST, City, CityFilterParams, CreateCityDto, Location, SELECT_CITY, UpdateCityDto,
};

const RETURNING: &str = " RETURNING id, code, name, state_id, country_id, created_at, updated_at";

async fn state_country(conn: &mut PgConnection, state_id: Uuid) -> Result<Uuid, AppError> {
    sqlx::query_scalar("SELECT country_id FROM states WHERE id = $1")
        .bind(state_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| not_found(EntityKind::State))
}

/// Resolves the country a city in `state_id` belongs to, checking a
/// caller-supplied country against it.
async fn resolve_country(
    conn: &mut PgConnection,
    state_id: Uuid,
    country_id: Option<Uuid>,
) -> Result<Uuid, AppError> {
    let actual = state_country(conn, state_id).await?;
    match country_id {
        Some(given) if given != actual => Err(AppError::bad_request(anyhow!(
            "State does not belong to the given country"
        ))),
        _ => Ok(actual),
    }
}

/// Checks that every id in `location` exists and that the three agree with
/// each other.
pub async fn check_location(conn: &mut PgConnection, location: Location) -> Result<(), AppError> {
    if let Some(country_id) = location.country_id {
        schoolyard_db::ensure_exists(&mut *conn, EntityKind::Country, country_id).await?;
    }

    if let Some(state_id) = location.state_id {
        let country = state_country(conn, state_id).await?;
        if location.country_id.is_some_and(|c| c != country) {
            return Err(AppError::bad_request(anyhow!(
                "State does not belong to the given country"
            )));
        }
    }

    if let Some(city_id) = location.city_id {
        let (state_id, country_id): (Uuid, Uuid) =
            sqlx::query_as("SELECT state_id, country_id FROM cities WHERE id = $1")
                .bind(city_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| not_found(EntityKind::City))?;

        if location.state_id.is_some_and(|s| s != state_id) {
            return Err(AppError::bad_request(anyhow!(
                "City does not belong to the given state"
            )));
        }
        if location.country_id.is_some_and(|c| c != country_id) {
            return Err(AppError::bad_request(anyhow!(
                "City does not belong to the given country"
            )));
        }
    }

    Ok(())
}

pub struct CityService;

impl CityService {
    async fn ensure_name_available(
        conn: &mut PgConnection,
        state_id: Uuid,
        name: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), AppError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM cities
                WHERE state_id = $1 AND LOWER(name) = LOWER($2) AND ($3::uuid IS NULL OR id <> $3)
            )",
        )
        .bind(state_id)
        .bind(name)
        .bind(exclude)
        .fetch_one(&mut *conn)
        .await?;

        if taken {
            return Err(AppError::conflict(anyhow!(
                "City with this name already exists in the state"
            )));
        }
        Ok(())
    }

    #[instrument(skip(db, actor, dto), fields(db.operation = "INSERT", db.table = "cities"))]
    pub async fn create(
        db: &PgPool,
        actor: &ActorSnapshot,
        dto: CreateCityDto,
    ) -> Result<City, AppError> {
        let name = clean("name", &dto.name)?;
        let mut tx = db.begin().await?;

        let country_id = resolve_country(&mut tx, dto.state_id, dto.country_id).await?;
        Self::ensure_name_available(&mut tx, dto.state_id, &name, None).await?;

        let city = sqlx::query_as::<_, City>(&format!(
            "INSERT INTO cities (code, name, state_id, country_id) VALUES ($1, $2, $3, $4){}",
            RETURNING
        ))
        .bind(EntityKind::City.new_code())
        .bind(&name)
        .bind(dto.state_id)
        .bind(country_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::City))?;

        AuditService::created(&mut tx, actor, &city).await?;
        tx.commit().await?;

        Ok(city)
    }

    #[instrument(skip(db, params), fields(db.operation = "SELECT", db.table = "cities"))]
    pub async fn list(
        db: &PgPool,
        params: &ListParams,
        filters: CityFilterParams,
    ) -> Result<Page<Value>, AppError> {
        let filters = Filters::new()
            .uuid("state_id", filters.state_id)
            .uuid("country_id", filters.country_id)
            .into_vec();
        let query = ListQuery::new(&CITY_LIST, params, filters)?;
        fetch_page(db, &query).await
    }

    #[instrument(skip(db), fields(db.operation = "SELECT", db.table = "cities"))]
    pub async fn get(db: &PgPool, key: &EntityKey, populate: bool) -> Result<Value, AppError> {
        fetch_document(db, &CITY_LIST, key, populate).await
    }

    #[instrument(skip(db, actor, dto), fields(db.operation = "UPDATE", db.table = "cities"))]
    pub async fn update(
        db: &PgPool,
        actor: &ActorSnapshot,
        key: &EntityKey,
        dto: UpdateCityDto,
    ) -> Result<City, AppError> {
        let mut tx = db.begin().await?;

        let before: City = fetch_by_key(&mut *tx, SELECT_CITY, key, true)
            .await?
            .ok_or_else(|| not_found(EntityKind::City))?;

        let name = dto
            .name
            .as_deref()
            .map(|v| clean("name", v))
            .transpose()?
            .unwrap_or_else(|| before.name.clone());
        let state_id = dto.state_id.unwrap_or(before.state_id);
        let country_id = resolve_country(&mut tx, state_id, dto.country_id).await?;
        Self::ensure_name_available(&mut tx, state_id, &name, Some(before.id)).await?;

        let after = sqlx::query_as::<_, City>(&format!(
            "UPDATE cities SET name = $2, state_id = $3, country_id = $4 WHERE id = $1{}",
            RETURNING
        ))
        .bind(before.id)
        .bind(&name)
        .bind(state_id)
        .bind(country_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::City))?;

        AuditService::updated(&mut tx, actor, &before, &after).await?;
        tx.commit().await?;

        Ok(after)
    }

    #[instrument(skip(db, actor), fields(db.operation = "DELETE", db.table = "cities"))]
    pub async fn delete(
        db: &PgPool,
        actor: &ActorSnapshot,
        key: &EntityKey,
    ) -> Result<City, AppError> {
        let mut tx = db.begin().await?;

        let city: City = fetch_by_key(&mut *tx, SELECT_CITY, key, true)
            .await?
            .ok_or_else(|| not_found(EntityKind::City))?;

        ensure_unreferenced(&mut tx, EntityKind::City, city.id).await?;

        sqlx::query("DELETE FROM cities WHERE id = $1")
            .bind(city.id)
            .execute(&mut *tx)
            .await
            .map_err(db_error(EntityKind::City))?;

        AuditService::deleted(&mut tx, actor, &city).await?;
        tx.commit().await?;

        Ok(city)
    }
}
