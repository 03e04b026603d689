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
use crate::modules::shared::{clean, not_found};

use super::model::{
    COUNTRY_LIST, Country, CreateCountryDto, SELECT_COUNTRY, UpdateCountryDto, normalize_iso_code,
};

const RETURNING: &str = " RETURNING id, code, name, iso_code, created_at, updated_at";

fn iso_code(raw: &str) -> Result<String, AppError> {
    normalize_iso_code(raw)
        .ok_or_else(|| AppError::bad_request(anyhow!("iso_code must be 2 or 3 letters")))
}

pub struct CountryService;

impl CountryService {
    async fn ensure_unique(
        conn: &mut PgConnection,
        name: &str,
        iso_code: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), AppError> {
        let (name_taken, iso_taken): (bool, bool) = sqlx::query_as(
            "SELECT
                EXISTS(SELECT 1 FROM countries WHERE LOWER(name) = LOWER($1) AND ($3::uuid IS NULL OR id <> $3)),
                EXISTS(SELECT 1 FROM countries WHERE iso_code = $2 AND ($3::uuid IS NULL OR id <> $3))",
        )
        .bind(name)
        .bind(iso_code)
        .bind(exclude)
        .fetch_one(&mut *conn)
        .await?;

        if name_taken {
            return Err(AppError::conflict(anyhow!(
                "Country with this name already exists"
            )));
        }
        if iso_taken {
            return Err(AppError::conflict(anyhow!(
                "Country with this ISO code already exists"
            )));
        }
        Ok(())
    }

    #[instrument(skip(db, actor, dto), fields(db.operation = "INSERT", db.table = "countries"))]
    pub async fn create(
        db: &PgPool,
        actor: &ActorSnapshot,
        dto: CreateCountryDto,
    ) -> Result<Country, AppError> {
        let name = clean("name", &dto.name)?;
        let iso_code = iso_code(&dto.iso_code)?;
        let mut tx = db.begin().await?;

        Self::ensure_unique(&mut tx, &name, &iso_code, None).await?;

        let country = sqlx::query_as::<_, Country>(&format!(
            "INSERT INTO countries (code, name, iso_code) VALUES ($1, $2, $3){}",
            RETURNING
        ))
        .bind(EntityKind::Country.new_code())
        .bind(&name)
        .bind(&iso_code)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::Country))?;

        AuditService::created(&mut tx, actor, &country).await?;
        tx.commit().await?;

        Ok(country)
    }

    #[instrument(skip(db, params), fields(db.operation = "SELECT", db.table = "countries"))]
    pub async fn list(db: &PgPool, params: &ListParams) -> Result<Page<Value>, AppError> {
        let query = ListQuery::new(&COUNTRY_LIST, params, Vec::new())?;
        fetch_page(db, &query).await
    }

    #[instrument(skip(db), fields(db.operation = "SELECT", db.table = "countries"))]
    pub async fn get(db: &PgPool, key: &EntityKey, populate: bool) -> Result<Value, AppError> {
        fetch_document(db, &COUNTRY_LIST, key, populate).await
    }

    #[instrument(skip(db, actor, dto), fields(db.operation = "UPDATE", db.table = "countries"))]
    pub async fn update(
        db: &PgPool,
        actor: &ActorSnapshot,
        key: &EntityKey,
        dto: UpdateCountryDto,
    ) -> Result<Country, AppError> {
        let mut tx = db.begin().await?;

        let before: Country = fetch_by_key(&mut *tx, SELECT_COUNTRY, key, true)
            .await?
            .ok_or_else(|| not_found(EntityKind::Country))?;

        let name = dto
            .name
            .as_deref()
            .map(|v| clean("name", v))
            .transpose()?
            .unwrap_or_else(|| before.name.clone());
        let iso_code = match dto.iso_code.as_deref() {
            Some(raw) => iso_code(raw)?,
            None => before.iso_code.clone(),
        };
        Self::ensure_unique(&mut tx, &name, &iso_code, Some(before.id)).await?;

        let after = sqlx::query_as::<_, Country>(&format!(
            "UPDATE countries SET name = $2, iso_code = $3 WHERE id = $1{}",
            RETURNING
        ))
        .bind(before.id)
        .bind(&name)
        .bind(&iso_code)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::Country))?;

        AuditService::updated(&mut tx, actor, &before, &after).await?;
        tx.commit().await?;

        Ok(after)
    }

    #[instrument(skip(db, actor), fields(db.operation = "DELETE", db.table = "countries"))]
    pub async fn delete(
        db: &PgPool,
        actor: &ActorSnapshot,
        key: &EntityKey,
    ) -> Result<Country, AppError> {
        let mut tx = db.begin().await?;

        let country: Country = fetch_by_key(&mut *tx, SELECT_COUNTRY, key, true)
            .await?
            .ok_or_else(|| not_found(EntityKind::Country))?;

        ensure_unreferenced(&mut tx, EntityKind::Country, country.id).await?;

        sqlx::query("DELETE FROM countries WHERE id = $1")
            .bind(country.id)
            .execute(&mut *tx)
            .await
            .map_err(db_error(EntityKind::Country))?;

        AuditService::deleted(&mut tx, actor, &country).await?;
        tx.commit().await?;

        Ok(country)
    }
}
