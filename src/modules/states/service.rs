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
    CreateStateDto, SELECT_STATE, STATE_LIST, State, StateFilterParams, UpdateStateDto,
};

const RETURNING: &str = " RETURNING id, code, name, country_id, created_at, updated_at";

pub struct StateService;

impl StateService {
    async fn ensure_name_available(
        conn: &mut PgConnection,
        country_id: Uuid,
        name: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), AppError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM states
                WHERE country_id = $1 AND LOWER(name) = LOWER($2) AND ($3::uuid IS NULL OR id <> $3)
            )",
        )
        .bind(country_id)
        .bind(name)
        .bind(exclude)
        .fetch_one(&mut *conn)
        .await?;

        if taken {
            return Err(AppError::conflict(anyhow!(
                "State with this name already exists in the country"
            )));
        }
        Ok(())
    }

    #[instrument(skip(db, actor, dto), fields(db.operation = "INSERT", db.table = "states"))]
    pub async fn create(
        db: &PgPool,
        actor: &ActorSnapshot,
        dto: CreateStateDto,
    ) -> Result<State, AppError> {
        let name = clean("name", &dto.name)?;
        let mut tx = db.begin().await?;

        ensure_exists(&mut *tx, EntityKind::Country, dto.country_id).await?;
        Self::ensure_name_available(&mut tx, dto.country_id, &name, None).await?;

        let state = sqlx::query_as::<_, State>(&format!(
            "INSERT INTO states (code, name, country_id) VALUES ($1, $2, $3){}",
            RETURNING
        ))
        .bind(EntityKind::State.new_code())
        .bind(&name)
        .bind(dto.country_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::State))?;

        AuditService::created(&mut tx, actor, &state).await?;
        tx.commit().await?;

        Ok(state)
    }

    #[instrument(skip(db, params), fields(db.operation = "SELECT", db.table = "states"))]
    pub async fn list(
        db: &PgPool,
        params: &ListParams,
        filters: StateFilterParams,
    ) -> Result<Page<Value>, AppError> {
        let filters = Filters::new()
            .uuid("country_id", filters.country_id)
            .into_vec();
        let query = ListQuery::new(&STATE_LIST, params, filters)?;
        fetch_page(db, &query).await
    }

    #[instrument(skip(db), fields(db.operation = "SELECT", db.table = "states"))]
    pub async fn get(db: &PgPool, key: &EntityKey, populate: bool) -> Result<Value, AppError> {
        fetch_document(db, &STATE_LIST, key, populate).await
    }

    #[instrument(skip(db, actor, dto), fields(db.operation = "UPDATE", db.table = "states"))]
    pub async fn update(
        db: &PgPool,
        actor: &ActorSnapshot,
        key: &EntityKey,
        dto: UpdateStateDto,
    ) -> Result<State, AppError> {
        let mut tx = db.begin().await?;

        let before: State = fetch_by_key(&mut *tx, SELECT_STATE, key, true)
            .await?
            .ok_or_else(|| not_found(EntityKind::State))?;

        let name = dto
            .name
            .as_deref()
            .map(|v| clean("name", v))
            .transpose()?
            .unwrap_or_else(|| before.name.clone());
        let country_id = dto.country_id.unwrap_or(before.country_id);

        if country_id != before.country_id {
            ensure_exists(&mut *tx, EntityKind::Country, country_id).await?;

            // cities carry their own country_id and would be left pointing elsewhere
            let has_cities: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM cities WHERE state_id = $1)")
                    .bind(before.id)
                    .fetch_one(&mut *tx)
                    .await?;
            if has_cities {
                return Err(AppError::conflict(anyhow!(
                    "State has cities and cannot be moved to another country"
                )));
            }
        }
        Self::ensure_name_available(&mut tx, country_id, &name, Some(before.id)).await?;

        let after = sqlx::query_as::<_, State>(&format!(
            "UPDATE states SET name = $2, country_id = $3 WHERE id = $1{}",
            RETURNING
        ))
        .bind(before.id)
        .bind(&name)
        .bind(country_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::State))?;

        AuditService::updated(&mut tx, actor, &before, &after).await?;
        tx.commit().await?;

        Ok(after)
    }

    #[instrument(skip(db, actor), fields(db.operation = "DELETE", db.table = "states"))]
    pub async fn delete(
        db: &PgPool,
        actor: &ActorSnapshot,
        key: &EntityKey,
    ) -> Result<State, AppError> {
        let mut tx = db.begin().await?;

        let state: State = fetch_by_key(&mut *tx, SELECT_STATE, key, true)
            .await?
            .ok_or_else(|| not_found(EntityKind::State))?;

        ensure_unreferenced(&mut tx, EntityKind::State, state.id).await?;

        sqlx::query("DELETE FROM states WHERE id = $1")
            .bind(state.id)
            .execute(&mut *tx)
            .await
            .map_err(db_error(EntityKind::State))?;

        AuditService::deleted(&mut tx, actor, &state).await?;
        tx.commit().await?;

        Ok(state)
    }
}
