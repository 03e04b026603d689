//! Fetching typed rows by [`EntityKey`].

use anyhow::anyhow;
use schoolyard_core::codes::EntityKey;
use schoolyard_core::{AppError, EntityKind};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgExecutor, QueryBuilder};
use uuid::Uuid;

/// Runs `select` (a `SELECT ... FROM <table>` without a WHERE clause)
/// restricted to the row addressed by `key`. `for_update` locks the row
/// for the rest of the transaction.
pub async fn fetch_by_key<'e, T, E>(
    executor: E,
    select: &str,
    key: &EntityKey,
    for_update: bool,
) -> Result<Option<T>, sqlx::Error>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    E: PgExecutor<'e>,
{
    let mut qb = key_query(select, key);
    if for_update {
        qb.push(" FOR UPDATE");
    }
    qb.build_query_as::<T>().fetch_optional(executor).await
}

pub fn key_query<'a>(select: &str, key: &EntityKey) -> QueryBuilder<'a, sqlx::Postgres> {
    let mut qb = QueryBuilder::new(select);
    match key {
        EntityKey::Id(id) => {
            qb.push(" WHERE id = ").push_bind(*id);
        }
        EntityKey::Code(code) => {
            qb.push(" WHERE code = ").push_bind(code.clone());
        }
    }
    qb
}

/// Checks that a record referenced from a request body exists.
pub async fn ensure_exists<'e, E>(executor: E, kind: EntityKind, id: Uuid) -> Result<(), AppError>
where
    E: PgExecutor<'e>,
{
    let exists: bool = sqlx::query_scalar(&format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
        kind.table()
    ))
    .bind(id)
    .fetch_one(executor)
    .await?;

    if exists {
        Ok(())
    } else {
        Err(AppError::not_found(anyhow!("{} not found", kind.label())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_key_query_by_id_and_code() {
        let by_id = key_query("SELECT * FROM classes", &EntityKey::Id(Uuid::nil()));
        assert_eq!(by_id.sql(), "SELECT * FROM classes WHERE id = $1");

        let by_code = key_query("SELECT * FROM classes", &EntityKey::Code("CLASS-1".into()));
        assert_eq!(by_code.sql(), "SELECT * FROM classes WHERE code = $1");
    }
}
