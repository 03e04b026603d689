//! Postgres error mapping.
//!
//! Constraint violations are expected outcomes of concurrent writes (two
//! requests racing past the explicit duplicate check) and map onto the
//! same statuses the explicit checks use.

use anyhow::anyhow;
use schoolyard_core::{AppError, EntityKind};

pub const UNIQUE_VIOLATION: &str = "23505";
pub const FOREIGN_KEY_VIOLATION: &str = "23503";
pub const CHECK_VIOLATION: &str = "23514";

/// Converts a [`sqlx::Error`] raised while writing `kind` into an [`AppError`].
pub fn map_db_error(kind: EntityKind, err: sqlx::Error) -> AppError {
    if let sqlx::Error::RowNotFound = err {
        return AppError::not_found(anyhow!("{} not found", kind.label()));
    }

    let code = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|c| c.into_owned());

    match code.as_deref() {
        Some(UNIQUE_VIOLATION) => {
            AppError::conflict(anyhow!("{} with these details already exists", kind.label()))
        }
        Some(FOREIGN_KEY_VIOLATION) => AppError::conflict(anyhow!(
            "{} conflicts with related records",
            kind.label()
        )),
        Some(CHECK_VIOLATION) => {
            AppError::bad_request(anyhow!("{} violates a data constraint", kind.label()))
        }
        _ => AppError::internal(err),
    }
}

/// `map_err` adapter: `.await.map_err(db_error(EntityKind::Class))?`
pub fn db_error(kind: EntityKind) -> impl Fn(sqlx::Error) -> AppError {
    move |err| map_db_error(kind, err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_is_404() {
        let err = map_db_error(EntityKind::Exam, sqlx::Error::RowNotFound);
        assert_eq!(err.status.as_u16(), 404);
        assert_eq!(err.public_message(), "Exam not found");
    }

    #[test]
    fn test_other_errors_are_internal() {
        let err = db_error(EntityKind::City)(sqlx::Error::PoolTimedOut);
        assert_eq!(err.status.as_u16(), 500);
        assert_eq!(err.public_message(), "Internal server error");
    }
}
