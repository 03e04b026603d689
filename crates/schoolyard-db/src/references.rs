//! Reference-integrity scan.
//!
//! Before a row is deleted every table that can point at it is probed in
//! turn with `SELECT EXISTS(...)`; the first hit refuses the delete with
//! 409. The probes run on the deleting transaction's connection, after the
//! target row has been locked, so a concurrent insert of a referencing row
//! is caught by the `ON DELETE RESTRICT` foreign keys instead.

use anyhow::anyhow;
use schoolyard_core::{AppError, EntityKind};
use sqlx::PgConnection;
use tracing::{debug, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceCheck {
    pub table: &'static str,
    pub column: &'static str,
}

const fn check(table: &'static str, column: &'static str) -> ReferenceCheck {
    ReferenceCheck { table, column }
}

const COUNTRY: &[ReferenceCheck] = &[
    check("states", "country_id"),
    check("cities", "country_id"),
    check("profiles", "country_id"),
    check("students", "country_id"),
];

const STATE: &[ReferenceCheck] = &[
    check("cities", "state_id"),
    check("profiles", "state_id"),
    check("students", "state_id"),
];

const CITY: &[ReferenceCheck] = &[check("profiles", "city_id"), check("students", "city_id")];

const PERMISSION: &[ReferenceCheck] = &[check("role_permissions", "permission_id")];

const ROLE: &[ReferenceCheck] = &[check("users", "role_id")];

const USER: &[ReferenceCheck] = &[check("profiles", "user_id")];

const CLASS: &[ReferenceCheck] = &[
    check("sections", "class_id"),
    check("subjects", "class_id"),
    check("students", "class_id"),
    check("exams", "class_id"),
];

const SECTION: &[ReferenceCheck] = &[check("students", "section_id")];

const SUBJECT: &[ReferenceCheck] = &[check("exams", "subject_id")];

/// Tables whose rows may reference an entity of `kind`.
pub fn references_for(kind: EntityKind) -> &'static [ReferenceCheck] {
    match kind {
        EntityKind::Country => COUNTRY,
        EntityKind::State => STATE,
        EntityKind::City => CITY,
        EntityKind::Permission => PERMISSION,
        EntityKind::Role => ROLE,
        EntityKind::User => USER,
        EntityKind::Class => CLASS,
        EntityKind::Section => SECTION,
        EntityKind::Subject => SUBJECT,
        EntityKind::Profile | EntityKind::Student | EntityKind::Exam | EntityKind::AuditLog => &[],
    }
}

impl ReferenceCheck {
    pub fn exists_sql(&self) -> String {
        format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = $1)",
            self.table, self.column
        )
    }
}

/// Returns the first table that still references `id`.
#[instrument(skip(conn, checks), fields(db.operation = "SELECT", references = checks.len()))]
pub async fn find_reference(
    conn: &mut PgConnection,
    checks: &'static [ReferenceCheck],
    id: Uuid,
) -> Result<Option<&'static ReferenceCheck>, sqlx::Error> {
    for check in checks {
        let referenced: bool = sqlx::query_scalar(&check.exists_sql())
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;

        if referenced {
            debug!(table = %check.table, column = %check.column, "Reference found");
            return Ok(Some(check));
        }
    }

    Ok(None)
}

/// Refuses with 409 when anything still references the row.
pub async fn ensure_unreferenced(
    conn: &mut PgConnection,
    kind: EntityKind,
    id: Uuid,
) -> Result<(), AppError> {
    match find_reference(conn, references_for(kind), id).await? {
        Some(check) => Err(AppError::conflict(anyhow!(
            "{} is referenced by {} and cannot be deleted",
            kind.label(),
            check.table
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exists_sql() {
        assert_eq!(
            check("sections", "class_id").exists_sql(),
            "SELECT EXISTS(SELECT 1 FROM sections WHERE class_id = $1)"
        );
    }

    #[test]
    fn test_reference_tables() {
        assert_eq!(references_for(EntityKind::Class).len(), 4);
        assert_eq!(references_for(EntityKind::Class)[0].table, "sections");
        assert_eq!(references_for(EntityKind::Role), &[check("users", "role_id")]);
        assert!(references_for(EntityKind::Student).is_empty());
        assert!(references_for(EntityKind::Exam).is_empty());
    }

    #[test]
    fn test_every_check_targets_an_id_column() {
        for kind in EntityKind::ALL {
            for check in references_for(kind) {
                assert!(check.column.ends_with("_id"), "{:?}", check);
            }
        }
    }
}
