use schoolyard_core::codes::EntityKey;
use schoolyard_core::{AppError, EntityKind, ListParams, Page};
use schoolyard_db::pipeline::{fetch_document, fetch_page};
use schoolyard_db::{Filters, ListQuery, PgPool};
use schoolyard_observability::track_audit_recorded;
use serde_json::{Map, Value};
use sqlx::{PgConnection, Postgres, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::model::{
    AUDIT_LOG_LIST, ActorSnapshot, AuditAction, AuditLogFilterParams, Auditable,
};

/// Keys ignored when working out what an update changed.
const VOLATILE_KEYS: &[&str] = &["created_at", "updated_at"];

/// One row of the audit trail, ready to insert.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub kind: EntityKind,
    pub entity_id: Uuid,
    pub entity_code: String,
    pub action: AuditAction,
    pub label: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

impl AuditEntry {
    pub fn created<T: Auditable>(record: &T) -> Result<Self, AppError> {
        Ok(Self {
            kind: T::KIND,
            entity_id: record.id(),
            entity_code: record.code().to_string(),
            action: AuditAction::Create,
            label: format!("Created {} {}", kind_name(T::KIND), record.display()),
            before: None,
            after: Some(serde_json::to_value(record)?),
        })
    }

    pub fn updated<T: Auditable>(before: &T, after: &T) -> Result<Self, AppError> {
        let before_value = serde_json::to_value(before)?;
        let after_value = serde_json::to_value(after)?;
        let changed = changed_keys(&before_value, &after_value);

        Ok(Self {
            kind: T::KIND,
            entity_id: after.id(),
            entity_code: after.code().to_string(),
            action: AuditAction::Update,
            label: update_label(T::KIND, &after.display(), &changed),
            before: Some(before_value),
            after: Some(after_value),
        })
    }

    pub fn deleted<T: Auditable>(record: &T) -> Result<Self, AppError> {
        Ok(Self {
            kind: T::KIND,
            entity_id: record.id(),
            entity_code: record.code().to_string(),
            action: AuditAction::Delete,
            label: format!("Deleted {} {}", kind_name(T::KIND), record.display()),
            before: Some(serde_json::to_value(record)?),
            after: None,
        })
    }

    /// Replaces the generated label, for changes that do not show up as a
    /// field difference (a password reset, for instance).
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

fn kind_name(kind: EntityKind) -> String {
    kind.as_str().replace('_', " ")
}

/// Top-level keys whose values differ, timestamps excluded.
pub fn changed_keys(before: &Value, after: &Value) -> Vec<String> {
    let empty = Map::new();
    let before = before.as_object().unwrap_or(&empty);
    let after = after.as_object().unwrap_or(&empty);

    let mut keys: Vec<String> = before
        .keys()
        .chain(after.keys())
        .filter(|key| !VOLATILE_KEYS.contains(&key.as_str()))
        .filter(|key| before.get(*key) != after.get(*key))
        .cloned()
        .collect();
    keys.sort();
    keys.dedup();
    keys
}

pub fn update_label(kind: EntityKind, display: &str, changed: &[String]) -> String {
    let changes = if changed.is_empty() {
        "no changes".to_string()
    } else {
        changed.join(", ")
    };
    format!("Updated {} {} ({})", kind_name(kind), display, changes)
}

pub struct AuditService;

impl AuditService {
    /// Appends `entry` on the caller's transaction, so the audit row commits
    /// or rolls back together with the change it describes.
    #[instrument(skip(conn, actor, entry), fields(audit.kind = %entry.kind, audit.action = entry.action.as_str(), db.operation = "INSERT", db.table = "audit_logs"))]
    pub async fn record(
        conn: &mut PgConnection,
        actor: &ActorSnapshot,
        entry: AuditEntry,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO audit_logs
                (code, actor, actor_id, entity_kind, entity_id, entity_code, action, label, before, after)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(EntityKind::AuditLog.new_code())
        .bind(sqlx::types::Json(actor))
        .bind(actor.id)
        .bind(entry.kind.as_str())
        .bind(entry.entity_id)
        .bind(&entry.entity_code)
        .bind(entry.action.as_str())
        .bind(&entry.label)
        .bind(&entry.before)
        .bind(&entry.after)
        .execute(&mut *conn)
        .await?;

        track_audit_recorded(entry.kind.as_str(), entry.action.as_str());
        debug!(audit.label = %entry.label, "Audit entry recorded");

        Ok(())
    }

    /// Records `entry` and commits, consuming the transaction.
    pub async fn record_and_commit(
        mut tx: Transaction<'_, Postgres>,
        actor: &ActorSnapshot,
        entry: AuditEntry,
    ) -> Result<(), AppError> {
        Self::record(&mut tx, actor, entry).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn created<T: Auditable>(
        conn: &mut PgConnection,
        actor: &ActorSnapshot,
        record: &T,
    ) -> Result<(), AppError> {
        Self::record(conn, actor, AuditEntry::created(record)?).await
    }

    pub async fn updated<T: Auditable>(
        conn: &mut PgConnection,
        actor: &ActorSnapshot,
        before: &T,
        after: &T,
    ) -> Result<(), AppError> {
        Self::record(conn, actor, AuditEntry::updated(before, after)?).await
    }

    pub async fn deleted<T: Auditable>(
        conn: &mut PgConnection,
        actor: &ActorSnapshot,
        record: &T,
    ) -> Result<(), AppError> {
        Self::record(conn, actor, AuditEntry::deleted(record)?).await
    }

    #[instrument(skip(db, params, filters), fields(db.operation = "SELECT", db.table = "audit_logs"))]
    pub async fn list(
        db: &PgPool,
        params: &ListParams,
        filters: AuditLogFilterParams,
    ) -> Result<Page<Value>, AppError> {
        if let Some(kind) = filters.entity_kind.as_deref().filter(|k| !k.is_empty()) {
            kind.parse::<EntityKind>().map_err(|e| AppError::bad_request(anyhow::anyhow!(e)))?;
        }

        let filters = Filters::new()
            .text("entity_kind", filters.entity_kind.as_deref())
            .text("entity_code", filters.entity_code.as_deref())
            .text("action", filters.action.as_deref())
            .uuid("actor_id", filters.actor_id)
            .into_vec();

        let query = ListQuery::new(&AUDIT_LOG_LIST, params, filters)?;
        fetch_page(db, &query).await
    }

    #[instrument(skip(db), fields(db.operation = "SELECT", db.table = "audit_logs"))]
    pub async fn get(db: &PgPool, key: &EntityKey) -> Result<Value, AppError> {
        fetch_document(db, &AUDIT_LOG_LIST, key, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_json::json;

    #[derive(Serialize)]
    struct Widget {
        id: Uuid,
        code: String,
        name: String,
        capacity: i32,
        updated_at: String,
    }

    impl Auditable for Widget {
        const KIND: EntityKind = EntityKind::Section;

        fn id(&self) -> Uuid {
            self.id
        }

        fn code(&self) -> &str {
            &self.code
        }

        fn display(&self) -> String {
            self.name.clone()
        }
    }

    fn widget(name: &str, capacity: i32, updated_at: &str) -> Widget {
        Widget {
            id: Uuid::nil(),
            code: "SECTION-1".to_string(),
            name: name.to_string(),
            capacity,
            updated_at: updated_at.to_string(),
        }
    }

    #[test]
    fn test_changed_keys_ignores_timestamps() {
        let before = json!({"name": "A", "capacity": 10, "updated_at": "t1"});
        let after = json!({"name": "B", "capacity": 10, "updated_at": "t2"});
        assert_eq!(changed_keys(&before, &after), vec!["name"]);
    }

    #[test]
    fn test_changed_keys_includes_added_and_removed() {
        let before = json!({"name": "A", "old": 1});
        let after = json!({"name": "A", "new": 2});
        assert_eq!(changed_keys(&before, &after), vec!["new", "old"]);
    }

    #[test]
    fn test_created_entry() {
        let entry = AuditEntry::created(&widget("Blue", 30, "t")).unwrap();
        assert_eq!(entry.action, AuditAction::Create);
        assert_eq!(entry.label, "Created section Blue");
        assert!(entry.before.is_none());
        assert_eq!(entry.after.unwrap()["capacity"], 30);
    }

    #[test]
    fn test_updated_entry_lists_changed_fields() {
        let entry =
            AuditEntry::updated(&widget("Blue", 30, "t1"), &widget("Green", 35, "t2")).unwrap();
        assert_eq!(entry.label, "Updated section Green (capacity, name)");
        assert_eq!(entry.before.unwrap()["name"], "Blue");
    }

    #[test]
    fn test_updated_entry_without_changes() {
        let entry =
            AuditEntry::updated(&widget("Blue", 30, "t1"), &widget("Blue", 30, "t2")).unwrap();
        assert_eq!(entry.label, "Updated section Blue (no changes)");
    }

    #[test]
    fn test_deleted_entry() {
        let entry = AuditEntry::deleted(&widget("Blue", 30, "t")).unwrap();
        assert_eq!(entry.label, "Deleted section Blue");
        assert!(entry.after.is_none());
        assert_eq!(entry.entity_code, "SECTION-1");
    }

    #[test]
    fn test_multi_word_kind_name() {
        assert_eq!(
            update_label(EntityKind::AuditLog, "x", &[]),
            "Updated audit log x (no changes)"
        );
    }

    #[test]
    fn test_with_label_overrides() {
        let entry = AuditEntry::updated(&widget("Blue", 30, "t"), &widget("Blue", 30, "t"))
            .unwrap()
            .with_label("Reset password for section Blue");
        assert_eq!(entry.label, "Reset password for section Blue");
    }
}
