use schoolyard_core::EntityKind;
use schoolyard_core::permissions::CATALOGUE;
use sqlx::PgPool;

/// Outcome of a catalogue sync.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub inserted: usize,
    pub updated: usize,
}

/// Upserts every catalogue permission by name. Existing rows keep their id
/// and code; their module and description are refreshed.
pub async fn sync_permissions(db: &PgPool) -> anyhow::Result<SyncReport> {
    let mut tx = db.begin().await?;
    let mut report = SyncReport::default();

    for (name, module, description) in CATALOGUE {
        // xmax is zero only for rows this statement inserted
        let inserted: bool = sqlx::query_scalar(
            "INSERT INTO permissions (code, name, module, description)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (name) DO UPDATE
                SET module = EXCLUDED.module, description = EXCLUDED.description
             RETURNING (xmax = 0)",
        )
        .bind(EntityKind::Permission.new_code())
        .bind(name)
        .bind(module)
        .bind(description)
        .fetch_one(&mut *tx)
        .await?;

        if inserted {
            report.inserted += 1;
        } else {
            report.updated += 1;
        }
    }

    tx.commit().await?;
    Ok(report)
}
