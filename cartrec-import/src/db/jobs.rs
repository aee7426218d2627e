//! Import job progress persistence
//!
//! Snapshot rows readers poll while a job runs. The full snapshot is stored
//! as JSON; status and progress are mirrored into columns for cheap listing.

use cartrec_common::JobSnapshot;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::{Error, Result};

pub async fn write_snapshot(
    pool: &SqlitePool,
    job_id: Uuid,
    tenant_id: Uuid,
    snapshot: &JobSnapshot,
) -> Result<()> {
    let body = serde_json::to_string(snapshot)
        .map_err(|e| Error::Internal(format!("Failed to serialize snapshot: {e}")))?;

    sqlx::query(
        r#"
        INSERT INTO import_jobs (job_id, tenant_id, status, progress, snapshot, updated_at)
        VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(job_id) DO UPDATE SET
            status = excluded.status,
            progress = excluded.progress,
            snapshot = excluded.snapshot,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(job_id.to_string())
    .bind(tenant_id.to_string())
    .bind(snapshot.status.as_str())
    .bind(snapshot.progress as i64)
    .bind(body)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn read_snapshot(pool: &SqlitePool, job_id: Uuid) -> Result<Option<JobSnapshot>> {
    let row = sqlx::query("SELECT snapshot FROM import_jobs WHERE job_id = ?")
        .bind(job_id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let body: String = row.get("snapshot");
            let snapshot = serde_json::from_str(&body)
                .map_err(|e| Error::Internal(format!("Failed to deserialize snapshot: {e}")))?;
            Ok(Some(snapshot))
        }
        None => Ok(None),
    }
}
