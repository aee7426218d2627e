//! Job progress reporting
//!
//! The import engine writes keyed snapshots to a sink as it works; readers
//! poll by job id. Progress only moves forward: a reported value lower than
//! what was already written is raised to the high-water mark, so a consumer
//! never sees the bar move backwards.
//!
//! Sink failures are logged and swallowed; losing a progress update must
//! not fail an import.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::db;
use crate::Result;
use cartrec_common::{ImportStats, JobSnapshot, JobStatus, JobSummary};

/// Keyed snapshot store
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn write(&self, job_id: Uuid, snapshot: &JobSnapshot) -> Result<()>;
}

/// Sink backed by the local database's `import_jobs` table
pub struct DbProgressSink {
    pool: SqlitePool,
    tenant_id: Uuid,
}

impl DbProgressSink {
    pub fn new(pool: SqlitePool, tenant_id: Uuid) -> Self {
        Self { pool, tenant_id }
    }
}

#[async_trait]
impl ProgressSink for DbProgressSink {
    async fn write(&self, job_id: Uuid, snapshot: &JobSnapshot) -> Result<()> {
        db::jobs::write_snapshot(&self.pool, job_id, self.tenant_id, snapshot).await
    }
}

/// In-memory sink, for tests and dry runs
#[derive(Default)]
pub struct MemorySink {
    snapshots: Mutex<HashMap<Uuid, Vec<JobSnapshot>>>,
}

impl MemorySink {
    pub fn history(&self, job_id: Uuid) -> Vec<JobSnapshot> {
        self.snapshots
            .lock()
            .map(|map| map.get(&job_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProgressSink for MemorySink {
    async fn write(&self, job_id: Uuid, snapshot: &JobSnapshot) -> Result<()> {
        if let Ok(mut map) = self.snapshots.lock() {
            map.entry(job_id).or_default().push(snapshot.clone());
        }
        Ok(())
    }
}

/// Stateful reporter for one job. Enforces monotonic progress and carries
/// the running stats into every snapshot.
pub struct ProgressReporter<'a> {
    sink: &'a dyn ProgressSink,
    job_id: Uuid,
    high_water: u8,
    stats: ImportStats,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: &'a dyn ProgressSink, job_id: Uuid) -> Self {
        Self {
            sink,
            job_id,
            high_water: 0,
            stats: ImportStats::default(),
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn stats(&self) -> ImportStats {
        self.stats
    }

    pub fn merge_stats(&mut self, stats: ImportStats) {
        self.stats.merge(stats);
    }

    /// Report the connecting phase, before any data moves
    pub async fn connecting(&mut self, message: &str) {
        self.high_water = self.high_water.max(5);
        let snapshot = JobSnapshot {
            status: JobStatus::Connecting,
            progress: self.high_water,
            message: message.to_string(),
            stats: self.stats,
            error: None,
        };
        self.emit(&snapshot).await;
    }

    /// Report forward progress. Values below the high-water mark are raised
    /// to it.
    pub async fn update(&mut self, progress: u8, message: &str) {
        self.high_water = self.high_water.max(progress.min(100));
        let snapshot = JobSnapshot::running(self.high_water, message, self.stats);
        self.emit(&snapshot).await;
    }

    /// Terminal success snapshot at 100
    pub async fn finish(&mut self, message: &str) {
        self.high_water = 100;
        let snapshot = JobSnapshot {
            status: JobStatus::Done,
            progress: 100,
            message: message.to_string(),
            stats: self.stats,
            error: None,
        };
        self.emit(&snapshot).await;
    }

    /// Terminal failure snapshot; progress stays at the high-water mark
    pub async fn fail(&mut self, error: &str) {
        let snapshot = JobSnapshot {
            status: JobStatus::Error,
            progress: self.high_water,
            message: "Import failed".to_string(),
            stats: self.stats,
            error: Some(error.to_string()),
        };
        self.emit(&snapshot).await;
    }

    async fn emit(&self, snapshot: &JobSnapshot) {
        if let Err(e) = self.sink.write(self.job_id, snapshot).await {
            tracing::warn!(job_id = %self.job_id, error = %e, "Failed to write progress snapshot");
        }
    }
}

/// Build the terminal summary handed back to the caller
pub fn summarize(
    status: JobStatus,
    stats: ImportStats,
    recovery: &crate::recovery::RecoveryReport,
) -> JobSummary {
    JobSummary {
        status,
        stats,
        recovered_count: recovery.recovered,
        abandoned_count: recovery.abandoned,
        pending_count: recovery.pending,
        recovery_rate: recovery.recovery_rate(),
        recovered_value: recovery.recovered_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn progress_never_moves_backwards() {
        let sink = MemorySink::default();
        let job_id = Uuid::new_v4();
        let mut reporter = ProgressReporter::new(&sink, job_id);

        reporter.update(40, "carts").await;
        reporter.update(20, "late straggler").await;
        reporter.update(75, "orders").await;
        reporter.finish("done").await;

        let history = sink.history(job_id);
        let progresses: Vec<u8> = history.iter().map(|s| s.progress).collect();
        assert_eq!(progresses, vec![40, 40, 75, 100]);
        assert!(progresses.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(history.last().unwrap().status, JobStatus::Done);
    }

    #[tokio::test]
    async fn failure_keeps_high_water_mark_and_error() {
        let sink = MemorySink::default();
        let job_id = Uuid::new_v4();
        let mut reporter = ProgressReporter::new(&sink, job_id);

        reporter.connecting("Connecting to storefront").await;
        reporter.update(30, "carts").await;
        reporter.fail("source went away").await;

        let last = sink.history(job_id).pop().unwrap();
        assert_eq!(last.status, JobStatus::Error);
        assert_eq!(last.progress, 30);
        assert_eq!(last.error.as_deref(), Some("source went away"));
    }

    #[tokio::test]
    async fn stats_ride_along_in_snapshots() {
        let sink = MemorySink::default();
        let job_id = Uuid::new_v4();
        let mut reporter = ProgressReporter::new(&sink, job_id);

        reporter.merge_stats(ImportStats {
            created: 7,
            updated: 2,
            skipped: 1,
            errored: 0,
        });
        reporter.update(50, "halfway").await;

        let last = sink.history(job_id).pop().unwrap();
        assert_eq!(last.stats.created, 7);
        assert_eq!(last.stats.updated, 2);
    }
}
