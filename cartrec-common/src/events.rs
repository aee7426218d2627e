//! Import job progress types
//!
//! Snapshots written by the import engine to a keyed progress sink.
//! Readers poll; nothing is pushed.

use serde::{Deserialize, Serialize};

/// Lifecycle of one import job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Establishing source connectivity
    Connecting,
    /// Import phases executing
    Running,
    /// Terminal: completed
    Done,
    /// Terminal: failed with an unhandled error
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Connecting => "connecting",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }
}

/// Running counters for one import job
///
/// Per-record failures are absorbed into `errored`; the summary never
/// silently drops the discrepancy between rows seen and rows stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStats {
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub errored: u64,
}

impl ImportStats {
    pub fn merge(&mut self, other: ImportStats) {
        self.created += other.created;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.errored += other.errored;
    }
}

/// One progress snapshot, keyed by job id in the sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub status: JobStatus,
    /// 0-100, monotonically non-decreasing within a job
    pub progress: u8,
    pub message: String,
    pub stats: ImportStats,
    /// Error text, only present on terminal error snapshots
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobSnapshot {
    pub fn running(progress: u8, message: impl Into<String>, stats: ImportStats) -> Self {
        Self {
            status: JobStatus::Running,
            progress: progress.min(100),
            message: message.into(),
            stats,
            error: None,
        }
    }
}

/// Terminal summary of one import job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub status: JobStatus,
    pub stats: ImportStats,
    pub recovered_count: u64,
    pub abandoned_count: u64,
    pub pending_count: u64,
    /// recovered / (recovered + finally abandoned); 0 when the denominator is 0
    pub recovery_rate: f64,
    pub recovered_value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_progress_is_capped() {
        let snap = JobSnapshot::running(150, "x", ImportStats::default());
        assert_eq!(snap.progress, 100);
    }

    #[test]
    fn stats_merge_accumulates() {
        let mut a = ImportStats {
            created: 1,
            updated: 2,
            skipped: 0,
            errored: 1,
        };
        a.merge(ImportStats {
            created: 3,
            updated: 0,
            skipped: 5,
            errored: 0,
        });
        assert_eq!(a.created, 4);
        assert_eq!(a.skipped, 5);
        assert_eq!(a.errored, 1);
    }
}
