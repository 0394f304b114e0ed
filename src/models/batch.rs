// file: src/models/batch.rs
// description: batch execution state, partial updates and stored-file records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type BatchId = i64;

/// Lifecycle of a batch run. Terminal states are final: a stopped or
/// failed batch is never resumed, a fresh batch must be created to retry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Running,
    Completed,
    Stopped,
    Failed,
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchStatus::Pending => write!(f, "pending"),
            BatchStatus::Running => write!(f, "running"),
            BatchStatus::Completed => write!(f, "completed"),
            BatchStatus::Stopped => write!(f, "stopped"),
            BatchStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Execution context for one batch. Counters are mutated only by the
/// single orchestrator worker driving that batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRun {
    pub batch_id: BatchId,
    /// Signing credential used for every petition in this run.
    pub certificate_id: i64,
    pub status: BatchStatus,
    pub success_count: u32,
    pub error_count: u32,
    pub warning_count: u32,
    pub current_index: usize,
    pub total_processes: usize,
}

impl BatchRun {
    pub fn new(batch_id: BatchId, certificate_id: i64) -> Self {
        Self {
            batch_id,
            certificate_id,
            status: BatchStatus::Pending,
            success_count: 0,
            error_count: 0,
            warning_count: 0,
            current_index: 0,
            total_processes: 0,
        }
    }

    /// Partial update carrying the run's current counters.
    pub fn counters(&self) -> BatchUpdate {
        BatchUpdate {
            success_count: Some(self.success_count),
            error_count: Some(self.error_count),
            warning_count: Some(self.warning_count),
            ..BatchUpdate::default()
        }
    }
}

/// Partial field update for a persisted batch record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchUpdate {
    pub status: Option<BatchStatus>,
    pub success_count: Option<u32>,
    pub error_count: Option<u32>,
    pub warning_count: Option<u32>,
    pub total_processes: Option<usize>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// One uploaded file as registered at ingest time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    pub original_name: String,
    pub storage_key: String,
    pub size_bytes: u64,
    pub sha256: Option<String>,
}

/// Persisted record of one successfully protocoled process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub batch_id: BatchId,
    pub cnj: String,
    pub court_code: String,
    pub remote_process_id: i64,
    pub remote_petition_id: i64,
    pub protocol_number: String,
    pub principal_file: String,
    pub attachment_count: usize,
}
