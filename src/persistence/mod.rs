// file: src/persistence/mod.rs
// description: batch persistence port and in-memory adapter

use crate::config::CourtConfig;
use crate::error::Result;
use crate::models::{
    AuditRecord, BatchId, BatchStatus, BatchUpdate, ProcessRecord, StoredFile,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Persistence consumed by the pipeline. The relational database sits on
/// the other side of this trait; the pipeline only appends audit records,
/// patches batch rows and reads what ingestion registered.
#[async_trait]
pub trait BatchStore: Send + Sync {
    /// Append-only; records are never mutated or deleted.
    async fn write_audit_record(&self, record: AuditRecord) -> Result<()>;
    async fn update_batch(&self, batch_id: BatchId, update: BatchUpdate) -> Result<()>;
    async fn list_files_for_batch(&self, batch_id: BatchId) -> Result<Vec<StoredFile>>;
    /// Default petition piece type (fk_peca) configured for a court.
    async fn court_default_piece_type(&self, court_code: &str) -> Result<Option<i64>>;
    async fn record_process(&self, record: ProcessRecord) -> Result<()>;
    async fn audit_records(&self, batch_id: BatchId) -> Result<Vec<AuditRecord>>;
}

/// Mutable state of one persisted batch row.
#[derive(Debug, Clone)]
pub struct BatchState {
    pub status: BatchStatus,
    pub success_count: u32,
    pub error_count: u32,
    pub warning_count: u32,
    pub total_processes: usize,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for BatchState {
    fn default() -> Self {
        Self {
            status: BatchStatus::Pending,
            success_count: 0,
            error_count: 0,
            warning_count: 0,
            total_processes: 0,
            finished_at: None,
        }
    }
}

impl BatchState {
    fn apply(&mut self, update: BatchUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(count) = update.success_count {
            self.success_count = count;
        }
        if let Some(count) = update.error_count {
            self.error_count = count;
        }
        if let Some(count) = update.warning_count {
            self.warning_count = count;
        }
        if let Some(total) = update.total_processes {
            self.total_processes = total;
        }
        if let Some(finished) = update.finished_at {
            self.finished_at = Some(finished);
        }
    }
}

#[derive(Default)]
struct MemoryStoreInner {
    audits: Vec<AuditRecord>,
    batches: HashMap<BatchId, BatchState>,
    files: HashMap<BatchId, Vec<StoredFile>>,
    courts: HashMap<String, CourtConfig>,
    processes: Vec<ProcessRecord>,
}

/// In-process [`BatchStore`]. Backs the CLI (one run, one process) and the
/// test suites; the hosted deployment implements the trait over its
/// relational schema instead.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_courts(courts: &[CourtConfig]) -> Self {
        let store = Self::new();
        for court in courts {
            store.seed_court(court.clone());
        }
        store
    }

    pub fn seed_court(&self, court: CourtConfig) {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        inner.courts.insert(court.code.clone(), court);
    }

    pub fn register_file(&self, batch_id: BatchId, file: StoredFile) {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        inner.files.entry(batch_id).or_default().push(file);
    }

    pub fn batch_state(&self, batch_id: BatchId) -> Option<BatchState> {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        inner.batches.get(&batch_id).cloned()
    }

    pub fn process_records(&self, batch_id: BatchId) -> Vec<ProcessRecord> {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        inner
            .processes
            .iter()
            .filter(|record| record.batch_id == batch_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl BatchStore for MemoryStore {
    async fn write_audit_record(&self, record: AuditRecord) -> Result<()> {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        inner.audits.push(record);
        Ok(())
    }

    async fn update_batch(&self, batch_id: BatchId, update: BatchUpdate) -> Result<()> {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        inner.batches.entry(batch_id).or_default().apply(update);
        Ok(())
    }

    async fn list_files_for_batch(&self, batch_id: BatchId) -> Result<Vec<StoredFile>> {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        Ok(inner.files.get(&batch_id).cloned().unwrap_or_default())
    }

    async fn court_default_piece_type(&self, court_code: &str) -> Result<Option<i64>> {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        Ok(inner
            .courts
            .get(court_code)
            .and_then(|court| court.default_piece_type))
    }

    async fn record_process(&self, record: ProcessRecord) -> Result<()> {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        inner.processes.push(record);
        Ok(())
    }

    async fn audit_records(&self, batch_id: BatchId) -> Result<Vec<AuditRecord>> {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        Ok(inner
            .audits
            .iter()
            .filter(|record| record.batch_id == batch_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StepName;

    #[tokio::test]
    async fn test_batch_update_is_partial() {
        let store = MemoryStore::new();

        store
            .update_batch(
                1,
                BatchUpdate {
                    status: Some(BatchStatus::Running),
                    total_processes: Some(3),
                    ..BatchUpdate::default()
                },
            )
            .await
            .unwrap();
        store
            .update_batch(
                1,
                BatchUpdate {
                    success_count: Some(2),
                    ..BatchUpdate::default()
                },
            )
            .await
            .unwrap();

        let state = store.batch_state(1).unwrap();
        assert_eq!(state.status, BatchStatus::Running);
        assert_eq!(state.total_processes, 3);
        assert_eq!(state.success_count, 2);
    }

    #[tokio::test]
    async fn test_audit_records_filter_by_batch() {
        let store = MemoryStore::new();
        store
            .write_audit_record(AuditRecord::success(1, StepName::BatchStart, "a"))
            .await
            .unwrap();
        store
            .write_audit_record(AuditRecord::success(2, StepName::BatchStart, "b"))
            .await
            .unwrap();

        let records = store.audit_records(1).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "a");
    }

    #[tokio::test]
    async fn test_court_defaults() {
        let store = MemoryStore::new();
        store.seed_court(CourtConfig {
            code: "8.09".to_string(),
            name: "TJGO".to_string(),
            default_piece_type: Some(57),
        });

        assert_eq!(store.court_default_piece_type("8.09").await.unwrap(), Some(57));
        assert_eq!(store.court_default_piece_type("8.26").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_files_for_unknown_batch_is_empty() {
        let store = MemoryStore::new();
        assert!(store.list_files_for_batch(42).await.unwrap().is_empty());
    }
}
