// file: src/models/mod.rs
// description: data model exports

pub mod audit;
pub mod batch;
pub mod file;
pub mod group;

pub use audit::{AuditRecord, Outcome, StepName, binary_payload_summary};
pub use batch::{BatchId, BatchRun, BatchStatus, BatchUpdate, ProcessRecord, StoredFile};
pub use file::FileDescriptor;
pub use group::ProcessGroup;
