// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/readme.md"))]

pub mod client;
pub mod config;
pub mod error;
pub mod exporter;
pub mod models;
pub mod parser;
pub mod persistence;
pub mod pipeline;
pub mod storage;
pub mod utils;

pub use client::{
    FilingApi, LegalMailClient, PetitionHandle, PetitionStatus, ProcessHandle,
    VerificationOutcome, verify_batch, verify_petition,
};
pub use config::{ApiConfig, Config, CourtConfig, PipelineConfig, StorageConfig};
pub use error::{FilingError, Result};
pub use exporter::{AuditExporter, ExportManifest};
pub use models::{
    AuditRecord, BatchId, BatchRun, BatchStatus, BatchUpdate, FileDescriptor, Outcome,
    ProcessGroup, ProcessRecord, StepName, StoredFile,
};
pub use parser::{canonicalize_cnj, group, normalize_filename, parse, select_principal};
pub use persistence::{BatchStore, MemoryStore};
pub use pipeline::{
    BatchEvent, BatchOrchestrator, FilingService, LogLevel, ProgressBus, upload_timeout,
};
pub use storage::{
    Archiver, DocumentKind, LocalStorage, ObjectStorage, PdfScanner, ScannedPdf, StoredObject,
    unique_file_name,
};
pub use utils::{OperationTimer, Validator};
