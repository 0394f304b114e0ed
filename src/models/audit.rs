// file: src/models/audit.rs
// description: append-only audit records for every remote call and lifecycle transition

use crate::models::BatchId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pipeline step a record belongs to. Closed set so every consumer handles
/// the full vocabulary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum StepName {
    BatchStart,
    ParseFiles,
    LocateProcess,
    CreatePetition,
    UploadPrincipal,
    UploadAttachment,
    ArchiveDocument,
    SubmitProtocol,
    ProcessComplete,
    BatchStop,
    BatchComplete,
    BatchFailed,
}

impl std::fmt::Display for StepName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StepName::BatchStart => "batch-start",
            StepName::ParseFiles => "parse-files",
            StepName::LocateProcess => "locate-process",
            StepName::CreatePetition => "create-petition",
            StepName::UploadPrincipal => "upload-principal",
            StepName::UploadAttachment => "upload-attachment",
            StepName::ArchiveDocument => "archive-document",
            StepName::SubmitProtocol => "submit-protocol",
            StepName::ProcessComplete => "process-complete",
            StepName::BatchStop => "batch-stop",
            StepName::BatchComplete => "batch-complete",
            StepName::BatchFailed => "batch-failed",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Error,
    Warning,
}

/// One logged step of remote interaction. Append-only: written once,
/// never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub batch_id: BatchId,
    /// Canonical CNJ of the process the step belongs to; absent for
    /// batch-lifecycle records.
    pub process_id: Option<String>,
    pub step: StepName,
    pub outcome: Outcome,
    pub message: String,
    pub error_detail: Option<String>,
    pub request_method: Option<String>,
    pub request_url: Option<String>,
    /// Payload as logged. Binary bodies are summarized, never stored raw.
    pub request_payload: Option<String>,
    pub response_status: Option<u16>,
    pub response_payload: Option<String>,
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(batch_id: BatchId, step: StepName, outcome: Outcome, message: impl Into<String>) -> Self {
        Self {
            batch_id,
            process_id: None,
            step,
            outcome,
            message: message.into(),
            error_detail: None,
            request_method: None,
            request_url: None,
            request_payload: None,
            response_status: None,
            response_payload: None,
            duration_ms: 0,
            created_at: Utc::now(),
        }
    }

    pub fn success(batch_id: BatchId, step: StepName, message: impl Into<String>) -> Self {
        Self::new(batch_id, step, Outcome::Success, message)
    }

    pub fn error(batch_id: BatchId, step: StepName, message: impl Into<String>) -> Self {
        Self::new(batch_id, step, Outcome::Error, message)
    }

    pub fn warning(batch_id: BatchId, step: StepName, message: impl Into<String>) -> Self {
        Self::new(batch_id, step, Outcome::Warning, message)
    }

    pub fn with_process(mut self, cnj: impl Into<String>) -> Self {
        self.process_id = Some(cnj.into());
        self
    }

    pub fn with_request(mut self, method: &str, url: impl Into<String>, payload: Option<String>) -> Self {
        self.request_method = Some(method.to_string());
        self.request_url = Some(url.into());
        self.request_payload = payload;
        self
    }

    pub fn with_response(mut self, status: u16, payload: Option<String>) -> Self {
        self.response_status = Some(status);
        self.response_payload = payload.map(|p| clip(&p, MAX_PAYLOAD_CHARS));
        self
    }

    pub fn with_error_detail(mut self, detail: impl Into<String>) -> Self {
        self.error_detail = Some(detail.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

const MAX_PAYLOAD_CHARS: usize = 2000;

/// Stand-in stored in place of raw binary request bodies.
pub fn binary_payload_summary(size_bytes: u64) -> String {
    let mib = size_bytes as f64 / (1024.0 * 1024.0);
    format!("[truncated - {:.2} MiB binary payload]", mib)
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let clipped: String = text.chars().take(max_chars).collect();
        format!("{}...", clipped)
    }
}
