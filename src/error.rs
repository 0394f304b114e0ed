// file: src/error.rs
// description: Custom error types and result type aliases
// reference: https://docs.rs/thiserror

use crate::models::StepName;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FilingError>;

#[derive(Error, Debug)]
pub enum FilingError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Filename unparsable for {file}: {reason}")]
    ParseInvalid { file: String, reason: String },

    #[error("Process {cnj} not found in the filing system")]
    ProcessNotFound { cnj: String },

    #[error("No principal document identified for process {cnj}")]
    MissingPrincipal { cnj: String },

    #[error("Court {court_code} has no default petition type configured")]
    MissingCourtConfig { court_code: String },

    #[error("Timed out after {limit_secs}s during {step}")]
    UploadTimeout { step: StepName, limit_secs: u64 },

    #[error("Filing API error ({status}): {message}")]
    RemoteApi { status: u16, message: String },

    #[error("Failed to read {key} from object storage: {message}")]
    StorageRead { key: String, message: String },

    #[error("Batch failed: {0}")]
    FatalBatch(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
