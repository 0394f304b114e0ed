// file: src/pipeline/mod.rs
// description: batch filing pipeline: timeouts, progress bus, orchestrator, service

pub mod orchestrator;
pub mod progress;
pub mod service;
pub mod timeout;

pub use orchestrator::BatchOrchestrator;
pub use progress::{BatchEvent, LogLevel, ProgressBus};
pub use service::FilingService;
pub use timeout::{CONTROL_STEP_TIMEOUT, SUBMIT_TIMEOUT, upload_timeout};
