// file: src/pipeline/orchestrator.rs
// description: drives one batch through the remote filing protocol
// reference: orchestrates locate -> petition -> upload -> protocol per process

use crate::client::FilingApi;
use crate::error::{FilingError, Result};
use crate::models::{
    AuditRecord, BatchId, BatchRun, BatchStatus, BatchUpdate, FileDescriptor, ProcessGroup,
    ProcessRecord, StepName, StoredFile, binary_payload_summary,
};
use crate::parser::{filename, grouper};
use crate::persistence::BatchStore;
use crate::pipeline::progress::{BatchEvent, LogLevel, ProgressBus};
use crate::pipeline::timeout::{CONTROL_STEP_TIMEOUT, SUBMIT_TIMEOUT, upload_timeout};
use crate::storage::{Archiver, DocumentKind, ObjectStorage};
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// A step that failed inside one process's filing sequence. Caught at the
/// process boundary: audited, counted, and never allowed to touch sibling
/// processes.
struct StepFailure {
    step: StepName,
    error: FilingError,
}

impl StepFailure {
    fn new(step: StepName, error: FilingError) -> Self {
        Self { step, error }
    }
}

/// Sequences the remote filing protocol for every process of a batch.
///
/// One orchestrator worker drives one batch, strictly sequentially: the
/// filing provider enforces a low global rate limit and the ordering
/// guarantees (audit records in step order, events in emission order) fall
/// out of the single-threaded loop. Cancellation is cooperative and polled
/// once per process boundary; an in-flight remote call is never
/// interrupted.
pub struct BatchOrchestrator {
    api: Arc<dyn FilingApi>,
    storage: Arc<dyn ObjectStorage>,
    store: Arc<dyn BatchStore>,
    bus: Arc<ProgressBus>,
    archiver: Archiver,
    close_grace: Duration,
}

impl BatchOrchestrator {
    pub fn new(
        api: Arc<dyn FilingApi>,
        storage: Arc<dyn ObjectStorage>,
        store: Arc<dyn BatchStore>,
        bus: Arc<ProgressBus>,
        archive_prefix: &str,
        close_grace: Duration,
    ) -> Self {
        let archiver = Archiver::new(storage.clone(), archive_prefix);
        Self {
            api,
            storage,
            store,
            bus,
            archiver,
            close_grace,
        }
    }

    /// Runs the batch to a terminal state. Per-process failures are
    /// absorbed; only a failure outside the per-process boundary (file
    /// listing, batch row updates) marks the whole run `failed`.
    pub async fn run(&self, batch_id: BatchId, certificate_id: i64) {
        if let Err(err) = self.execute(batch_id, certificate_id).await {
            let message = err.to_string();
            error!("batch {} failed: {}", batch_id, message);

            let _ = self
                .store
                .update_batch(
                    batch_id,
                    BatchUpdate {
                        status: Some(BatchStatus::Failed),
                        finished_at: Some(Utc::now()),
                        ..BatchUpdate::default()
                    },
                )
                .await;

            self.bus.publish(
                batch_id,
                BatchEvent::Error {
                    message: message.clone(),
                },
            );
            self.record(
                AuditRecord::error(
                    batch_id,
                    StepName::BatchFailed,
                    format!("Fatal batch error: {}", message),
                )
                .with_error_detail(message),
            )
            .await;
            self.bus.close(batch_id);
        }
    }

    async fn execute(&self, batch_id: BatchId, certificate_id: i64) -> Result<()> {
        let batch_timer = Instant::now();
        let mut run = BatchRun::new(batch_id, certificate_id);
        run.status = BatchStatus::Running;

        self.record(AuditRecord::success(
            batch_id,
            StepName::BatchStart,
            format!("Starting processing of batch {}", batch_id),
        ))
        .await;
        self.bus
            .log(batch_id, LogLevel::Info, "Starting batch protocol run");
        self.store
            .update_batch(
                batch_id,
                BatchUpdate {
                    status: Some(BatchStatus::Running),
                    ..BatchUpdate::default()
                },
            )
            .await?;

        let files = self.store.list_files_for_batch(batch_id).await?;
        if files.is_empty() {
            return Err(FilingError::FatalBatch(format!(
                "no files registered for batch {}",
                batch_id
            )));
        }

        let descriptors: Vec<FileDescriptor> = files
            .iter()
            .map(|file| filename::parse(&file.original_name))
            .collect();

        // Unparsable files are reported once, here, and never reach a group.
        for descriptor in descriptors.iter().filter(|d| !d.is_valid) {
            run.warning_count += 1;
            let reason = descriptor
                .error_message
                .clone()
                .unwrap_or_else(|| "unknown parse failure".to_string());
            let parse_error = FilingError::ParseInvalid {
                file: descriptor.original_name.clone(),
                reason,
            };
            let message = format!("File excluded from grouping: {}", parse_error);
            self.record(
                AuditRecord::warning(batch_id, StepName::ParseFiles, message.clone())
                    .with_error_detail(parse_error.to_string()),
            )
            .await;
            self.bus.log(batch_id, LogLevel::Warning, message);
        }

        let groups = grouper::group(&descriptors);
        let by_court = partition_by_court(&groups);
        run.total_processes = groups.len();

        let valid_files = descriptors.iter().filter(|d| d.is_valid).count();
        let summary = format!(
            "{} process(es) identified across {} court(s) ({} files, {} valid, {} invalid)",
            groups.len(),
            by_court.len(),
            descriptors.len(),
            valid_files,
            descriptors.len() - valid_files,
        );
        self.record(AuditRecord::success(batch_id, StepName::ParseFiles, summary.clone()))
            .await;
        self.bus.log(batch_id, LogLevel::Info, summary);

        self.store
            .update_batch(
                batch_id,
                BatchUpdate {
                    total_processes: Some(run.total_processes),
                    ..BatchUpdate::default()
                },
            )
            .await?;

        let file_index: HashMap<String, StoredFile> = files
            .iter()
            .map(|file| (file.original_name.clone(), file.clone()))
            .collect();

        for (court_code, court_groups) in &by_court {
            self.bus.log(
                batch_id,
                LogLevel::Info,
                format!(
                    "Processing {} process(es) for court {}",
                    court_groups.len(),
                    court_code
                ),
            );

            for group in court_groups {
                run.current_index += 1;

                // Cooperative stop: polled once per process, so the
                // process currently in flight always runs to completion.
                if self.bus.should_stop(batch_id) {
                    return self.finish_stopped(&run, batch_timer).await;
                }

                self.bus.publish(
                    batch_id,
                    BatchEvent::Progress {
                        current: run.current_index,
                        total: run.total_processes,
                        current_process: group.cnj.clone(),
                        success_count: run.success_count,
                        error_count: run.error_count,
                        warning_count: run.warning_count,
                    },
                );

                let process_timer = Instant::now();
                match self.file_process(&mut run, group, &file_index).await {
                    Ok(()) => {
                        run.success_count += 1;
                        self.bus.log(
                            batch_id,
                            LogLevel::Success,
                            format!(
                                "{} protocoled successfully ({}/{})",
                                group.cnj, run.current_index, run.total_processes
                            ),
                        );
                    }
                    Err(failure) => {
                        run.error_count += 1;
                        self.record(
                            AuditRecord::error(
                                batch_id,
                                failure.step,
                                format!("Failed to process {}: {}", group.cnj, failure.error),
                            )
                            .with_process(&group.cnj)
                            .with_error_detail(failure.error.to_string())
                            .with_duration(elapsed_ms(process_timer)),
                        )
                        .await;
                        self.bus.log(
                            batch_id,
                            LogLevel::Error,
                            format!("ERROR: {} - {}", group.cnj, failure.error),
                        );
                    }
                }
            }
        }

        self.finish_completed(&run, batch_timer).await
    }

    /// The five-step filing sequence for one judicial process. Any error
    /// bubbles to the caller tagged with the step that raised it.
    async fn file_process(
        &self,
        run: &mut BatchRun,
        group: &ProcessGroup,
        files: &HashMap<String, StoredFile>,
    ) -> std::result::Result<(), StepFailure> {
        let batch_id = run.batch_id;
        let cnj = group.cnj.as_str();

        // 1. Locate the process handle.
        self.bus.log(
            batch_id,
            LogLevel::Info,
            format!("Locating process {} in the filing system", cnj),
        );
        let step_timer = Instant::now();
        let located = self
            .with_deadline(
                StepName::LocateProcess,
                CONTROL_STEP_TIMEOUT,
                self.api.locate_process(cnj),
            )
            .await?;
        let process = located.ok_or_else(|| {
            StepFailure::new(
                StepName::LocateProcess,
                FilingError::ProcessNotFound { cnj: cnj.to_string() },
            )
        })?;
        self.record(
            AuditRecord::success(
                batch_id,
                StepName::LocateProcess,
                format!("Process {} located (id {})", cnj, process.id),
            )
            .with_process(cnj)
            .with_request("GET", format!("/api/v1/process?cnj={}", cnj), None)
            .with_response(200, None)
            .with_duration(elapsed_ms(step_timer)),
        )
        .await;

        // 2. Create the draft petition.
        self.bus
            .log(batch_id, LogLevel::Info, "Creating intermediate petition");
        let step_timer = Instant::now();
        let petition = self
            .with_deadline(
                StepName::CreatePetition,
                CONTROL_STEP_TIMEOUT,
                self.api.create_petition(&process, run.certificate_id),
            )
            .await?;
        self.record(
            AuditRecord::success(
                batch_id,
                StepName::CreatePetition,
                format!("Petition {} created", petition.petition_id),
            )
            .with_process(cnj)
            .with_request(
                "POST",
                "/api/v1/petition/intermediate",
                Some(
                    json!({
                        "idprocessos": process.id,
                        "fk_certificado": run.certificate_id,
                    })
                    .to_string(),
                ),
            )
            .with_response(200, None)
            .with_duration(elapsed_ms(step_timer)),
        )
        .await;

        // 3. Upload the principal document. Its absence is fatal for this
        // process: there is nothing to protocol without a petition.
        let principal = group.principal.as_ref().ok_or_else(|| {
            StepFailure::new(
                StepName::UploadPrincipal,
                FilingError::MissingPrincipal { cnj: cnj.to_string() },
            )
        })?;
        let stored = files.get(&principal.original_name).ok_or_else(|| {
            StepFailure::new(
                StepName::UploadPrincipal,
                FilingError::StorageRead {
                    key: principal.original_name.clone(),
                    message: "file not registered for this batch".to_string(),
                },
            )
        })?;
        self.bus.log(
            batch_id,
            LogLevel::Info,
            format!("Uploading principal document ({})", principal.original_name),
        );
        let step_timer = Instant::now();
        let bytes = self
            .storage
            .read(&stored.storage_key)
            .await
            .map_err(|e| StepFailure::new(StepName::UploadPrincipal, e))?;
        self.archive_copy(run, cnj, DocumentKind::Principal, &principal.original_name, &bytes)
            .await;

        let size = bytes.len() as u64;
        let ack = self
            .with_deadline(
                StepName::UploadPrincipal,
                upload_timeout(size),
                self.api
                    .upload_principal(&petition, bytes, &principal.original_name),
            )
            .await?;
        self.record(
            AuditRecord::success(
                batch_id,
                StepName::UploadPrincipal,
                format!("Principal document uploaded: {}", principal.original_name),
            )
            .with_process(cnj)
            .with_request(
                "POST",
                "/api/v1/petition/file",
                Some(binary_payload_summary(size)),
            )
            .with_response(200, Some(ack))
            .with_duration(elapsed_ms(step_timer)),
        )
        .await;

        // 4. Upload attachments. A copy missing from storage downgrades to
        // a warning and the process keeps going.
        for attachment in &group.attachments {
            let step_timer = Instant::now();

            let Some(stored) = files.get(&attachment.original_name) else {
                self.skip_attachment(
                    run,
                    cnj,
                    &attachment.original_name,
                    "not registered for this batch",
                )
                .await;
                continue;
            };
            let bytes = match self.storage.read(&stored.storage_key).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    self.skip_attachment(run, cnj, &attachment.original_name, &err.to_string())
                        .await;
                    continue;
                }
            };

            self.bus.log(
                batch_id,
                LogLevel::Info,
                format!("Uploading attachment ({})", attachment.original_name),
            );
            self.archive_copy(
                run,
                cnj,
                DocumentKind::Attachment,
                &attachment.original_name,
                &bytes,
            )
            .await;

            let size = bytes.len() as u64;
            let ack = self
                .with_deadline(
                    StepName::UploadAttachment,
                    upload_timeout(size),
                    self.api
                        .upload_attachment(&petition, bytes, &attachment.original_name, None),
                )
                .await?;
            self.record(
                AuditRecord::success(
                    batch_id,
                    StepName::UploadAttachment,
                    format!("Attachment uploaded: {}", attachment.original_name),
                )
                .with_process(cnj)
                .with_request(
                    "POST",
                    "/api/v1/petition/attachments",
                    Some(binary_payload_summary(size)),
                )
                .with_response(200, Some(ack))
                .with_duration(elapsed_ms(step_timer)),
            )
            .await;
        }

        // 5. Submit for protocol with the court's configured piece type.
        let piece_type = self
            .store
            .court_default_piece_type(&group.court_code)
            .await
            .map_err(|e| StepFailure::new(StepName::SubmitProtocol, e))?
            .ok_or_else(|| {
                StepFailure::new(
                    StepName::SubmitProtocol,
                    FilingError::MissingCourtConfig {
                        court_code: group.court_code.clone(),
                    },
                )
            })?;
        self.bus
            .log(batch_id, LogLevel::Info, "Submitting petition for protocol");
        let step_timer = Instant::now();
        let protocol = self
            .with_deadline(
                StepName::SubmitProtocol,
                SUBMIT_TIMEOUT,
                self.api.submit_for_protocol(&petition, piece_type),
            )
            .await?;
        self.record(
            AuditRecord::success(
                batch_id,
                StepName::SubmitProtocol,
                format!(
                    "Petition {} protocoled under {}",
                    petition.petition_id, protocol
                ),
            )
            .with_process(cnj)
            .with_request("POST", "/api/v1/petition/intermediate/send", None)
            .with_response(200, None)
            .with_duration(elapsed_ms(step_timer)),
        )
        .await;

        // 6. Persist the completion record.
        self.store
            .record_process(ProcessRecord {
                batch_id,
                cnj: cnj.to_string(),
                court_code: group.court_code.clone(),
                remote_process_id: process.id,
                remote_petition_id: petition.petition_id,
                protocol_number: protocol.clone(),
                principal_file: principal.original_name.clone(),
                attachment_count: group.attachments.len(),
            })
            .await
            .map_err(|e| StepFailure::new(StepName::ProcessComplete, e))?;
        self.record(
            AuditRecord::success(
                batch_id,
                StepName::ProcessComplete,
                format!("Process {} protocoled under {}", cnj, protocol),
            )
            .with_process(cnj),
        )
        .await;

        Ok(())
    }

    async fn finish_completed(&self, run: &BatchRun, batch_timer: Instant) -> Result<()> {
        let batch_id = run.batch_id;

        self.store
            .update_batch(
                batch_id,
                BatchUpdate {
                    status: Some(BatchStatus::Completed),
                    finished_at: Some(Utc::now()),
                    ..run.counters()
                },
            )
            .await?;

        self.bus.publish(
            batch_id,
            BatchEvent::Complete {
                success_count: run.success_count,
                error_count: run.error_count,
                warning_count: run.warning_count,
            },
        );
        let summary = format!(
            "Batch finished: {} succeeded, {} failed",
            run.success_count, run.error_count
        );
        self.bus.log(batch_id, LogLevel::Success, summary.clone());
        self.record(
            AuditRecord::success(batch_id, StepName::BatchComplete, summary)
                .with_duration(elapsed_ms(batch_timer)),
        )
        .await;

        info!(
            "batch {} complete: {} ok, {} failed, {} warnings",
            batch_id, run.success_count, run.error_count, run.warning_count
        );

        self.schedule_close(batch_id);
        Ok(())
    }

    /// Stop path: the `Stopped` event is the last one published; processes
    /// not yet started are simply never attempted.
    async fn finish_stopped(&self, run: &BatchRun, batch_timer: Instant) -> Result<()> {
        let batch_id = run.batch_id;

        self.bus.publish(
            batch_id,
            BatchEvent::Stopped {
                message: "Processing stopped by operator request".to_string(),
            },
        );

        self.store
            .update_batch(
                batch_id,
                BatchUpdate {
                    status: Some(BatchStatus::Stopped),
                    finished_at: Some(Utc::now()),
                    ..run.counters()
                },
            )
            .await?;

        self.record(
            AuditRecord::success(
                batch_id,
                StepName::BatchStop,
                format!(
                    "Processing stopped by operator request after {} of {} process(es)",
                    run.current_index - 1,
                    run.total_processes
                ),
            )
            .with_duration(elapsed_ms(batch_timer)),
        )
        .await;

        self.bus.close(batch_id);
        Ok(())
    }

    async fn skip_attachment(&self, run: &mut BatchRun, cnj: &str, name: &str, reason: &str) {
        run.warning_count += 1;
        let message = format!("Attachment {} skipped: {}", name, reason);
        self.record(
            AuditRecord::warning(run.batch_id, StepName::UploadAttachment, message.clone())
                .with_process(cnj),
        )
        .await;
        self.bus.log(run.batch_id, LogLevel::Warning, message);
    }

    /// Permanent archival runs before the upload and is independent of the
    /// upload's outcome; losing the archive copy must not sink a filing.
    async fn archive_copy(
        &self,
        run: &mut BatchRun,
        cnj: &str,
        kind: DocumentKind,
        name: &str,
        bytes: &[u8],
    ) {
        match self.archiver.archive(cnj, kind, name, bytes).await {
            Ok(copy) => {
                self.record(
                    AuditRecord::success(
                        run.batch_id,
                        StepName::ArchiveDocument,
                        format!("Permanent copy stored at {}", copy.key),
                    )
                    .with_process(cnj),
                )
                .await;
            }
            Err(err) => {
                run.warning_count += 1;
                let message = format!("Failed to archive {}: {}", name, err);
                self.record(
                    AuditRecord::warning(run.batch_id, StepName::ArchiveDocument, message.clone())
                        .with_process(cnj),
                )
                .await;
                self.bus.log(run.batch_id, LogLevel::Warning, message);
            }
        }
    }

    /// Applies a deadline to one remote call; expiry surfaces as an
    /// ordinary per-process error, never a crash.
    async fn with_deadline<T, F>(
        &self,
        step: StepName,
        deadline: Duration,
        call: F,
    ) -> std::result::Result<T, StepFailure>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(deadline, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(StepFailure::new(step, err)),
            Err(_) => Err(StepFailure::new(
                step,
                FilingError::UploadTimeout {
                    step,
                    limit_secs: deadline.as_secs(),
                },
            )),
        }
    }

    async fn record(&self, record: AuditRecord) {
        if let Err(err) = self.store.write_audit_record(record).await {
            error!("failed to persist audit record: {}", err);
        }
    }

    fn schedule_close(&self, batch_id: BatchId) {
        let bus = self.bus.clone();
        let grace = self.close_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            bus.close(batch_id);
        });
    }
}

/// Informational partition: processing order is unconstrained across
/// courts, but operators read progress per court.
fn partition_by_court(groups: &[ProcessGroup]) -> Vec<(String, Vec<&ProcessGroup>)> {
    let mut order: Vec<String> = Vec::new();
    let mut by_court: HashMap<String, Vec<&ProcessGroup>> = HashMap::new();

    for group in groups {
        let bucket = by_court.entry(group.court_code.clone()).or_insert_with(|| {
            order.push(group.court_code.clone());
            Vec::new()
        });
        bucket.push(group);
    }

    order
        .into_iter()
        .map(|court| {
            let groups = by_court.remove(&court).unwrap_or_default();
            (court, groups)
        })
        .collect()
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::legalmail::{PetitionHandle, ProcessHandle};
    use crate::config::CourtConfig;
    use crate::models::Outcome;
    use crate::persistence::MemoryStore;
    use crate::storage::StoredObject;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use tokio::sync::broadcast;

    const CERTIFICATE: i64 = 1466;

    /// Filing API double: programmable not-found set, optional stop
    /// injection while a given CNJ is being located, call recording.
    #[derive(Default)]
    struct FakeFilingApi {
        not_found: Vec<String>,
        stop_while_locating: Mutex<Option<(String, Arc<ProgressBus>, BatchId)>>,
        locate_calls: Mutex<Vec<String>>,
    }

    impl FakeFilingApi {
        fn locate_count(&self) -> usize {
            self.locate_calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl FilingApi for FakeFilingApi {
        async fn locate_process(&self, cnj: &str) -> Result<Option<ProcessHandle>> {
            self.locate_calls.lock().unwrap().push(cnj.to_string());

            let trigger = {
                let mut guard = self.stop_while_locating.lock().unwrap();
                if guard
                    .as_ref()
                    .is_some_and(|(target, _, _)| target.as_str() == cnj)
                {
                    guard.take()
                } else {
                    None
                }
            };
            if let Some((_, bus, batch_id)) = trigger {
                bus.request_stop(batch_id);
            }

            if self.not_found.iter().any(|missing| missing == cnj) {
                return Ok(None);
            }
            Ok(Some(ProcessHandle {
                id: 41_000 + self.locate_count() as i64,
                cnj: cnj.to_string(),
            }))
        }

        async fn create_petition(
            &self,
            process: &ProcessHandle,
            certificate_id: i64,
        ) -> Result<PetitionHandle> {
            Ok(PetitionHandle {
                petition_id: 362_000 + process.id,
                process_id: process.id,
                certificate_id,
            })
        }

        async fn upload_principal(
            &self,
            _petition: &PetitionHandle,
            _bytes: Vec<u8>,
            _file_name: &str,
        ) -> Result<String> {
            Ok("{\"status\":\"ok\"}".to_string())
        }

        async fn upload_attachment(
            &self,
            _petition: &PetitionHandle,
            _bytes: Vec<u8>,
            _file_name: &str,
            _document_type: Option<&str>,
        ) -> Result<String> {
            Ok("{\"status\":\"ok\"}".to_string())
        }

        async fn submit_for_protocol(
            &self,
            petition: &PetitionHandle,
            _piece_type: i64,
        ) -> Result<String> {
            Ok(format!("PROTO-{}", petition.petition_id))
        }

        async fn petition_status(&self, _petition_id: i64) -> Result<Value> {
            Ok(json!({"status": "protocolada"}))
        }
    }

    /// In-memory object store for tests.
    #[derive(Default)]
    struct FakeStorage {
        objects: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl FakeStorage {
        fn seed(&self, key: &str, bytes: &[u8]) {
            self.objects
                .lock()
                .unwrap()
                .insert(key.to_string(), bytes.to_vec());
        }

        fn keys(&self) -> Vec<String> {
            self.objects.lock().unwrap().keys().cloned().collect()
        }
    }

    #[async_trait]
    impl ObjectStorage for FakeStorage {
        async fn read(&self, key: &str) -> Result<Vec<u8>> {
            self.objects
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| FilingError::StorageRead {
                    key: key.to_string(),
                    message: "object not found".to_string(),
                })
        }

        async fn put(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<StoredObject> {
            self.objects
                .lock()
                .unwrap()
                .insert(key.to_string(), bytes.to_vec());
            Ok(StoredObject {
                key: key.to_string(),
                url: format!("/uploads/{}", key),
            })
        }
    }

    struct Harness {
        api: Arc<FakeFilingApi>,
        storage: Arc<FakeStorage>,
        store: Arc<MemoryStore>,
        bus: Arc<ProgressBus>,
        orchestrator: BatchOrchestrator,
    }

    fn harness(api: FakeFilingApi) -> Harness {
        let api = Arc::new(api);
        let storage = Arc::new(FakeStorage::default());
        let store = Arc::new(MemoryStore::with_courts(&[CourtConfig {
            code: "8.09".to_string(),
            name: "TJGO".to_string(),
            default_piece_type: Some(1),
        }]));
        let bus = Arc::new(ProgressBus::default());

        let orchestrator = BatchOrchestrator::new(
            api.clone(),
            storage.clone(),
            store.clone(),
            bus.clone(),
            "arquivos-eternos",
            Duration::ZERO,
        );

        Harness {
            api,
            storage,
            store,
            bus,
            orchestrator,
        }
    }

    /// Registers one stored file for the batch and seeds its bytes.
    fn add_file(h: &Harness, batch_id: BatchId, file_name: &str, seed_bytes: bool) {
        let key = format!("batches/{}/{}", batch_id, file_name);
        if seed_bytes {
            h.storage.seed(&key, b"%PDF-1.4 test");
        }
        h.store.register_file(
            batch_id,
            StoredFile {
                original_name: file_name.to_string(),
                storage_key: key,
                size_bytes: 13,
                sha256: None,
            },
        );
    }

    fn principal_name(loose_cnj: &str) -> String {
        format!("{}_100_60000_Peticao.pdf", loose_cnj)
    }

    fn drain(rx: &mut broadcast::Receiver<BatchEvent>) -> Vec<BatchEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    const CNJ_A: &str = "5757.95.2025.8.09.0051";
    const CNJ_B: &str = "5758.95.2025.8.09.0051";
    const CNJ_C: &str = "5759.95.2025.8.09.0051";
    const CNJ_D: &str = "5760.95.2025.8.09.0051";
    const CNJ_E: &str = "5761.95.2025.8.09.0051";

    fn canonical(loose: &str) -> String {
        crate::parser::canonicalize_cnj(loose).unwrap()
    }

    #[tokio::test]
    async fn test_all_processes_succeed() {
        let h = harness(FakeFilingApi::default());
        for cnj in [CNJ_A, CNJ_B, CNJ_C] {
            add_file(&h, 1, &principal_name(cnj), true);
        }
        let mut rx = h.bus.subscribe(1);

        h.orchestrator.run(1, CERTIFICATE).await;

        let state = h.store.batch_state(1).unwrap();
        assert_eq!(state.status, BatchStatus::Completed);
        assert_eq!(state.success_count, 3);
        assert_eq!(state.error_count, 0);
        assert_eq!(state.total_processes, 3);
        assert!(state.finished_at.is_some());

        assert_eq!(h.store.process_records(1).len(), 3);

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(e, BatchEvent::Complete { success_count: 3, .. })));
        assert_eq!(
            events.iter().filter(|e| matches!(e, BatchEvent::Progress { .. })).count(),
            3
        );
    }

    #[tokio::test]
    async fn test_failing_process_does_not_abort_siblings() {
        let h = harness(FakeFilingApi {
            not_found: vec![canonical(CNJ_B)],
            ..FakeFilingApi::default()
        });
        for cnj in [CNJ_A, CNJ_B, CNJ_C] {
            add_file(&h, 1, &principal_name(cnj), true);
        }

        h.orchestrator.run(1, CERTIFICATE).await;

        let state = h.store.batch_state(1).unwrap();
        assert_eq!(state.status, BatchStatus::Completed);
        assert_eq!(state.success_count, 2);
        assert_eq!(state.error_count, 1);

        // every process was attempted
        assert_eq!(h.api.locate_count(), 3);

        // and every process left audit records behind
        let audits = h.store.audit_records(1).await.unwrap();
        for cnj in [CNJ_A, CNJ_B, CNJ_C] {
            let canonical = canonical(cnj);
            assert!(
                audits.iter().any(|r| r.process_id.as_deref() == Some(canonical.as_str())),
                "no audit record for {}",
                canonical
            );
        }

        let failure = audits
            .iter()
            .find(|r| r.outcome == Outcome::Error)
            .unwrap();
        assert_eq!(failure.step, StepName::LocateProcess);
        assert_eq!(failure.process_id.as_deref(), Some(canonical(CNJ_B).as_str()));
        assert!(failure.error_detail.as_deref().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_stop_request_lets_current_process_finish() {
        let bus = Arc::new(ProgressBus::default());
        let api = FakeFilingApi::default();
        *api.stop_while_locating.lock().unwrap() = Some((canonical(CNJ_B), bus.clone(), 1));

        let api = Arc::new(api);
        let storage = Arc::new(FakeStorage::default());
        let store = Arc::new(MemoryStore::with_courts(&[CourtConfig {
            code: "8.09".to_string(),
            name: "TJGO".to_string(),
            default_piece_type: Some(1),
        }]));
        let orchestrator = BatchOrchestrator::new(
            api.clone(),
            storage.clone(),
            store.clone(),
            bus.clone(),
            "arquivos-eternos",
            Duration::ZERO,
        );
        let h = Harness {
            api,
            storage,
            store,
            bus,
            orchestrator,
        };

        for cnj in [CNJ_A, CNJ_B, CNJ_C, CNJ_D, CNJ_E] {
            add_file(&h, 1, &principal_name(cnj), true);
        }
        let mut rx = h.bus.subscribe(1);

        h.orchestrator.run(1, CERTIFICATE).await;

        // process 2 ran to completion, 3-5 were never attempted
        assert_eq!(h.api.locate_count(), 2);
        assert_eq!(h.store.process_records(1).len(), 2);

        let state = h.store.batch_state(1).unwrap();
        assert_eq!(state.status, BatchStatus::Stopped);
        assert_eq!(state.success_count, 2);

        let events = drain(&mut rx);
        assert!(matches!(events.last(), Some(BatchEvent::Stopped { .. })));
    }

    #[tokio::test]
    async fn test_missing_principal_fails_only_that_process() {
        let h = harness(FakeFilingApi::default());
        // no code pair anywhere in this process, so no principal is chosen
        add_file(&h, 1, &format!("{}_Documento_avulso.pdf", CNJ_A), true);
        add_file(&h, 1, &principal_name(CNJ_B), true);

        h.orchestrator.run(1, CERTIFICATE).await;

        let state = h.store.batch_state(1).unwrap();
        assert_eq!(state.status, BatchStatus::Completed);
        assert_eq!(state.success_count, 1);
        assert_eq!(state.error_count, 1);

        let audits = h.store.audit_records(1).await.unwrap();
        let failure = audits.iter().find(|r| r.outcome == Outcome::Error).unwrap();
        assert_eq!(failure.step, StepName::UploadPrincipal);
        assert!(failure.error_detail.as_deref().unwrap().contains("principal"));
    }

    #[tokio::test]
    async fn test_missing_attachment_is_a_warning_not_a_failure() {
        let h = harness(FakeFilingApi::default());
        add_file(&h, 1, &principal_name(CNJ_A), true);
        // registered but bytes never stored
        add_file(&h, 1, &format!("{}_100_60000_Comprovante.pdf", CNJ_A), false);
        let mut rx = h.bus.subscribe(1);

        h.orchestrator.run(1, CERTIFICATE).await;

        let state = h.store.batch_state(1).unwrap();
        assert_eq!(state.status, BatchStatus::Completed);
        assert_eq!(state.success_count, 1);
        assert_eq!(state.error_count, 0);
        assert_eq!(state.warning_count, 1);

        let audits = h.store.audit_records(1).await.unwrap();
        assert!(audits.iter().any(|r| {
            r.outcome == Outcome::Warning && r.step == StepName::UploadAttachment
        }));

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            BatchEvent::Log { level: LogLevel::Warning, .. }
        )));
    }

    #[tokio::test]
    async fn test_unconfigured_court_is_a_non_retryable_process_error() {
        let h = harness(FakeFilingApi::default());
        // court 8.26 is not in the registry seeded by harness()
        add_file(&h, 1, &principal_name("5757.95.2025.8.26.0100"), true);

        h.orchestrator.run(1, CERTIFICATE).await;

        let state = h.store.batch_state(1).unwrap();
        assert_eq!(state.status, BatchStatus::Completed);
        assert_eq!(state.error_count, 1);

        let audits = h.store.audit_records(1).await.unwrap();
        let failure = audits.iter().find(|r| r.outcome == Outcome::Error).unwrap();
        assert_eq!(failure.step, StepName::SubmitProtocol);
        assert!(failure.error_detail.as_deref().unwrap().contains("8.26"));
    }

    #[tokio::test]
    async fn test_empty_batch_is_fatal() {
        let h = harness(FakeFilingApi::default());
        let mut rx = h.bus.subscribe(9);

        h.orchestrator.run(9, CERTIFICATE).await;

        let state = h.store.batch_state(9).unwrap();
        assert_eq!(state.status, BatchStatus::Failed);

        let events = drain(&mut rx);
        assert!(matches!(events.last(), Some(BatchEvent::Error { .. })));

        let audits = h.store.audit_records(9).await.unwrap();
        assert!(audits.iter().any(|r| r.step == StepName::BatchFailed));
    }

    #[tokio::test]
    async fn test_unparsable_file_reported_once_and_excluded() {
        let h = harness(FakeFilingApi::default());
        add_file(&h, 1, &principal_name(CNJ_A), true);
        add_file(&h, 1, "sem_numero_de_processo.pdf", true);

        h.orchestrator.run(1, CERTIFICATE).await;

        let state = h.store.batch_state(1).unwrap();
        assert_eq!(state.status, BatchStatus::Completed);
        assert_eq!(state.total_processes, 1);
        assert_eq!(state.success_count, 1);

        let audits = h.store.audit_records(1).await.unwrap();
        let parse_warnings: Vec<_> = audits
            .iter()
            .filter(|r| r.step == StepName::ParseFiles && r.outcome == Outcome::Warning)
            .collect();
        assert_eq!(parse_warnings.len(), 1);
        assert!(parse_warnings[0].message.contains("sem_numero_de_processo.pdf"));
    }

    #[tokio::test]
    async fn test_documents_are_archived_before_upload() {
        let h = harness(FakeFilingApi::default());
        add_file(&h, 1, &principal_name(CNJ_A), true);
        add_file(&h, 1, &format!("{}_100_60000_Comprovante.pdf", CNJ_A), true);

        h.orchestrator.run(1, CERTIFICATE).await;

        let keys = h.storage.keys();
        assert!(keys.iter().any(|k| k.starts_with("arquivos-eternos/") && k.contains("-principal-")));
        assert!(keys.iter().any(|k| k.starts_with("arquivos-eternos/") && k.contains("-anexo-")));
    }
}
