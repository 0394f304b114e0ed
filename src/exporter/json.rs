// file: src/exporter/json.rs
// description: json export of a batch's audit trail

use crate::error::Result;
use crate::models::BatchId;
use crate::persistence::BatchStore;
use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Writes a batch's full audit trail to disk so filings can be reviewed
/// and replayed outside the live system.
#[derive(Debug, Clone)]
pub struct AuditExporter {
    output_dir: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct ExportManifest {
    pub exported_at: String,
    pub batch_id: BatchId,
    pub total_records: usize,
    pub file: String,
}

impl AuditExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    /// Exports every audit record of the batch as one JSON document and
    /// returns a manifest describing the export.
    pub async fn export_batch(
        &self,
        store: &dyn BatchStore,
        batch_id: BatchId,
        pretty: bool,
    ) -> Result<ExportManifest> {
        let records = store.audit_records(batch_id).await?;
        info!(
            "Exporting {} audit record(s) for batch {}",
            records.len(),
            batch_id
        );

        let file_name = format!(
            "audit-batch-{}-{}.json",
            batch_id,
            Utc::now().format("%Y%m%d%H%M%S")
        );
        let path = self.output_dir.join(&file_name);

        let body = if pretty {
            serde_json::to_string_pretty(&records)?
        } else {
            serde_json::to_string(&records)?
        };
        fs::write(&path, body)?;

        let manifest = ExportManifest {
            exported_at: Utc::now().to_rfc3339(),
            batch_id,
            total_records: records.len(),
            file: path.display().to_string(),
        };

        let manifest_path = self.output_dir.join(format!("audit-batch-{}-manifest.json", batch_id));
        fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)?;

        info!("Export complete: {}", manifest.file);
        Ok(manifest)
    }
}
