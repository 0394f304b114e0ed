// file: src/storage/archive.rs
// description: permanent date-partitioned archival of every filed PDF

use crate::error::Result;
use crate::parser::patterns::ARCHIVE_UNSAFE_CHARS;
use crate::storage::{ObjectStorage, StoredObject};
use chrono::{DateTime, Datelike, Utc};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const MAX_ARCHIVED_NAME_LEN: usize = 100;

/// Kind marker embedded in archive keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Principal,
    Attachment,
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentKind::Principal => write!(f, "principal"),
            DocumentKind::Attachment => write!(f, "anexo"),
        }
    }
}

/// Writes an immutable copy of every PDF that goes through the pipeline
/// under a date-partitioned prefix, so filings can be audited and replayed
/// long after the source batch is gone. Archival happens before the upload
/// and its copies are never deleted.
pub struct Archiver {
    storage: Arc<dyn ObjectStorage>,
    prefix: String,
}

impl Archiver {
    pub fn new(storage: Arc<dyn ObjectStorage>, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
        }
    }

    pub async fn archive(
        &self,
        cnj: &str,
        kind: DocumentKind,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredObject> {
        let key = self.archive_key(cnj, kind, original_name, Utc::now());
        let stored = self.storage.put(&key, bytes, "application/pdf").await?;
        info!("archived {} copy at {}", kind, stored.key);
        Ok(stored)
    }

    /// Key shape: `{prefix}/{year}/{month}/{day}/{cnj}-{kind}-{millis}-{name}.pdf`
    fn archive_key(
        &self,
        cnj: &str,
        kind: DocumentKind,
        original_name: &str,
        when: DateTime<Utc>,
    ) -> String {
        format!(
            "{}/{}/{:02}/{:02}/{}-{}-{}-{}.pdf",
            self.prefix,
            when.year(),
            when.month(),
            when.day(),
            cnj,
            kind,
            when.timestamp_millis(),
            sanitize_archive_name(original_name),
        )
    }
}

fn sanitize_archive_name(original_name: &str) -> String {
    let stem = Path::new(original_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(original_name);
    let safe = ARCHIVE_UNSAFE_CHARS.replace_all(stem, "_");
    safe.chars().take(MAX_ARCHIVED_NAME_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn archiver(dir: &TempDir) -> Archiver {
        Archiver::new(Arc::new(LocalStorage::new(dir.path())), "arquivos-eternos")
    }

    #[test]
    fn test_archive_key_shape() {
        let dir = TempDir::new().unwrap();
        let when = Utc.with_ymd_and_hms(2025, 3, 7, 12, 0, 0).unwrap();

        let key = archiver(&dir).archive_key(
            "0005757-95.2025.8.09.0051",
            DocumentKind::Principal,
            "Petição Inicial.pdf",
            when,
        );

        assert!(key.starts_with("arquivos-eternos/2025/03/07/0005757-95.2025.8.09.0051-principal-"));
        assert!(key.ends_with("-Peti__o_Inicial.pdf"));
    }

    #[test]
    fn test_archive_name_is_capped() {
        let dir = TempDir::new().unwrap();
        let long_name = format!("{}.pdf", "a".repeat(300));
        let when = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let key = archiver(&dir).archive_key(
            "0005757-95.2025.8.09.0051",
            DocumentKind::Attachment,
            &long_name,
            when,
        );

        let file_part = key.rsplit('/').next().unwrap();
        assert!(file_part.len() <= MAX_ARCHIVED_NAME_LEN + 60);
        assert!(key.contains("-anexo-"));
    }

    #[tokio::test]
    async fn test_archive_writes_a_copy() {
        let dir = TempDir::new().unwrap();
        let stored = archiver(&dir)
            .archive(
                "0005757-95.2025.8.09.0051",
                DocumentKind::Principal,
                "peticao.pdf",
                b"%PDF-1.4 conteudo",
            )
            .await
            .unwrap();

        assert!(stored.key.starts_with("arquivos-eternos/"));
        let on_disk = dir.path().join(&stored.key);
        assert_eq!(std::fs::read(on_disk).unwrap(), b"%PDF-1.4 conteudo");
    }
}
