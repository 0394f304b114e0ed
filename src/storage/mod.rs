// file: src/storage/mod.rs
// description: object storage port and local filesystem adapter

pub mod archive;
pub mod scanner;

use crate::error::{FilingError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

pub use archive::{Archiver, DocumentKind};
pub use scanner::{PdfScanner, ScannedPdf};

/// Location of a stored object after a successful put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

/// Binary object store holding the uploaded PDFs and their permanent
/// archive copies. Production deployments put an S3-compatible service
/// behind this; [`LocalStorage`] covers development and tests.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn read(&self, key: &str) -> Result<Vec<u8>>;
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<StoredObject>;
}

/// Filesystem-backed object store rooted at an uploads directory.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> (String, PathBuf) {
        let normalized = key.trim_start_matches('/').to_string();
        let path = self.root.join(&normalized);
        (normalized, path)
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let (normalized, path) = self.resolve(key);
        tokio::fs::read(&path)
            .await
            .map_err(|e| FilingError::StorageRead {
                key: normalized,
                message: e.to_string(),
            })
    }

    async fn put(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<StoredObject> {
        let (normalized, path) = self.resolve(key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;

        debug!("stored {} ({} bytes)", path.display(), bytes.len());

        Ok(StoredObject {
            url: format!("/uploads/{}", normalized),
            key: normalized,
        })
    }
}

/// Collision-free storage name for an uploaded file: original stem plus a
/// timestamp and a random fragment, extension preserved.
pub fn unique_file_name(original_name: &str) -> String {
    let path = Path::new(original_name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("arquivo");
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();

    let fragment = uuid::Uuid::new_v4().simple().to_string();
    let timestamp = chrono::Utc::now().timestamp_millis();

    format!("{}_{}_{}{}", stem, timestamp, &fragment[..8], extension)
}
