// file: src/storage/scanner.rs
// description: directory walking and PDF discovery with size guard
// reference: https://docs.rs/walkdir

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

pub struct PdfScanner {
    max_file_size_mb: usize,
}

#[derive(Debug, Clone)]
pub struct ScannedPdf {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
}

impl PdfScanner {
    pub fn new(max_file_size_mb: usize) -> Self {
        Self { max_file_size_mb }
    }

    /// Collects every `.pdf` under `root`, skipping files over the size
    /// limit. Results are sorted by filename so batch ingestion order is
    /// stable across platforms.
    pub fn scan_directory(&self, root: &Path) -> Result<Vec<ScannedPdf>> {
        info!("Scanning directory: {}", root.display());
        let mut files = Vec::new();

        for entry in WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let is_pdf = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
            if !is_pdf {
                continue;
            }

            if let Ok(metadata) = entry.metadata() {
                let size = metadata.len();
                let max_size = (self.max_file_size_mb * 1024 * 1024) as u64;

                if size > max_size {
                    debug!(
                        "Skipping large file ({} MB): {}",
                        size / 1024 / 1024,
                        path.display()
                    );
                    continue;
                }

                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();

                files.push(ScannedPdf {
                    path: path.to_path_buf(),
                    file_name,
                    size,
                });
            }
        }

        files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        info!("Found {} PDF files", files.len());
        Ok(files)
    }
}

/// SHA-256 of a file's raw bytes, recorded at ingest for audit parity.
pub fn file_sha256(path: &Path) -> std::io::Result<String> {
    let content = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(format!("{:x}", hasher.finalize()))
}
