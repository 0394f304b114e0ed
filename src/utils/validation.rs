// file: src/utils/validation.rs
// description: data validation utilities and helpers
// reference: input validation patterns

use crate::error::{FilingError, Result};
use std::path::Path;

pub struct Validator;

impl Validator {
    pub fn validate_directory(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(FilingError::Validation(format!(
                "Directory does not exist: {}",
                path.display()
            )));
        }

        if !path.is_dir() {
            return Err(FilingError::Validation(format!(
                "Path is not a directory: {}",
                path.display()
            )));
        }

        Ok(())
    }

    pub fn validate_pdf_extension(path: &Path) -> Result<()> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("pdf") => Ok(()),
            _ => Err(FilingError::Validation(format!(
                "File is not a PDF: {}",
                path.display()
            ))),
        }
    }

    pub fn validate_content_not_empty(content: &[u8]) -> Result<()> {
        if content.is_empty() {
            return Err(FilingError::Validation("File is empty".to_string()));
        }
        Ok(())
    }

    pub fn validate_certificate_id(certificate_id: i64) -> Result<()> {
        if certificate_id <= 0 {
            return Err(FilingError::Validation(
                "Certificate id must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_batch_size(file_count: usize) -> Result<()> {
        if file_count == 0 {
            return Err(FilingError::Validation(
                "Batch must contain at least one file".to_string(),
            ));
        }

        if file_count > 10000 {
            return Err(FilingError::Validation(
                "Batch too large (max 10000 files)".to_string(),
            ));
        }

        Ok(())
    }

    pub fn truncate_text(text: &str, max_length: usize) -> String {
        if text.len() <= max_length {
            text.to_string()
        } else {
            format!("{}...", &text[..max_length])
        }
    }
}
