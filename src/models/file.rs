// file: src/models/file.rs
// description: parsed metadata for one uploaded PDF filename

use serde::{Deserialize, Serialize};

/// Everything the pipeline knows about an input file, derived purely from
/// its name. Created once at parse time and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileDescriptor {
    pub original_name: String,
    /// Accent-stripped, filesystem-safe rendition of the original name.
    pub normalized_name: String,
    /// The process number as it appeared in the filename (loose form).
    pub cnj_raw: String,
    /// Canonical 25-character CNJ number, empty when parsing failed.
    pub cnj: String,
    /// Code pairing a principal document with its companion attachments.
    pub principal_code: Option<u32>,
    pub petition_code: Option<u32>,
    pub description: String,
    /// Justice branch and court segments of the CNJ, e.g. "8.09" for TJGO.
    pub court_code: Option<String>,
    pub is_valid: bool,
    pub error_message: Option<String>,
}

impl FileDescriptor {
    /// Both embedded codes present, so the file participates in
    /// principal/attachment pairing.
    pub fn has_code_pair(&self) -> bool {
        self.principal_code.is_some() && self.petition_code.is_some()
    }
}
