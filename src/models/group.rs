// file: src/models/group.rs
// description: one judicial process within a batch, with its documents

use crate::models::FileDescriptor;
use serde::{Deserialize, Serialize};

/// A judicial process reconstructed from a batch's filenames: at most one
/// principal petition plus its supporting attachments. Computed on demand
/// by the grouper and consumed immediately by the orchestrator; never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessGroup {
    /// Canonical 25-character CNJ number.
    pub cnj: String,
    pub court_code: String,
    pub principal: Option<FileDescriptor>,
    pub attachments: Vec<FileDescriptor>,
    /// Code pair identifying the principal/attachment partition, absent
    /// when the files carried no embedded codes.
    pub principal_code: Option<u32>,
    pub petition_code: Option<u32>,
}

impl ProcessGroup {
    pub fn file_count(&self) -> usize {
        self.attachments.len() + usize::from(self.principal.is_some())
    }
}
