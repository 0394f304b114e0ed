// file: src/client/verification.rs
// description: read-only verification of petition protocol status

use crate::client::FilingApi;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

/// Spacing between status requests when verifying in bulk, to stay well
/// under the provider's rate limit.
const REQUEST_SPACING: Duration = Duration::from_millis(500);

/// Where a petition stands in the remote filing system.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PetitionStatus {
    /// Created but not yet sent to the court.
    Pending,
    /// Sent, awaiting court confirmation.
    Sent,
    /// Confirmed by the court; a protocol number exists.
    Protocoled,
    Rejected,
    Error,
    Unknown,
}

impl std::fmt::Display for PetitionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PetitionStatus::Pending => "pending",
            PetitionStatus::Sent => "sent",
            PetitionStatus::Protocoled => "protocoled",
            PetitionStatus::Rejected => "rejected",
            PetitionStatus::Error => "error",
            PetitionStatus::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// Result of checking one petition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub petition_id: i64,
    pub status: PetitionStatus,
    pub protocol_number: Option<String>,
    pub protocol_date: Option<String>,
    pub error_message: Option<String>,
}

/// Checks whether a petition was actually protocoled.
///
/// Verification only: this module never refiles or retries a petition,
/// because a duplicate submission would protocol the same document twice
/// at the court. Never fails; transport problems come back as
/// [`PetitionStatus::Error`].
pub async fn verify_petition(api: &dyn FilingApi, petition_id: i64) -> VerificationOutcome {
    match api.petition_status(petition_id).await {
        Ok(payload) => {
            let raw_status = payload
                .get("status")
                .or_else(|| payload.get("situacao"))
                .and_then(Value::as_str)
                .unwrap_or_default();

            VerificationOutcome {
                petition_id,
                status: map_status(raw_status),
                protocol_number: string_field(&payload, "numeroProtocolo"),
                protocol_date: string_field(&payload, "dataProtocolo"),
                error_message: None,
            }
        }
        Err(err) => {
            warn!("failed to verify petition {}: {}", petition_id, err);
            VerificationOutcome {
                petition_id,
                status: PetitionStatus::Error,
                protocol_number: None,
                protocol_date: None,
                error_message: Some(err.to_string()),
            }
        }
    }
}

/// Verifies a list of petitions sequentially, spacing requests out.
pub async fn verify_batch(api: &dyn FilingApi, petition_ids: &[i64]) -> Vec<VerificationOutcome> {
    let mut outcomes = Vec::with_capacity(petition_ids.len());

    for (index, petition_id) in petition_ids.iter().enumerate() {
        if index > 0 {
            tokio::time::sleep(REQUEST_SPACING).await;
        }
        outcomes.push(verify_petition(api, *petition_id).await);
    }

    outcomes
}

/// The remote status vocabulary is Portuguese free text; substring
/// matching absorbs the gender/number inflections the API mixes in.
fn map_status(raw: &str) -> PetitionStatus {
    let normalized = raw.to_lowercase();

    if normalized.contains("protocolad") {
        PetitionStatus::Protocoled
    } else if normalized.contains("enviad") {
        PetitionStatus::Sent
    } else if normalized.contains("rejeitad") {
        PetitionStatus::Rejected
    } else if normalized.contains("pendente") {
        PetitionStatus::Pending
    } else if normalized.contains("erro") {
        PetitionStatus::Error
    } else {
        PetitionStatus::Unknown
    }
}

fn string_field(payload: &Value, field: &str) -> Option<String> {
    payload.get(field).and_then(Value::as_str).map(str::to_string)
}
