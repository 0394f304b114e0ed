// file: src/pipeline/timeout.rs
// description: deadlines for remote filing operations

use std::time::Duration;

/// Fixed deadline for the control steps (locate process, create petition).
pub const CONTROL_STEP_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline for the final submit-for-protocol call. Longer than the
/// control steps because the filing system performs a remote digital
/// signature whose cost is unrelated to payload size.
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(90);

const UPLOAD_BASE_SECS: u64 = 30;
const UPLOAD_SECS_PER_MIB: u64 = 10;
const UPLOAD_CAP_SECS: u64 = 300;

const MIB: u64 = 1024 * 1024;

/// Deadline for uploading a payload of the given size:
/// 30s base plus 10s per started MiB, capped at 300s.
pub fn upload_timeout(size_bytes: u64) -> Duration {
    let whole_mibs = size_bytes.div_ceil(MIB);
    let secs = UPLOAD_BASE_SECS.saturating_add(whole_mibs.saturating_mul(UPLOAD_SECS_PER_MIB));
    Duration::from_secs(secs.min(UPLOAD_CAP_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_payload_gets_base_timeout() {
        assert_eq!(upload_timeout(0), Duration::from_secs(30));
    }

    #[test]
    fn test_timeout_scales_per_mib() {
        assert_eq!(upload_timeout(MIB), Duration::from_secs(40));
        assert_eq!(upload_timeout(25 * MIB), Duration::from_secs(280));
    }

    #[test]
    fn test_partial_mib_rounds_up() {
        assert_eq!(upload_timeout(MIB + 1), Duration::from_secs(50));
        assert_eq!(upload_timeout(512 * 1024), Duration::from_secs(40));
    }

    #[test]
    fn test_timeout_is_capped() {
        assert_eq!(upload_timeout(50 * MIB), Duration::from_secs(300));
        assert_eq!(upload_timeout(u64::MAX / 2), Duration::from_secs(300));
    }
}
