// file: src/client/mod.rs
// description: filing API port, LegalMail adapter and petition verification

pub mod legalmail;
pub mod verification;

pub use legalmail::{FilingApi, LegalMailClient, PetitionHandle, ProcessHandle};
pub use verification::{PetitionStatus, VerificationOutcome, verify_batch, verify_petition};
