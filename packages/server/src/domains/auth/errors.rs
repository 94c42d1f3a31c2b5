use thiserror::Error;

use crate::kernel::StoreError;

/// Error taxonomy for the verify-and-provision flow.
///
/// Challenge-level errors are user-facing and terminal for that challenge;
/// the caller must request a new code. Provider trouble and duplicate-key
/// conflicts are recovered internally and never appear here.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no verification code is pending for this phone")]
    ChallengeNotFound,

    #[error("the verification code has expired")]
    ChallengeExpired,

    #[error("too many attempts; request a new code")]
    ChallengeLocked,

    #[error("incorrect verification code")]
    CodeMismatch,

    #[error("a code was sent recently; retry in {retry_after_secs}s")]
    CooldownActive { retry_after_secs: i64 },

    #[error("invalid phone number")]
    InvalidPhone,

    #[error("identity records are inconsistent: {detail}")]
    DataIntegrity { detail: String },

    #[error("storage unavailable")]
    Storage(#[source] StoreError),

    #[error("session issuance failed")]
    SessionIssuance(#[source] anyhow::Error),
}

impl From<StoreError> for AuthError {
    /// Store failures that escape the provisioner's bounded conflict
    /// handling are transient storage trouble as far as callers go.
    fn from(err: StoreError) -> Self {
        AuthError::Storage(err)
    }
}
