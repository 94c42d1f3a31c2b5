//! Session re-issuance: retry token minting after a verified challenge,
//! without burning a new code.
//!
//! Covers the gap where verification succeeded but the session backing
//! service was down. The retry is authorized by the phone's latest challenge
//! still being `verified` and inside its original expiry window, and it
//! never provisions: the identity must already be fully linked.

use chrono::Utc;
use tracing::info;

use crate::common::phone;
use crate::domains::auth::actions::verify_code::VerifyOutcome;
use crate::domains::auth::errors::AuthError;
use crate::domains::auth::identity::{self, IdentityState};
use crate::domains::auth::models::ChallengeStatus;
use crate::domains::auth::session;
use crate::domains::auth::types::VerifiedIdentity;
use crate::kernel::deps::ServerDeps;

pub async fn reissue_session(
    raw_phone: &str,
    deps: &ServerDeps,
) -> Result<VerifyOutcome, AuthError> {
    let phone = phone::normalize(raw_phone).ok_or(AuthError::InvalidPhone)?;
    let now = Utc::now();

    let challenge = deps
        .store
        .latest_challenge(&phone)
        .await?
        .ok_or(AuthError::ChallengeNotFound)?;

    if challenge.status != ChallengeStatus::Verified {
        return Err(AuthError::ChallengeNotFound);
    }
    if challenge.is_expired(now) {
        return Err(AuthError::ChallengeExpired);
    }

    let snapshot = identity::resolve(deps.store.as_ref(), &phone).await?;
    let (credential, profile) = match IdentityState::classify(snapshot)? {
        IdentityState::Both {
            credential,
            profile,
            linked: true,
        } => (credential, profile),
        // Verification completed but the identity is not a linked pair;
        // re-issuance is not the place to repair that.
        _ => return Err(AuthError::ChallengeNotFound),
    };

    let session = session::issue(deps, &credential).await?;
    info!(%phone, credential_id = %credential.id, "session re-issued");

    Ok(VerifyOutcome {
        identity: VerifiedIdentity {
            credential_id: credential.id,
            profile_id: profile.id,
            phone,
            role: profile.default_role,
        },
        session,
    })
}
