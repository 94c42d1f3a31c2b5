//! Verify-code action: the full challenge -> verification -> provisioning ->
//! session pipeline behind `POST /auth/code/verify`.

use chrono::Utc;
use tracing::info;

use crate::common::phone;
use crate::domains::auth::actions::provision::provision;
use crate::domains::auth::errors::AuthError;
use crate::domains::auth::models::ChallengeStatus;
use crate::domains::auth::session;
use crate::domains::auth::types::{Role, SessionCredential, VerifiedIdentity};
use crate::domains::auth::verification;
use crate::kernel::deps::ServerDeps;

/// Result of a successful verification: the converged identity plus the
/// session artifact to hand back to the client.
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub identity: VerifiedIdentity,
    pub session: SessionCredential,
}

/// Verify a submitted code and provision the caller's identity.
pub async fn verify_code(
    raw_phone: &str,
    supplied_code: &str,
    role: Role,
    deps: &ServerDeps,
) -> Result<VerifyOutcome, AuthError> {
    let phone = phone::normalize(raw_phone).ok_or(AuthError::InvalidPhone)?;
    let now = Utc::now();

    let challenge = deps
        .store
        .latest_challenge(&phone)
        .await?
        .ok_or(AuthError::ChallengeNotFound)?;

    match challenge.status {
        ChallengeStatus::Active => {}
        ChallengeStatus::Locked => return Err(AuthError::ChallengeLocked),
        ChallengeStatus::Expired => return Err(AuthError::ChallengeExpired),
        // Already consumed; the code is redeemable exactly once.
        ChallengeStatus::Verified => return Err(AuthError::ChallengeNotFound),
    }

    if challenge.is_expired(now) {
        let _ = deps.store.mark_challenge_expired(challenge.id).await?;
        return Err(AuthError::ChallengeExpired);
    }

    // Count the attempt before looking at the code: the increment-and-check
    // is atomic, so the fifth caller locks out even with the right code.
    let challenge = match deps.store.record_attempt(challenge.id).await? {
        Some(challenge) => challenge,
        None => {
            // Went terminal between the read and the increment.
            return Err(
                match deps
                    .store
                    .latest_challenge(&phone)
                    .await?
                    .map(|c| c.status)
                {
                    Some(ChallengeStatus::Locked) => AuthError::ChallengeLocked,
                    Some(ChallengeStatus::Expired) => AuthError::ChallengeExpired,
                    _ => AuthError::ChallengeNotFound,
                },
            );
        }
    };
    if challenge.status == ChallengeStatus::Locked {
        return Err(AuthError::ChallengeLocked);
    }

    let valid =
        verification::check(deps.provider.as_ref(), &deps.settings, &challenge, supplied_code)
            .await;
    if !valid {
        return Err(AuthError::CodeMismatch);
    }

    // Consume the challenge; losing this race means another request already
    // redeemed the code.
    if !deps.store.mark_challenge_verified(challenge.id).await? {
        return Err(AuthError::ChallengeNotFound);
    }

    let provisioned = provision(&phone, role, deps).await?;
    let session = session::issue(deps, &provisioned.credential).await?;

    info!(
        %phone,
        credential_id = %provisioned.credential.id,
        profile_id = %provisioned.profile_id,
        %role,
        "verification complete; session issued"
    );

    Ok(VerifyOutcome {
        identity: VerifiedIdentity {
            credential_id: provisioned.credential.id,
            profile_id: provisioned.profile_id,
            phone,
            role,
        },
        session,
    })
}
