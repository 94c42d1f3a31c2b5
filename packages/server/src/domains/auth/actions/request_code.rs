//! Request-code action: create a challenge and hand the code to delivery.

use chrono::Utc;
use rand::Rng;
use tracing::{info, warn};

use crate::common::phone;
use crate::domains::auth::errors::AuthError;
use crate::domains::auth::models::{Challenge, ChallengeStatus};
use crate::domains::auth::types::Role;
use crate::kernel::deps::ServerDeps;
use crate::kernel::traits::StoreError;

/// Result of requesting a verification code.
#[derive(Debug, Clone)]
pub struct RequestCodeOutcome {
    pub challenge: Challenge,
    /// Whether this phone already has a profile, and its default role; lets
    /// the client skip the role picker for returning users.
    pub is_existing_user: bool,
    pub existing_role: Option<Role>,
}

/// Create a fresh challenge for a phone.
///
/// Supersedes any still-active challenge, unless that challenge is younger
/// than the resend cooldown, in which case the request is rejected and the
/// existing challenge stays live. Code delivery is best-effort: the flow
/// only depends on the challenge record existing.
pub async fn request_code(
    raw_phone: &str,
    purpose: &str,
    deps: &ServerDeps,
) -> Result<RequestCodeOutcome, AuthError> {
    let phone = phone::normalize(raw_phone).ok_or(AuthError::InvalidPhone)?;
    let now = Utc::now();

    if let Some(latest) = deps.store.latest_challenge(&phone).await? {
        if latest.status == ChallengeStatus::Active && !latest.is_expired(now) {
            let age = now - latest.created_at;
            if age < deps.settings.resend_cooldown {
                let retry_after_secs = (deps.settings.resend_cooldown - age).num_seconds().max(1);
                return Err(AuthError::CooldownActive { retry_after_secs });
            }
        }
    }

    let code = generate_code();

    // Best-effort provider registration; without it the challenge verifies
    // local-only.
    let external_ref = match &deps.provider {
        Some(provider) => {
            match tokio::time::timeout(deps.settings.provider_timeout, provider.start(&phone)).await
            {
                Ok(Ok(external_ref)) => Some(external_ref),
                Ok(Err(error)) => {
                    warn!(%error, "provider verification start failed; continuing local-only");
                    None
                }
                Err(_) => {
                    warn!("provider verification start timed out; continuing local-only");
                    None
                }
            }
        }
        None => None,
    };

    deps.store.expire_active_challenges(&phone).await?;
    let challenge = Challenge::new(phone.clone(), code, external_ref, now);
    let challenge = match deps.store.insert_challenge(challenge).await {
        Ok(challenge) => challenge,
        // A concurrent request inserted its challenge between our supersede
        // and insert; supersede once more and take the slot.
        Err(StoreError::Duplicate { .. }) => {
            deps.store.expire_active_challenges(&phone).await?;
            deps.store
                .insert_challenge(Challenge::new(
                    phone.clone(),
                    generate_code(),
                    None,
                    Utc::now(),
                ))
                .await?
        }
        Err(err) => return Err(err.into()),
    };

    if let Err(error) = deps
        .delivery
        .send_code(&phone, &challenge.code, purpose)
        .await
    {
        warn!(%phone, %error, "code delivery failed; challenge stays redeemable");
    }

    let profile = deps.store.profile_by_phone(&phone).await?;
    info!(%phone, challenge_id = %challenge.id, "verification challenge created");

    Ok(RequestCodeOutcome {
        challenge,
        is_existing_user: profile.is_some(),
        existing_role: profile.map(|p| p.default_role),
    })
}

/// Six-digit numeric code, zero-padded.
fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
