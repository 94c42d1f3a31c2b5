//! Account provisioning: turn a partial or absent identity into a complete,
//! linked one, idempotently and race-safely.
//!
//! The pipeline is resolve -> decide -> apply, where decide is a pure
//! function over the four-state identity union. A duplicate-key conflict
//! from any insert means a concurrent request for the same phone committed
//! first; that is expected, and handled by exactly one more
//! resolve -> decide -> apply pass. Two conflicted passes in a row is a
//! transient anomaly; the flow then guarantees forward progress with a
//! placeholder-keyed credential and flags the record for operator review.

use sha2::{Digest, Sha256};
use tracing::{error, info};
use uuid::Uuid;

use crate::domains::auth::errors::AuthError;
use crate::domains::auth::identity::{self, IdentityState};
use crate::domains::auth::models::Credential;
use crate::domains::auth::types::Role;
use crate::kernel::deps::ServerDeps;
use crate::kernel::traits::StoreError;

/// The converged identity for a phone.
#[derive(Debug, Clone)]
pub struct ProvisionedIdentity {
    pub credential: Credential,
    pub profile_id: Uuid,
}

/// What one provisioning pass should do, decided purely from the resolved
/// identity state.
#[derive(Debug, Clone)]
pub enum ProvisionStep {
    /// Case 1: both records exist and are linked.
    UseExisting {
        credential: Credential,
        profile_id: Uuid,
    },
    /// Case 2: orphaned profile next to an existing credential; link once.
    LinkProfile {
        credential: Credential,
        profile_id: Uuid,
    },
    /// Case 3: credential without a profile; create the profile.
    CreateProfile { credential: Credential },
    /// Orphaned profile with no credential at all; create one and adopt.
    AdoptProfile { profile_id: Uuid },
    /// Case 4: nothing exists yet.
    CreateBoth,
}

/// Pure case analysis over the identity union: a linked pair wins, then
/// completion of whichever half is missing.
pub fn decide(state: IdentityState) -> ProvisionStep {
    match state {
        IdentityState::Both {
            credential,
            profile,
            linked: true,
        } => ProvisionStep::UseExisting {
            credential,
            profile_id: profile.id,
        },
        IdentityState::Both {
            credential,
            profile,
            linked: false,
        } => ProvisionStep::LinkProfile {
            credential,
            profile_id: profile.id,
        },
        IdentityState::CredentialOnly(credential) => ProvisionStep::CreateProfile { credential },
        IdentityState::ProfileOnly(profile) => ProvisionStep::AdoptProfile {
            profile_id: profile.id,
        },
        IdentityState::NoRecords => ProvisionStep::CreateBoth,
    }
}

enum AttemptOutcome {
    Done(ProvisionedIdentity),
    /// A concurrent writer got there first; re-resolve and try again.
    Conflict,
}

/// Provision the identity for a phone.
///
/// Repeated calls with the same `(phone, role)`, sequential or concurrent,
/// converge on one `{credential, profile}` pair; duplicates are impossible
/// as long as the store enforces its uniqueness contract.
pub async fn provision(
    phone: &str,
    role: Role,
    deps: &ServerDeps,
) -> Result<ProvisionedIdentity, AuthError> {
    // One initial pass plus one bounded retry after a conflict; never a loop.
    const PASSES: u32 = 2;

    for pass in 0..PASSES {
        let snapshot = identity::resolve(deps.store.as_ref(), phone).await?;
        let state = IdentityState::classify(snapshot)?;
        let step = decide(state);

        match apply(deps, phone, role, step).await? {
            AttemptOutcome::Done(identity) => {
                deps.store
                    .upsert_role_grant(identity.credential.id, role)
                    .await?;
                return Ok(identity);
            }
            AttemptOutcome::Conflict => {
                info!(phone, pass, "provisioning raced a concurrent writer; re-resolving");
            }
        }
    }

    // Final read, no writes: both passes conflicting means concurrent
    // writers were committing; if one of them completed the pair, use it.
    let snapshot = identity::resolve(deps.store.as_ref(), phone).await?;
    if let IdentityState::Both {
        credential,
        profile,
        linked: true,
    } = IdentityState::classify(snapshot)?
    {
        deps.store.upsert_role_grant(credential.id, role).await?;
        return Ok(ProvisionedIdentity {
            credential,
            profile_id: profile.id,
        });
    }

    // Nothing usable after the retry: transient anomaly.
    let identity = provision_with_placeholder(deps, phone, role).await?;
    deps.store
        .upsert_role_grant(identity.credential.id, role)
        .await?;
    Ok(identity)
}

async fn apply(
    deps: &ServerDeps,
    phone: &str,
    role: Role,
    step: ProvisionStep,
) -> Result<AttemptOutcome, AuthError> {
    let store = deps.store.as_ref();

    match step {
        ProvisionStep::UseExisting {
            credential,
            profile_id,
        } => Ok(AttemptOutcome::Done(ProvisionedIdentity {
            credential,
            profile_id,
        })),

        ProvisionStep::LinkProfile {
            credential,
            profile_id,
        } => match store.link_profile(profile_id, credential.id).await? {
            Some(profile) => Ok(AttemptOutcome::Done(ProvisionedIdentity {
                credential,
                profile_id: profile.id,
            })),
            // Another request linked it in the meantime.
            None => Ok(AttemptOutcome::Conflict),
        },

        ProvisionStep::CreateProfile { credential } => {
            match store
                .insert_profile(credential.id, phone, phone, role)
                .await
            {
                Ok(profile) => Ok(AttemptOutcome::Done(ProvisionedIdentity {
                    credential,
                    profile_id: profile.id,
                })),
                Err(StoreError::Duplicate { .. }) => Ok(AttemptOutcome::Conflict),
                Err(err) => Err(err.into()),
            }
        }

        ProvisionStep::AdoptProfile { profile_id } => {
            let credential = match store.insert_credential(phone).await {
                Ok(credential) => credential,
                Err(StoreError::Duplicate { .. }) => return Ok(AttemptOutcome::Conflict),
                Err(err) => return Err(err.into()),
            };
            match store.link_profile(profile_id, credential.id).await? {
                Some(profile) => Ok(AttemptOutcome::Done(ProvisionedIdentity {
                    credential,
                    profile_id: profile.id,
                })),
                None => Ok(AttemptOutcome::Conflict),
            }
        }

        ProvisionStep::CreateBoth => {
            let credential = match store.insert_credential(phone).await {
                Ok(credential) => credential,
                Err(StoreError::Duplicate { .. }) => return Ok(AttemptOutcome::Conflict),
                Err(err) => return Err(err.into()),
            };
            match store
                .insert_profile(credential.id, phone, phone, role)
                .await
            {
                Ok(profile) => Ok(AttemptOutcome::Done(ProvisionedIdentity {
                    credential,
                    profile_id: profile.id,
                })),
                Err(StoreError::Duplicate { .. }) => Ok(AttemptOutcome::Conflict),
                Err(err) => Err(err.into()),
            }
        }
    }
}

/// Deterministic placeholder key for a phone whose raw-key insert keeps
/// conflicting. Deterministic on purpose: a double anomaly converges on the
/// same key, and the second writer recovers the first's row.
fn placeholder_key(phone: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(phone.as_bytes()));
    format!("dup:{}", &digest[..12])
}

/// Forward-progress path after both passes conflicted: create a credential
/// under a synthetic phone-derived key so the request can complete, and flag
/// the record for manual reconciliation.
async fn provision_with_placeholder(
    deps: &ServerDeps,
    phone: &str,
    role: Role,
) -> Result<ProvisionedIdentity, AuthError> {
    let store = deps.store.as_ref();
    let key = placeholder_key(phone);
    error!(
        phone,
        placeholder = %key,
        "provisioning conflicts persisted after retry; creating placeholder-keyed credential, operator review required"
    );

    let credential = match store.insert_credential(&key).await {
        Ok(credential) => credential,
        Err(StoreError::Duplicate { .. }) => store.credential_by_phone(&key).await?.ok_or_else(|| {
            AuthError::DataIntegrity {
                detail: format!("placeholder credential {key} conflicted but cannot be read back"),
            }
        })?,
        Err(err) => return Err(err.into()),
    };

    // The profile keeps the real phone; only the credential key is synthetic.
    let profile_id = match store.insert_profile(credential.id, phone, phone, role).await {
        Ok(profile) => profile.id,
        Err(StoreError::Duplicate { .. }) => match store.profile_by_phone(phone).await? {
            Some(profile) if profile.credential_id.is_none() => {
                match store.link_profile(profile.id, credential.id).await? {
                    Some(linked) => linked.id,
                    None => profile.id,
                }
            }
            Some(profile) => profile.id,
            None => {
                return Err(AuthError::DataIntegrity {
                    detail: format!("profile for {phone} conflicted but cannot be read back"),
                })
            }
        },
        Err(err) => return Err(err.into()),
    };

    Ok(ProvisionedIdentity {
        credential,
        profile_id,
    })
}
