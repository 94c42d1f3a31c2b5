//! Identity resolution: what exists for a phone right now.
//!
//! Resolution is a pure read; it reports whatever subset of records exists,
//! inconsistencies included, and never repairs anything. The snapshot is
//! classified into an exhaustive four-state union so the provisioner's case
//! analysis is a match, not a nest of conditionals.

use crate::domains::auth::errors::AuthError;
use crate::domains::auth::models::{Credential, Profile};
use crate::kernel::traits::{BaseAuthStore, StoreResult};

/// Whatever the store currently holds for a phone. Either side may be
/// missing; the profile may be orphaned or linked.
#[derive(Debug, Clone)]
pub struct IdentitySnapshot {
    pub credential: Option<Credential>,
    pub profile: Option<Profile>,
}

/// Look up credential and profile independently by phone.
pub async fn resolve(store: &dyn BaseAuthStore, phone: &str) -> StoreResult<IdentitySnapshot> {
    let credential = store.credential_by_phone(phone).await?;
    let profile = store.profile_by_phone(phone).await?;
    Ok(IdentitySnapshot {
        credential,
        profile,
    })
}

/// The four shapes an identity can be in, plus whether an existing pair is
/// already linked.
#[derive(Debug, Clone)]
pub enum IdentityState {
    NoRecords,
    CredentialOnly(Credential),
    /// Orphaned: the profile exists with `credential_id` unset.
    ProfileOnly(Profile),
    Both {
        credential: Credential,
        profile: Profile,
        linked: bool,
    },
}

impl IdentityState {
    /// Classify a snapshot.
    ///
    /// A profile pointing at a credential other than the one carrying this
    /// phone (or at a credential this phone does not have at all) is
    /// inconsistent data; it is reported, never repaired.
    pub fn classify(snapshot: IdentitySnapshot) -> Result<Self, AuthError> {
        match (snapshot.credential, snapshot.profile) {
            (None, None) => Ok(IdentityState::NoRecords),
            (Some(credential), None) => Ok(IdentityState::CredentialOnly(credential)),
            (None, Some(profile)) => match profile.credential_id {
                None => Ok(IdentityState::ProfileOnly(profile)),
                Some(other) => Err(AuthError::DataIntegrity {
                    detail: format!(
                        "profile {} is linked to credential {} which does not carry phone {}",
                        profile.id, other, profile.phone
                    ),
                }),
            },
            (Some(credential), Some(profile)) => match profile.credential_id {
                None => Ok(IdentityState::Both {
                    credential,
                    profile,
                    linked: false,
                }),
                Some(linked_id) if linked_id == credential.id => Ok(IdentityState::Both {
                    credential,
                    profile,
                    linked: true,
                }),
                Some(other) => Err(AuthError::DataIntegrity {
                    detail: format!(
                        "profile {} is linked to credential {} but phone {} belongs to credential {}",
                        profile.id, other, profile.phone, credential.id
                    ),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::auth::types::Role;
    use chrono::Utc;
    use uuid::Uuid;

    fn credential(phone: &str) -> Credential {
        Credential {
            id: Uuid::new_v4(),
            phone: phone.to_string(),
            synthetic_address: None,
            created_at: Utc::now(),
        }
    }

    fn profile(phone: &str, credential_id: Option<Uuid>) -> Profile {
        let now = Utc::now();
        Profile {
            id: Uuid::new_v4(),
            credential_id,
            phone: phone.to_string(),
            display_name: phone.to_string(),
            default_role: Role::Affiliate,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn classify_no_records() {
        let state = IdentityState::classify(IdentitySnapshot {
            credential: None,
            profile: None,
        })
        .unwrap();
        assert!(matches!(state, IdentityState::NoRecords));
    }

    #[test]
    fn classify_credential_only() {
        let state = IdentityState::classify(IdentitySnapshot {
            credential: Some(credential("+966501234567")),
            profile: None,
        })
        .unwrap();
        assert!(matches!(state, IdentityState::CredentialOnly(_)));
    }

    #[test]
    fn classify_orphaned_profile() {
        let state = IdentityState::classify(IdentitySnapshot {
            credential: None,
            profile: Some(profile("+966501234567", None)),
        })
        .unwrap();
        assert!(matches!(state, IdentityState::ProfileOnly(_)));
    }

    #[test]
    fn classify_both_unlinked() {
        let state = IdentityState::classify(IdentitySnapshot {
            credential: Some(credential("+966501234567")),
            profile: Some(profile("+966501234567", None)),
        })
        .unwrap();
        assert!(matches!(state, IdentityState::Both { linked: false, .. }));
    }

    #[test]
    fn classify_both_linked() {
        let cred = credential("+966501234567");
        let state = IdentityState::classify(IdentitySnapshot {
            profile: Some(profile("+966501234567", Some(cred.id))),
            credential: Some(cred),
        })
        .unwrap();
        assert!(matches!(state, IdentityState::Both { linked: true, .. }));
    }

    #[test]
    fn mismatched_link_is_integrity_error() {
        let cred = credential("+966501234567");
        let result = IdentityState::classify(IdentitySnapshot {
            profile: Some(profile("+966501234567", Some(Uuid::new_v4()))),
            credential: Some(cred),
        });
        assert!(matches!(result, Err(AuthError::DataIntegrity { .. })));
    }

    #[test]
    fn dangling_link_without_credential_is_integrity_error() {
        let result = IdentityState::classify(IdentitySnapshot {
            credential: None,
            profile: Some(profile("+966501234567", Some(Uuid::new_v4()))),
        });
        assert!(matches!(result, Err(AuthError::DataIntegrity { .. })));
    }
}
