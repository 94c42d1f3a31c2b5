// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic. The verify and
// provision flows are domain functions that consume these traits, which is
// what lets the whole reconciliation core run in tests with no database,
// provider, or delivery gateway in reach.
//
// Naming convention: Base* for trait names (e.g., BaseAuthStore)

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::domains::auth::models::{Challenge, Credential, Profile, RoleGrant};
use crate::domains::auth::types::Role;

// =============================================================================
// Store (Infrastructure - durable shared state)
// =============================================================================

/// Store-level failure, separated so callers can tell an expected uniqueness
/// conflict from the store being unreachable.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected a write. Expected under concurrency;
    /// the provisioner recovers with a bounded re-resolve.
    #[error("duplicate key: {constraint}")]
    Duplicate { constraint: String },

    /// The store could not answer. Transient from the caller's perspective.
    #[error("storage unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable state behind the auth flows.
///
/// Contract carried by every implementation:
/// - `phone` is unique on credentials and on profiles; a conflicting insert
///   fails with [`StoreError::Duplicate`].
/// - at most one `active` challenge per phone.
/// - `record_attempt` is an atomic increment-and-check: the lockout
///   threshold holds under concurrent attempts.
/// - terminal challenge transitions only fire while the row is still active.
#[async_trait]
pub trait BaseAuthStore: Send + Sync {
    // --- challenges ---

    async fn insert_challenge(&self, challenge: Challenge) -> StoreResult<Challenge>;

    /// Most recent challenge for the phone, whatever its status.
    async fn latest_challenge(&self, phone: &str) -> StoreResult<Option<Challenge>>;

    /// Supersede any still-active challenges for the phone.
    async fn expire_active_challenges(&self, phone: &str) -> StoreResult<u64>;

    /// Atomically record an attempt, locking the challenge when the counter
    /// reaches its cap. `None` when the challenge is no longer active.
    async fn record_attempt(&self, challenge_id: Uuid) -> StoreResult<Option<Challenge>>;

    /// Consume the challenge; `false` when another caller already did.
    async fn mark_challenge_verified(&self, challenge_id: Uuid) -> StoreResult<bool>;

    async fn mark_challenge_expired(&self, challenge_id: Uuid) -> StoreResult<bool>;

    // --- identity ---

    async fn credential_by_phone(&self, phone: &str) -> StoreResult<Option<Credential>>;

    async fn profile_by_phone(&self, phone: &str) -> StoreResult<Option<Profile>>;

    async fn insert_credential(&self, phone: &str) -> StoreResult<Credential>;

    async fn insert_profile(
        &self,
        credential_id: Uuid,
        phone: &str,
        display_name: &str,
        role: Role,
    ) -> StoreResult<Profile>;

    /// Conditional adoption of an orphaned profile; `None` when the profile
    /// was already linked.
    async fn link_profile(
        &self,
        profile_id: Uuid,
        credential_id: Uuid,
    ) -> StoreResult<Option<Profile>>;

    async fn upsert_role_grant(&self, credential_id: Uuid, role: Role) -> StoreResult<RoleGrant>;

    /// First writer wins; returns the row with whichever address persisted.
    async fn set_synthetic_address_if_absent(
        &self,
        credential_id: Uuid,
        address: &str,
    ) -> StoreResult<Credential>;
}

// =============================================================================
// Verification Provider (Infrastructure - external code checks)
// =============================================================================

/// Coarse verdict from the external provider's check operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderVerdict {
    /// Definite success.
    Valid,
    /// Definite rejection.
    Rejected,
    /// The provider answered but committed to nothing (pending, retry, an
    /// unrecognized status). Treated the same as a provider failure.
    Indeterminate,
}

#[async_trait]
pub trait BaseVerificationProvider: Send + Sync {
    /// Start a provider-side verification; returns the handle to check
    /// against later.
    async fn start(&self, phone: &str) -> Result<String>;

    /// Check a submitted code against a previously started verification.
    async fn check(&self, external_ref: &str, code: &str) -> Result<ProviderVerdict>;
}

// =============================================================================
// Delivery Channel (Infrastructure - code delivery, out of scope)
// =============================================================================

#[async_trait]
pub trait BaseDeliveryChannel: Send + Sync {
    /// Hand the code to the messaging channel. The auth flow only depends on
    /// the challenge record existing, not on delivery succeeding.
    async fn send_code(&self, phone: &str, code: &str, purpose: &str) -> Result<()>;
}

// =============================================================================
// Session Backend (Infrastructure - exchange token minting)
// =============================================================================

#[async_trait]
pub trait BaseSessionBackend: Send + Sync {
    /// Mint a redeemable exchange token for a contact address.
    async fn issue_exchange_token(&self, address: &str) -> Result<String>;
}
