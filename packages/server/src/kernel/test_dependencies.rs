// TestDependencies - in-memory/mock implementations for testing
//
// The in-memory store enforces the same contract as the PostgreSQL
// implementation (uniqueness, one-active-challenge-per-phone, atomic
// attempt counting), so the reconciliation flows can be exercised without a
// database. Mocks capture their calls for assertions.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use crate::domains::auth::models::{Challenge, ChallengeStatus, Credential, Profile, RoleGrant};
use crate::domains::auth::types::Role;
use crate::kernel::deps::{AuthSettings, ServerDeps};
use crate::kernel::traits::{
    BaseAuthStore, BaseDeliveryChannel, BaseSessionBackend, BaseVerificationProvider,
    ProviderVerdict, StoreError, StoreResult,
};

// =============================================================================
// In-Memory Auth Store
// =============================================================================

#[derive(Default)]
struct StoreInner {
    challenges: Vec<Challenge>,
    credentials: Vec<Credential>,
    profiles: Vec<Profile>,
    role_grants: Vec<RoleGrant>,
}

/// In-memory [`BaseAuthStore`] with the production store's semantics.
///
/// Fault injection: `set_unavailable` makes every call fail as storage
/// trouble; `inject_credential_conflicts` makes the next N credential
/// inserts fail with a duplicate-key conflict (simulating a concurrent
/// writer the subsequent resolve cannot see).
#[derive(Default)]
pub struct InMemoryAuthStore {
    inner: Mutex<StoreInner>,
    unavailable: AtomicBool,
    credential_conflicts: AtomicU32,
}

impl InMemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn inject_credential_conflicts(&self, count: u32) {
        self.credential_conflicts.store(count, Ordering::SeqCst);
    }

    pub fn challenges(&self) -> Vec<Challenge> {
        self.inner.lock().unwrap().challenges.clone()
    }

    pub fn credentials(&self) -> Vec<Credential> {
        self.inner.lock().unwrap().credentials.clone()
    }

    pub fn profiles(&self) -> Vec<Profile> {
        self.inner.lock().unwrap().profiles.clone()
    }

    pub fn role_grants(&self) -> Vec<RoleGrant> {
        self.inner.lock().unwrap().role_grants.clone()
    }

    /// Seed a pre-existing (possibly orphaned) profile, as a partially
    /// completed prior provisioning attempt would have left it.
    pub fn seed_profile(&self, profile: Profile) {
        self.inner.lock().unwrap().profiles.push(profile);
    }

    pub fn seed_credential(&self, credential: Credential) {
        self.inner.lock().unwrap().credentials.push(credential);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable(anyhow!("store offline (injected)")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BaseAuthStore for InMemoryAuthStore {
    async fn insert_challenge(&self, challenge: Challenge) -> StoreResult<Challenge> {
        self.check_available()?;
        let mut inner = self.inner.lock().unwrap();
        if challenge.status == ChallengeStatus::Active
            && inner
                .challenges
                .iter()
                .any(|c| c.phone == challenge.phone && c.status == ChallengeStatus::Active)
        {
            return Err(StoreError::Duplicate {
                constraint: "challenges_one_active_per_phone".to_string(),
            });
        }
        inner.challenges.push(challenge.clone());
        Ok(challenge)
    }

    async fn latest_challenge(&self, phone: &str) -> StoreResult<Option<Challenge>> {
        self.check_available()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .challenges
            .iter()
            .filter(|c| c.phone == phone)
            .max_by_key(|c| c.created_at)
            .cloned())
    }

    async fn expire_active_challenges(&self, phone: &str) -> StoreResult<u64> {
        self.check_available()?;
        let mut inner = self.inner.lock().unwrap();
        let mut expired = 0;
        for challenge in inner
            .challenges
            .iter_mut()
            .filter(|c| c.phone == phone && c.status == ChallengeStatus::Active)
        {
            challenge.status = ChallengeStatus::Expired;
            expired += 1;
        }
        Ok(expired)
    }

    async fn record_attempt(&self, challenge_id: Uuid) -> StoreResult<Option<Challenge>> {
        self.check_available()?;
        let mut inner = self.inner.lock().unwrap();
        let Some(challenge) = inner
            .challenges
            .iter_mut()
            .find(|c| c.id == challenge_id && c.status == ChallengeStatus::Active)
        else {
            return Ok(None);
        };
        challenge.attempts += 1;
        if challenge.attempts >= challenge.max_attempts {
            challenge.status = ChallengeStatus::Locked;
        }
        Ok(Some(challenge.clone()))
    }

    async fn mark_challenge_verified(&self, challenge_id: Uuid) -> StoreResult<bool> {
        self.check_available()?;
        let mut inner = self.inner.lock().unwrap();
        match inner
            .challenges
            .iter_mut()
            .find(|c| c.id == challenge_id && c.status == ChallengeStatus::Active)
        {
            Some(challenge) => {
                challenge.status = ChallengeStatus::Verified;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_challenge_expired(&self, challenge_id: Uuid) -> StoreResult<bool> {
        self.check_available()?;
        let mut inner = self.inner.lock().unwrap();
        match inner
            .challenges
            .iter_mut()
            .find(|c| c.id == challenge_id && c.status == ChallengeStatus::Active)
        {
            Some(challenge) => {
                challenge.status = ChallengeStatus::Expired;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn credential_by_phone(&self, phone: &str) -> StoreResult<Option<Credential>> {
        self.check_available()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .credentials
            .iter()
            .find(|c| c.phone == phone)
            .cloned())
    }

    async fn profile_by_phone(&self, phone: &str) -> StoreResult<Option<Profile>> {
        self.check_available()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner.profiles.iter().find(|p| p.phone == phone).cloned())
    }

    async fn insert_credential(&self, phone: &str) -> StoreResult<Credential> {
        self.check_available()?;
        if self
            .credential_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Duplicate {
                constraint: "credentials_phone_key".to_string(),
            });
        }
        let mut inner = self.inner.lock().unwrap();
        if inner.credentials.iter().any(|c| c.phone == phone) {
            return Err(StoreError::Duplicate {
                constraint: "credentials_phone_key".to_string(),
            });
        }
        let credential = Credential {
            id: Uuid::new_v4(),
            phone: phone.to_string(),
            synthetic_address: None,
            created_at: Utc::now(),
        };
        inner.credentials.push(credential.clone());
        Ok(credential)
    }

    async fn insert_profile(
        &self,
        credential_id: Uuid,
        phone: &str,
        display_name: &str,
        role: Role,
    ) -> StoreResult<Profile> {
        self.check_available()?;
        let mut inner = self.inner.lock().unwrap();
        if inner.profiles.iter().any(|p| p.phone == phone) {
            return Err(StoreError::Duplicate {
                constraint: "profiles_phone_key".to_string(),
            });
        }
        let now = Utc::now();
        let profile = Profile {
            id: Uuid::new_v4(),
            credential_id: Some(credential_id),
            phone: phone.to_string(),
            display_name: display_name.to_string(),
            default_role: role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        inner.profiles.push(profile.clone());
        Ok(profile)
    }

    async fn link_profile(
        &self,
        profile_id: Uuid,
        credential_id: Uuid,
    ) -> StoreResult<Option<Profile>> {
        self.check_available()?;
        let mut inner = self.inner.lock().unwrap();
        let Some(profile) = inner
            .profiles
            .iter_mut()
            .find(|p| p.id == profile_id && p.credential_id.is_none())
        else {
            return Ok(None);
        };
        profile.credential_id = Some(credential_id);
        profile.updated_at = Utc::now();
        Ok(Some(profile.clone()))
    }

    async fn upsert_role_grant(&self, credential_id: Uuid, role: Role) -> StoreResult<RoleGrant> {
        self.check_available()?;
        let mut inner = self.inner.lock().unwrap();
        if let Some(grant) = inner
            .role_grants
            .iter_mut()
            .find(|g| g.credential_id == credential_id && g.role == role)
        {
            grant.is_active = true;
            return Ok(grant.clone());
        }
        let grant = RoleGrant {
            credential_id,
            role,
            is_active: true,
            granted_at: Utc::now(),
        };
        inner.role_grants.push(grant.clone());
        Ok(grant)
    }

    async fn set_synthetic_address_if_absent(
        &self,
        credential_id: Uuid,
        address: &str,
    ) -> StoreResult<Credential> {
        self.check_available()?;
        let mut inner = self.inner.lock().unwrap();
        let Some(credential) = inner
            .credentials
            .iter_mut()
            .find(|c| c.id == credential_id)
        else {
            return Err(StoreError::Unavailable(anyhow!(
                "credential {credential_id} not found"
            )));
        };
        if credential.synthetic_address.is_none() {
            credential.synthetic_address = Some(address.to_string());
        }
        Ok(credential.clone())
    }
}

// =============================================================================
// Mock Verification Provider
// =============================================================================

enum ProviderBehavior {
    Verdict(ProviderVerdict),
    Fail,
    Delay(Duration, ProviderVerdict),
}

pub struct MockVerificationProvider {
    behavior: Mutex<ProviderBehavior>,
    start_calls: AtomicU32,
    check_calls: AtomicU32,
}

impl MockVerificationProvider {
    fn with_behavior(behavior: ProviderBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            start_calls: AtomicU32::new(0),
            check_calls: AtomicU32::new(0),
        }
    }

    /// Provider that approves every check.
    pub fn valid() -> Self {
        Self::with_behavior(ProviderBehavior::Verdict(ProviderVerdict::Valid))
    }

    /// Provider that definitively rejects every check.
    pub fn rejecting() -> Self {
        Self::with_behavior(ProviderBehavior::Verdict(ProviderVerdict::Rejected))
    }

    /// Provider that answers but commits to nothing.
    pub fn indeterminate() -> Self {
        Self::with_behavior(ProviderBehavior::Verdict(ProviderVerdict::Indeterminate))
    }

    /// Provider whose calls error out.
    pub fn failing() -> Self {
        Self::with_behavior(ProviderBehavior::Fail)
    }

    /// Provider that answers after `delay` (for timeout tests).
    pub fn delayed(delay: Duration, verdict: ProviderVerdict) -> Self {
        Self::with_behavior(ProviderBehavior::Delay(delay, verdict))
    }

    pub fn start_calls(&self) -> u32 {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn check_calls(&self) -> u32 {
        self.check_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BaseVerificationProvider for MockVerificationProvider {
    async fn start(&self, _phone: &str) -> Result<String> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior.lock().unwrap();
        match *behavior {
            ProviderBehavior::Fail => Err(anyhow!("provider down (mock)")),
            _ => Ok(format!("ver_mock_{}", self.start_calls())),
        }
    }

    async fn check(&self, _external_ref: &str, _code: &str) -> Result<ProviderVerdict> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = {
            let guard = self.behavior.lock().unwrap();
            match *guard {
                ProviderBehavior::Verdict(v) => ProviderBehavior::Verdict(v),
                ProviderBehavior::Fail => ProviderBehavior::Fail,
                ProviderBehavior::Delay(d, v) => ProviderBehavior::Delay(d, v),
            }
        };
        match behavior {
            ProviderBehavior::Verdict(verdict) => Ok(verdict),
            ProviderBehavior::Fail => Err(anyhow!("provider down (mock)")),
            ProviderBehavior::Delay(delay, verdict) => {
                tokio::time::sleep(delay).await;
                Ok(verdict)
            }
        }
    }
}

// =============================================================================
// Mock Delivery Channel
// =============================================================================

#[derive(Debug, Clone)]
pub struct DeliveredCode {
    pub phone: String,
    pub code: String,
    pub purpose: String,
}

#[derive(Default)]
pub struct MockDeliveryChannel {
    sent: Mutex<Vec<DeliveredCode>>,
    fail: AtomicBool,
}

impl MockDeliveryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<DeliveredCode> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseDeliveryChannel for MockDeliveryChannel {
    async fn send_code(&self, phone: &str, code: &str, purpose: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("gateway down (mock)"));
        }
        self.sent.lock().unwrap().push(DeliveredCode {
            phone: phone.to_string(),
            code: code.to_string(),
            purpose: purpose.to_string(),
        });
        Ok(())
    }
}

// =============================================================================
// Mock Session Backend
// =============================================================================

#[derive(Default)]
pub struct MockSessionBackend {
    issued: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl MockSessionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Addresses tokens were minted for, in order.
    pub fn issued_for(&self) -> Vec<String> {
        self.issued.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseSessionBackend for MockSessionBackend {
    async fn issue_exchange_token(&self, address: &str) -> Result<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("session service down (mock)"));
        }
        let mut issued = self.issued.lock().unwrap();
        issued.push(address.to_string());
        Ok(format!("exchange_tok_{}", issued.len()))
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

/// Bundle of concrete mocks plus the [`ServerDeps`] view the actions take.
/// Keep the bundle around in tests: it retains the concrete types for
/// assertions after handing trait objects to the flow.
pub struct TestDependencies {
    pub store: Arc<InMemoryAuthStore>,
    pub provider: Arc<MockVerificationProvider>,
    pub delivery: Arc<MockDeliveryChannel>,
    pub session_backend: Arc<MockSessionBackend>,
    pub settings: AuthSettings,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryAuthStore::new()),
            provider: Arc::new(MockVerificationProvider::valid()),
            delivery: Arc::new(MockDeliveryChannel::new()),
            session_backend: Arc::new(MockSessionBackend::new()),
            settings: AuthSettings::default(),
        }
    }

    pub fn with_provider(mut self, provider: MockVerificationProvider) -> Self {
        self.provider = Arc::new(provider);
        self
    }

    pub fn with_settings(mut self, settings: AuthSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Deps with the external provider configured.
    pub fn server_deps(&self) -> ServerDeps {
        ServerDeps::new(
            self.store.clone(),
            Some(self.provider.clone()),
            self.delivery.clone(),
            self.session_backend.clone(),
            self.settings.clone(),
        )
    }

    /// Deps without an external provider (local-only verification).
    pub fn server_deps_without_provider(&self) -> ServerDeps {
        ServerDeps::new(
            self.store.clone(),
            None,
            self.delivery.clone(),
            self.session_backend.clone(),
            self.settings.clone(),
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
