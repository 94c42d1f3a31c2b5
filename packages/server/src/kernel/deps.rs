//! Server dependencies for the auth flows (using traits for testability)
//!
//! This module provides the central dependency container consumed by all
//! domain actions. All external services use trait abstractions to enable
//! testing.

use anyhow::Result;
use async_trait::async_trait;
use prelude_verify::PreludeService;
use std::sync::Arc;
use std::time::Duration;

use crate::kernel::traits::{
    BaseAuthStore, BaseDeliveryChannel, BaseSessionBackend, BaseVerificationProvider,
    ProviderVerdict,
};

// =============================================================================
// PreludeService Adapter (implements BaseVerificationProvider trait)
// =============================================================================

/// Wrapper around PreludeService that implements the provider trait and maps
/// the provider's status strings to a coarse verdict.
pub struct PreludeAdapter(pub Arc<PreludeService>);

impl PreludeAdapter {
    pub fn new(service: Arc<PreludeService>) -> Self {
        Self(service)
    }

    fn verdict_from_status(status: &str) -> ProviderVerdict {
        match status {
            "valid" | "succeeded" => ProviderVerdict::Valid,
            "invalid" | "failed" | "expired" => ProviderVerdict::Rejected,
            _ => ProviderVerdict::Indeterminate,
        }
    }
}

#[async_trait]
impl BaseVerificationProvider for PreludeAdapter {
    async fn start(&self, phone: &str) -> Result<String> {
        let response = self.0.create_verification(phone).await?;
        Ok(response.id)
    }

    async fn check(&self, external_ref: &str, code: &str) -> Result<ProviderVerdict> {
        let response = self.0.check_verification(external_ref, code).await?;
        Ok(Self::verdict_from_status(&response.status))
    }
}

// =============================================================================
// AuthSettings
// =============================================================================

/// Tunables for the verify-and-provision flow, loaded from [`Config`] in
/// production and constructed directly in tests.
///
/// [`Config`]: crate::config::Config
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Bound on every provider call; exceeding it falls back, it never
    /// blocks the caller.
    pub provider_timeout: Duration,
    /// Whether provider failure/timeout/indeterminate falls back to the
    /// local code comparison (true, observed production behavior) or counts
    /// as rejection (false). An open product question; see DESIGN.md.
    pub provider_fail_open: bool,
    /// Minimum gap between code requests for the same phone.
    pub resend_cooldown: chrono::Duration,
    /// Domain of the synthetic contact addresses derived for phone-only
    /// credentials.
    pub synthetic_address_domain: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(3),
            provider_fail_open: true,
            resend_cooldown: chrono::Duration::seconds(60),
            synthetic_address_domain: "login.vitrina.app".to_string(),
        }
    }
}

// =============================================================================
// ServerDeps
// =============================================================================

/// Server dependencies accessible to the auth actions (using traits for
/// testability).
#[derive(Clone)]
pub struct ServerDeps {
    pub store: Arc<dyn BaseAuthStore>,
    /// External verification provider; `None` runs the flow local-only.
    pub provider: Option<Arc<dyn BaseVerificationProvider>>,
    pub delivery: Arc<dyn BaseDeliveryChannel>,
    pub session_backend: Arc<dyn BaseSessionBackend>,
    pub settings: AuthSettings,
}

impl ServerDeps {
    pub fn new(
        store: Arc<dyn BaseAuthStore>,
        provider: Option<Arc<dyn BaseVerificationProvider>>,
        delivery: Arc<dyn BaseDeliveryChannel>,
        session_backend: Arc<dyn BaseSessionBackend>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            store,
            provider,
            delivery,
            session_backend,
            settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_status_mapping() {
        assert_eq!(
            PreludeAdapter::verdict_from_status("valid"),
            ProviderVerdict::Valid
        );
        assert_eq!(
            PreludeAdapter::verdict_from_status("succeeded"),
            ProviderVerdict::Valid
        );
        assert_eq!(
            PreludeAdapter::verdict_from_status("invalid"),
            ProviderVerdict::Rejected
        );
        assert_eq!(
            PreludeAdapter::verdict_from_status("expired"),
            ProviderVerdict::Rejected
        );
        assert_eq!(
            PreludeAdapter::verdict_from_status("pending"),
            ProviderVerdict::Indeterminate
        );
        assert_eq!(
            PreludeAdapter::verdict_from_status(""),
            ProviderVerdict::Indeterminate
        );
    }
}
