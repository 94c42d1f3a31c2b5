//! Verification adapter: is this code valid for this challenge?
//!
//! Prefers the external provider when the challenge carries a provider-side
//! handle, and falls back to comparing against the locally stored code when
//! the provider errors, times out, or will not commit. A definite provider
//! answer (either way) is final; only the absence of one falls through.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domains::auth::models::Challenge;
use crate::kernel::deps::AuthSettings;
use crate::kernel::traits::{BaseVerificationProvider, ProviderVerdict};

/// Check `supplied_code` against a challenge.
///
/// Never errors: provider trouble resolves through the fallback policy. With
/// `provider_fail_open` disabled, an unconfirmed provider check counts as a
/// rejection instead of falling back.
pub async fn check(
    provider: Option<&Arc<dyn BaseVerificationProvider>>,
    settings: &AuthSettings,
    challenge: &Challenge,
    supplied_code: &str,
) -> bool {
    if let (Some(provider), Some(external_ref)) = (provider, challenge.external_ref.as_deref()) {
        match tokio::time::timeout(
            settings.provider_timeout,
            provider.check(external_ref, supplied_code),
        )
        .await
        {
            Ok(Ok(ProviderVerdict::Valid)) => return true,
            Ok(Ok(ProviderVerdict::Rejected)) => return false,
            Ok(Ok(ProviderVerdict::Indeterminate)) => {
                debug!(external_ref, "provider returned indeterminate status");
            }
            Ok(Err(error)) => {
                warn!(external_ref, %error, "provider check failed");
            }
            Err(_) => {
                warn!(external_ref, "provider check timed out");
            }
        }

        if !settings.provider_fail_open {
            warn!(external_ref, "provider unconfirmed and fallback disabled; rejecting");
            return false;
        }
        debug!(external_ref, "falling back to local code comparison");
    }

    local_match(&challenge.code, supplied_code)
}

/// Constant-time comparison of the stored and supplied codes.
fn local_match(stored: &str, supplied: &str) -> bool {
    Sha256::digest(stored.as_bytes()) == Sha256::digest(supplied.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::MockVerificationProvider;
    use chrono::Utc;
    use std::time::Duration;

    fn challenge(code: &str, external_ref: Option<&str>) -> Challenge {
        Challenge::new(
            "+966501234567".to_string(),
            code.to_string(),
            external_ref.map(String::from),
            Utc::now(),
        )
    }

    fn settings() -> AuthSettings {
        AuthSettings {
            provider_timeout: Duration::from_millis(50),
            ..AuthSettings::default()
        }
    }

    #[test]
    fn local_match_is_exact() {
        assert!(local_match("482913", "482913"));
        assert!(!local_match("482913", "000000"));
        assert!(!local_match("482913", "48291"));
    }

    #[tokio::test]
    async fn no_provider_compares_locally() {
        let challenge = challenge("482913", None);
        assert!(check(None, &settings(), &challenge, "482913").await);
        assert!(!check(None, &settings(), &challenge, "000000").await);
    }

    #[tokio::test]
    async fn provider_approval_wins_over_local_mismatch() {
        let provider: Arc<dyn BaseVerificationProvider> =
            Arc::new(MockVerificationProvider::valid());
        let challenge = challenge("482913", Some("ver_1"));
        // Provider says yes even though the local code differs.
        assert!(check(Some(&provider), &settings(), &challenge, "999999").await);
    }

    #[tokio::test]
    async fn provider_rejection_is_final() {
        let provider: Arc<dyn BaseVerificationProvider> =
            Arc::new(MockVerificationProvider::rejecting());
        let challenge = challenge("482913", Some("ver_1"));
        // No fallback on a definite rejection, even with a matching local code.
        assert!(!check(Some(&provider), &settings(), &challenge, "482913").await);
    }

    #[tokio::test]
    async fn provider_error_falls_back_to_local() {
        let provider: Arc<dyn BaseVerificationProvider> =
            Arc::new(MockVerificationProvider::failing());
        let challenge = challenge("482913", Some("ver_1"));
        assert!(check(Some(&provider), &settings(), &challenge, "482913").await);
        assert!(!check(Some(&provider), &settings(), &challenge, "000000").await);
    }

    #[tokio::test]
    async fn provider_timeout_falls_back_to_local() {
        let provider: Arc<dyn BaseVerificationProvider> = Arc::new(
            MockVerificationProvider::delayed(Duration::from_millis(500), ProviderVerdict::Rejected),
        );
        let challenge = challenge("482913", Some("ver_1"));
        assert!(check(Some(&provider), &settings(), &challenge, "482913").await);
    }

    #[tokio::test]
    async fn provider_indeterminate_falls_back_to_local() {
        let provider: Arc<dyn BaseVerificationProvider> =
            Arc::new(MockVerificationProvider::indeterminate());
        let challenge = challenge("482913", Some("ver_1"));
        assert!(check(Some(&provider), &settings(), &challenge, "482913").await);
    }

    #[tokio::test]
    async fn fail_closed_rejects_on_provider_trouble() {
        let provider: Arc<dyn BaseVerificationProvider> =
            Arc::new(MockVerificationProvider::failing());
        let challenge = challenge("482913", Some("ver_1"));
        let settings = AuthSettings {
            provider_fail_open: false,
            ..settings()
        };
        assert!(!check(Some(&provider), &settings, &challenge, "482913").await);
    }

    #[tokio::test]
    async fn missing_external_ref_skips_provider() {
        let provider = Arc::new(MockVerificationProvider::rejecting());
        let as_trait: Arc<dyn BaseVerificationProvider> = provider.clone();
        let challenge = challenge("482913", None);
        assert!(check(Some(&as_trait), &settings(), &challenge, "482913").await);
        assert_eq!(provider.check_calls(), 0);
    }
}
