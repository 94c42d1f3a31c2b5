//! Session issuance: mint a redeemable exchange token for a credential.
//!
//! The session backing service wants an address-like identifier. Phone-only
//! credentials get a synthetic address derived from the phone, persisted on
//! first use so every later issuance reuses the same value.

use tracing::{debug, info};

use crate::domains::auth::errors::AuthError;
use crate::domains::auth::models::Credential;
use crate::domains::auth::types::SessionCredential;
use crate::kernel::deps::ServerDeps;

/// Deterministic placeholder address for a phone-only credential.
///
/// Alphanumeric characters of the phone (placeholder keys included) at the
/// configured domain: `+966501234567` -> `966501234567@login.vitrina.app`.
pub fn synthetic_address(phone: &str, domain: &str) -> String {
    let local: String = phone.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    format!("{local}@{domain}")
}

/// Issue a session exchange token for a credential.
pub async fn issue(
    deps: &ServerDeps,
    credential: &Credential,
) -> Result<SessionCredential, AuthError> {
    let address = match &credential.synthetic_address {
        Some(address) => address.clone(),
        None => {
            let derived =
                synthetic_address(&credential.phone, &deps.settings.synthetic_address_domain);
            // Conditional write: a concurrent issuance may have persisted an
            // address already, in which case the stored one wins.
            let updated = deps
                .store
                .set_synthetic_address_if_absent(credential.id, &derived)
                .await?;
            let address = updated.synthetic_address.unwrap_or(derived);
            info!(credential_id = %credential.id, "persisted synthetic session address");
            address
        }
    };

    let token = deps
        .session_backend
        .issue_exchange_token(&address)
        .await
        .map_err(AuthError::SessionIssuance)?;

    debug!(credential_id = %credential.id, "session exchange token issued");
    Ok(SessionCredential {
        credential_id: credential.id,
        exchange_address: address,
        exchange_token: token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_address_strips_plus() {
        assert_eq!(
            synthetic_address("+966501234567", "login.vitrina.app"),
            "966501234567@login.vitrina.app"
        );
    }

    #[test]
    fn synthetic_address_is_deterministic() {
        let a = synthetic_address("+15551230001", "login.vitrina.app");
        let b = synthetic_address("+15551230001", "login.vitrina.app");
        assert_eq!(a, b);
    }

    #[test]
    fn synthetic_address_handles_placeholder_keys() {
        let address = synthetic_address("dup:1f2e3d4c5b6a", "login.vitrina.app");
        assert_eq!(address, "dup1f2e3d4c5b6a@login.vitrina.app");
    }
}
