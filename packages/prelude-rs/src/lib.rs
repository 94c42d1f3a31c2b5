//! HTTP client for the Prelude verification API.
//!
//! Covers the two endpoints the platform uses: creating a verification for a
//! phone number and checking a submitted code against it. Policy (timeouts,
//! fallback when the provider is unreachable) belongs to the caller.

use reqwest::{header, Client};
use serde_json::json;

pub mod models;

use crate::models::{CheckResponse, VerificationResponse, VerificationTarget};

pub const DEFAULT_BASE_URL: &str = "https://api.prelude.so";

#[derive(Debug, thiserror::Error)]
pub enum PreludeError {
    #[error("request to provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Api { status: u16, body: String },
}

#[derive(Debug, Clone)]
pub struct PreludeOptions {
    pub api_key: String,
    /// Override for tests and self-hosted gateways; defaults to the public API.
    pub base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PreludeService {
    options: PreludeOptions,
    client: Client,
}

impl PreludeService {
    pub fn new(options: PreludeOptions) -> Self {
        Self {
            options,
            client: Client::new(),
        }
    }

    fn base_url(&self) -> &str {
        self.options
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
    }

    /// Start a verification for a phone number.
    ///
    /// The provider generates and delivers its own code out of band; the
    /// returned `id` is the handle later passed to [`check_verification`].
    ///
    /// [`check_verification`]: PreludeService::check_verification
    pub async fn create_verification(
        &self,
        phone_number: &str,
    ) -> Result<VerificationResponse, PreludeError> {
        let url = format!("{}/v2/verification", self.base_url());

        let response = self
            .client
            .post(url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.options.api_key))
            .json(&json!({
                "target": VerificationTarget::phone_number(phone_number),
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PreludeError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<VerificationResponse>().await?)
    }

    /// Check a submitted code against an existing verification.
    ///
    /// A 2xx response carries the provider's verdict in `status`; non-2xx is
    /// returned as [`PreludeError::Api`] so the caller can distinguish "the
    /// provider said no" from "the provider could not answer".
    pub async fn check_verification(
        &self,
        verification_id: &str,
        code: &str,
    ) -> Result<CheckResponse, PreludeError> {
        let url = format!(
            "{}/v2/verification/{}/check",
            self.base_url(),
            verification_id
        );

        let response = self
            .client
            .post(url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.options.api_key))
            .json(&json!({ "code": code }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PreludeError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<CheckResponse>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_url_is_used_when_not_overridden() {
        let service = PreludeService::new(PreludeOptions {
            api_key: "key".to_string(),
            base_url: None,
        });
        assert_eq!(service.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn base_url_override_wins() {
        let service = PreludeService::new(PreludeOptions {
            api_key: "key".to_string(),
            base_url: Some("http://localhost:9009".to_string()),
        });
        assert_eq!(service.base_url(), "http://localhost:9009");
    }

    #[test]
    fn phone_target_shape() {
        let target = VerificationTarget::phone_number("+9665xxxxxxx1");
        assert_eq!(target.target_type, "phone_number");
        assert_eq!(target.value, "+9665xxxxxxx1");
    }
}
