//! HTTP client for the session backing service.
//!
//! The service's admin endpoint mints a one-shot exchange token for a contact
//! address; the client redeems that token for a full session on its own.
//! Token semantics live entirely on the service side.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::kernel::traits::BaseSessionBackend;

#[derive(Debug, Deserialize)]
struct GenerateLinkResponse {
    properties: LinkProperties,
}

#[derive(Debug, Deserialize)]
struct LinkProperties {
    hashed_token: Option<String>,
}

#[derive(Clone)]
pub struct SessionServiceClient {
    base_url: String,
    service_key: String,
    client: Client,
}

impl SessionServiceClient {
    pub fn new(base_url: String, service_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
            client,
        }
    }
}

#[async_trait]
impl BaseSessionBackend for SessionServiceClient {
    async fn issue_exchange_token(&self, address: &str) -> Result<String> {
        let url = format!("{}/admin/generate_link", self.base_url);

        let response = self
            .client
            .post(url)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.service_key),
            )
            .json(&json!({
                "type": "magiclink",
                "email": address,
            }))
            .send()
            .await
            .context("session service unreachable")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("session service returned {status}: {body}"));
        }

        let link = response
            .json::<GenerateLinkResponse>()
            .await
            .context("malformed session service response")?;

        link.properties
            .hashed_token
            .ok_or_else(|| anyhow!("session service response carried no token"))
    }
}
