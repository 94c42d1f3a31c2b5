//! Code delivery channels.
//!
//! Delivery is out of scope for the auth flow proper: the flow only depends
//! on the challenge record existing. Production posts the code to the
//! messaging gateway's webhook; environments without a gateway log instead.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::info;

use crate::kernel::traits::BaseDeliveryChannel;

/// Posts `{phone, code, purpose}` to the configured messaging gateway.
pub struct WebhookDeliveryChannel {
    webhook_url: String,
    client: Client,
}

impl WebhookDeliveryChannel {
    pub fn new(webhook_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            webhook_url,
            client,
        }
    }
}

#[async_trait]
impl BaseDeliveryChannel for WebhookDeliveryChannel {
    async fn send_code(&self, phone: &str, code: &str, purpose: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&json!({
                "phone": phone,
                "code": code,
                "purpose": purpose,
            }))
            .send()
            .await
            .context("delivery gateway unreachable")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("delivery gateway returned {status}"));
        }
        Ok(())
    }
}

/// No-op channel for environments without a gateway (local development).
/// Logs the phone so the operator can see a code went "out"; never the code.
pub struct NoopDeliveryChannel;

#[async_trait]
impl BaseDeliveryChannel for NoopDeliveryChannel {
    async fn send_code(&self, phone: &str, _code: &str, purpose: &str) -> Result<()> {
        info!(phone, purpose, "no delivery gateway configured; dropping code");
        Ok(())
    }
}
