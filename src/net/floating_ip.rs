//! Floating-address attachment via the cloud control-plane API
//!
//! Issues an authenticated assign action for the configured floating
//! address, then polls the address-echo service until the instance is seen
//! behind that address or the fixed polling budget runs out.

use std::net::Ipv4Addr;
use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tracing::{debug, info, warn};

use super::public_ip::PublicIpClient;
use crate::ProvisionError;

/// Default control-plane API endpoint
const API_BASE_URL: &str = "https://api.digitalocean.com";

/// Polling budget after an assign action: 24 attempts at 5 s (~2 minutes)
pub const POLL_ATTEMPTS: u32 = 24;
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Authenticated client for floating-address actions
pub struct FloatingIpClient {
    client: Client,
    base_url: String,
    token: String,
}

impl FloatingIpClient {
    pub fn new(token: impl Into<String>) -> Result<Self, ProvisionError> {
        Self::with_base_url(API_BASE_URL, token)
    }

    /// Use a custom API endpoint (useful for testing)
    pub fn with_base_url(
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, ProvisionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
        })
    }

    /// Request assignment of `floating_ip` to this instance
    ///
    /// The control plane expects the instance identifier as a number.
    pub async fn assign(&self, floating_ip: &str, instance_id: u64) -> Result<(), ProvisionError> {
        let url = format!("{}/v2/floating_ips/{}/actions", self.base_url, floating_ip);
        let body = json!({
            "type": "assign",
            "droplet_id": instance_id,
        });

        debug!("Assigning floating address {} to {}", floating_ip, instance_id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ProvisionError::Http(format!(
                "floating address assign returned {status}: {text}"
            )));
        }

        info!("Floating address {} assignment requested", floating_ip);
        Ok(())
    }
}

/// Poll the echo service until the observed address equals `target`
///
/// Exhausting the budget is an error the caller treats as non-fatal; the
/// run proceeds on whatever address the instance has.
pub async fn wait_for_address(
    echo: &PublicIpClient,
    target: Ipv4Addr,
) -> Result<(), ProvisionError> {
    wait_for_address_with(echo, target, POLL_ATTEMPTS, POLL_INTERVAL).await
}

/// Polling core with an injectable budget, used directly by tests
pub async fn wait_for_address_with(
    echo: &PublicIpClient,
    target: Ipv4Addr,
    attempts: u32,
    interval: Duration,
) -> Result<(), ProvisionError> {
    for attempt in 1..=attempts {
        match echo.fetch().await {
            Ok(observed) if observed == target => {
                info!("Observed address matches target {} after {} attempts", target, attempt);
                return Ok(());
            }
            Ok(observed) => {
                debug!(
                    "Attempt {}/{}: observed {} does not yet match {}",
                    attempt, attempts, observed, target
                );
            }
            Err(e) => {
                warn!("Attempt {}/{}: address echo failed: {}", attempt, attempts, e);
            }
        }

        if attempt < attempts {
            tokio::time::sleep(interval).await;
        }
    }

    Err(ProvisionError::Timeout(format!(
        "public address to become {target}"
    )))
}
