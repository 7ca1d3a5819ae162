//! Public address echo client
//!
//! Asks an external echo service which address this instance appears as.
//! The response body is the caller's public IPv4 as plain text.

use std::net::Ipv4Addr;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use super::dns::parse_echo_body;
use crate::ProvisionError;

/// Default address-echo service
const ECHO_URL: &str = "https://ipv4.icanhazip.com";

/// Client for the public address echo service
pub struct PublicIpClient {
    client: Client,
    url: String,
}

impl PublicIpClient {
    pub fn new() -> Result<Self, ProvisionError> {
        Self::with_url(ECHO_URL)
    }

    /// Use a custom echo endpoint (useful for testing)
    pub fn with_url(url: impl Into<String>) -> Result<Self, ProvisionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// The instance's currently observed public IPv4 address
    pub async fn fetch(&self) -> Result<Ipv4Addr, ProvisionError> {
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(ProvisionError::Http(format!(
                "address echo returned {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let addr = parse_echo_body(&body).ok_or_else(|| {
            ProvisionError::Network(format!("address echo returned non-IPv4 body: {body:?}"))
        })?;

        debug!("Observed public address: {}", addr);
        Ok(addr)
    }
}
