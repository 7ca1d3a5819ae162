//! Instance metadata service client
//!
//! The cloud platform exposes instance identity and registered SSH public
//! keys on a link-local HTTP endpoint. The trait seam exists so tests (and
//! the pipeline scenarios) can substitute a mock.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::ProvisionError;

/// Link-local metadata endpoint
const METADATA_BASE_URL: &str = "http://169.254.169.254";

/// Source of instance identity and registered public keys
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Name of this source, for logging
    fn name(&self) -> &'static str;

    /// The cloud-assigned instance identifier
    async fn instance_id(&self) -> Result<String, ProvisionError>;

    /// SSH public keys registered for this instance, one entry per key
    async fn public_keys(&self) -> Result<Vec<String>, ProvisionError>;
}

/// HTTP client for the link-local instance metadata service
pub struct InstanceMetadataService {
    client: Client,
    base_url: String,
}

impl InstanceMetadataService {
    pub fn new() -> Result<Self, ProvisionError> {
        Self::with_base_url(METADATA_BASE_URL)
    }

    /// Use a custom endpoint (useful for testing against a mock server)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ProvisionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .connect_timeout(Duration::from_secs(2))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn fetch(&self, path: &str) -> Result<String, ProvisionError> {
        let url = format!("{}/metadata/v1/{}", self.base_url, path);
        debug!("Fetching metadata path: {}", path);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(ProvisionError::Metadata(format!(
                "Failed to fetch {}: {}",
                path,
                response.status()
            )));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl MetadataSource for InstanceMetadataService {
    fn name(&self) -> &'static str {
        "instance-metadata"
    }

    async fn instance_id(&self) -> Result<String, ProvisionError> {
        Ok(self.fetch("id").await?.trim().to_string())
    }

    async fn public_keys(&self) -> Result<Vec<String>, ProvisionError> {
        let body = self.fetch("public-keys").await?;
        Ok(body
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }
}

/// Configurable in-memory metadata source for tests
pub struct MockMetadataSource {
    instance_id: Option<String>,
    public_keys: Vec<String>,
}

impl MockMetadataSource {
    pub fn new() -> Self {
        Self {
            instance_id: Some("instance-0001".to_string()),
            public_keys: Vec::new(),
        }
    }

    pub fn with_instance_id(mut self, id: impl Into<String>) -> Self {
        self.instance_id = Some(id.into());
        self
    }

    /// Simulate an unreachable metadata endpoint
    pub fn unavailable(mut self) -> Self {
        self.instance_id = None;
        self
    }

    pub fn with_public_keys(mut self, keys: Vec<String>) -> Self {
        self.public_keys = keys;
        self
    }
}

impl Default for MockMetadataSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataSource for MockMetadataSource {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn instance_id(&self) -> Result<String, ProvisionError> {
        self.instance_id
            .clone()
            .ok_or_else(|| ProvisionError::Metadata("metadata endpoint unreachable".to_string()))
    }

    async fn public_keys(&self) -> Result<Vec<String>, ProvisionError> {
        if self.instance_id.is_none() {
            return Err(ProvisionError::Metadata(
                "metadata endpoint unreachable".to_string(),
            ));
        }
        Ok(self.public_keys.clone())
    }
}
