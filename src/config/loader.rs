//! Configuration loader
//!
//! Loads the provisioning configuration from the config file and the
//! environment. Environment variables take precedence over file values.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use super::{ProvisionConfig, RawConfig};
use crate::ProvisionError;

/// Default configuration file location
pub const CONFIG_FILE: &str = "/etc/provision-rs/config.yaml";

/// Environment variable prefix for configuration overrides
const ENV_PREFIX: &str = "PROVISION_";

/// Load the configuration from the default file location and environment
pub async fn load_config() -> Result<ProvisionConfig, ProvisionError> {
    ConfigLoader::new().load().await
}

/// Configuration loader with injectable file path for tests
pub struct ConfigLoader {
    path: PathBuf,
    include_env: bool,
}

impl ConfigLoader {
    /// Create a loader that reads the default file location
    pub fn new() -> Self {
        Self {
            path: PathBuf::from(CONFIG_FILE),
            include_env: true,
        }
    }

    /// Use a custom config file path
    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = path.as_ref().to_path_buf();
        self
    }

    /// Skip environment variables (useful for hermetic tests)
    pub fn skip_env(mut self) -> Self {
        self.include_env = false;
        self
    }

    /// Load, merge and validate the configuration
    pub async fn load(self) -> Result<ProvisionConfig, ProvisionError> {
        let mut raw = load_config_file(&self.path).await?.unwrap_or_default();

        if self.include_env {
            raw = raw.merge(env_config());
        }

        raw.validate()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Load the raw config from a YAML file, `None` if the file does not exist
async fn load_config_file(path: impl AsRef<Path>) -> Result<Option<RawConfig>, ProvisionError> {
    let path = path.as_ref();

    if !path.exists() {
        debug!("No config file at {}", path.display());
        return Ok(None);
    }

    let content = fs::read_to_string(path).await?;

    match serde_yaml::from_str(&content) {
        Ok(raw) => {
            debug!("Loaded config from {}", path.display());
            Ok(Some(raw))
        }
        Err(e) => {
            warn!("Failed to parse {}: {}", path.display(), e);
            Err(ProvisionError::Yaml(e))
        }
    }
}

/// Read configuration overrides from `PROVISION_*` environment variables
fn env_config() -> RawConfig {
    RawConfig {
        domain: env_var("DOMAIN"),
        www_domain: env_var("WWW_DOMAIN"),
        admin_email: env_var("ADMIN_EMAIL"),
        username: env_var("USERNAME"),
        api_token: env_var("API_TOKEN"),
        floating_ip: env_var("FLOATING_IP"),
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{key}"))
        .ok()
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_config_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");

        fs::write(&path, "domain: example.com\nadmin_email: a@example.com\n")
            .await
            .unwrap();

        let config = ConfigLoader::new()
            .with_path(&path)
            .skip_env()
            .load()
            .await
            .unwrap();

        assert_eq!(config.domain, "example.com");
        assert_eq!(config.www_domain, "www.example.com");
    }

    #[tokio::test]
    async fn test_load_config_file_not_exists() {
        let result = load_config_file("/nonexistent/path").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_missing_file_fails_validation() {
        let temp = TempDir::new().unwrap();
        let result = ConfigLoader::new()
            .with_path(temp.path().join("absent.yaml"))
            .skip_env()
            .load()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_malformed_yaml_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");

        fs::write(&path, "domain: [unclosed").await.unwrap();

        let result = ConfigLoader::new().with_path(&path).skip_env().load().await;
        assert!(matches!(result, Err(ProvisionError::Yaml(_))));
    }

    #[tokio::test]
    async fn test_full_config_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");

        fs::write(
            &path,
            "domain: example.com\n\
             www_domain: w.example.com\n\
             admin_email: ops@example.com\n\
             username: deploy\n\
             api_token: tok-123\n\
             floating_ip: 203.0.113.7\n",
        )
        .await
        .unwrap();

        let config = ConfigLoader::new()
            .with_path(&path)
            .skip_env()
            .load()
            .await
            .unwrap();

        assert_eq!(config.www_domain, "w.example.com");
        assert_eq!(config.username, "deploy");
        assert!(config.wants_floating_ip());
    }
}
