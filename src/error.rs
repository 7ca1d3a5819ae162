//! Error types for provision-rs

use thiserror::Error;

/// Main error type for provisioning operations
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metadata service error: {0}")]
    Metadata(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Step '{step}' failed: {message}")]
    Step { step: String, message: String },

    #[error("Package installation failed: {0}")]
    Package(String),

    #[error("Certificate issuance failed: {0}")]
    Certificate(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("User/group error: {0}")]
    UserGroup(String),

    #[error("Command execution failed: {0}")]
    Command(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Timeout waiting for {0}")]
    Timeout(String),
}

impl ProvisionError {
    /// Create a step error
    pub fn step(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Step {
            step: step.into(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ProvisionError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}
