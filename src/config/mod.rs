//! Provisioning configuration
//!
//! A flat set of named values sourced from a YAML file and the environment.
//! Immutable once loaded; missing mandatory fields abort the run before any
//! system change is made.

pub mod loader;

pub use loader::{ConfigLoader, load_config};

use serde::{Deserialize, Serialize};

use crate::ProvisionError;

/// Default administrative account name when none is configured
pub const DEFAULT_USERNAME: &str = "admin";

/// Raw configuration as read from file or environment
///
/// Every field is optional here; validation into [`ProvisionConfig`]
/// enforces the mandatory ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// Primary domain name (mandatory)
    pub domain: Option<String>,

    /// Alternate domain name, defaults to `www.<domain>`
    pub www_domain: Option<String>,

    /// Administrator contact address for certificate registration (mandatory)
    pub admin_email: Option<String>,

    /// Name of the non-root administrative account
    pub username: Option<String>,

    /// Cloud control-plane API token
    pub api_token: Option<String>,

    /// Floating address to attach to this instance
    pub floating_ip: Option<String>,
}

impl RawConfig {
    /// Overlay `other` on top of `self`; set fields in `other` win
    pub fn merge(mut self, other: RawConfig) -> Self {
        if other.domain.is_some() {
            self.domain = other.domain;
        }
        if other.www_domain.is_some() {
            self.www_domain = other.www_domain;
        }
        if other.admin_email.is_some() {
            self.admin_email = other.admin_email;
        }
        if other.username.is_some() {
            self.username = other.username;
        }
        if other.api_token.is_some() {
            self.api_token = other.api_token;
        }
        if other.floating_ip.is_some() {
            self.floating_ip = other.floating_ip;
        }
        self
    }

    /// Validate mandatory fields and apply defaults
    pub fn validate(self) -> Result<ProvisionConfig, ProvisionError> {
        let domain = self
            .domain
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| ProvisionError::Config("'domain' is required".to_string()))?;

        let admin_email = self
            .admin_email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| ProvisionError::Config("'admin_email' is required".to_string()))?;

        let www_domain = self
            .www_domain
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("www.{domain}"));

        let username = self
            .username
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USERNAME.to_string());

        Ok(ProvisionConfig {
            domain,
            www_domain,
            admin_email,
            username,
            api_token: self.api_token.filter(|t| !t.trim().is_empty()),
            floating_ip: self.floating_ip.filter(|ip| !ip.trim().is_empty()),
        })
    }
}

/// Validated provisioning configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionConfig {
    /// Primary domain name served by the web server
    pub domain: String,
    /// Alternate domain, included in the certificate opportunistically
    pub www_domain: String,
    /// Contact address passed to the certificate client
    pub admin_email: String,
    /// Administrative account to create
    pub username: String,
    /// Control-plane API token, enables floating-address attachment
    pub api_token: Option<String>,
    /// Floating address to attach when a token is present
    pub floating_ip: Option<String>,
}

impl ProvisionConfig {
    /// Token and floating address when both are configured
    pub fn floating_ip_request(&self) -> Option<(&str, &str)> {
        match (&self.api_token, &self.floating_ip) {
            (Some(token), Some(ip)) => Some((token, ip)),
            _ => None,
        }
    }

    /// Whether the floating-address step should run at all
    pub fn wants_floating_ip(&self) -> bool {
        self.floating_ip_request().is_some()
    }
}
