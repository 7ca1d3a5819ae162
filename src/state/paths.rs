//! Standard filesystem locations used by provision-rs
//!
//! All system paths hang off this struct so tests can rebase everything
//! under a temporary directory.

use std::path::{Path, PathBuf};

/// Base directory for provisioning state
pub const STATE_DIR: &str = "/var/lib/provision-rs";

/// Default provisioning log file
pub const LOG_FILE: &str = "/var/log/provision-rs.log";

/// Filesystem layout for a provisioning run
#[derive(Debug, Clone)]
pub struct ProvisionPaths {
    /// State directory (default: /var/lib/provision-rs)
    pub state: PathBuf,
    /// systemd unit directory (default: /etc/systemd/system)
    pub systemd: PathBuf,
    /// nginx configuration root (default: /etc/nginx)
    pub nginx: PathBuf,
    /// Web content root (default: /var/www)
    pub web_root: PathBuf,
    /// sudoers drop-in directory (default: /etc/sudoers.d)
    pub sudoers: PathBuf,
    /// Provisioning log file
    pub log_file: PathBuf,
}

impl Default for ProvisionPaths {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvisionPaths {
    /// Create with system default paths
    pub fn new() -> Self {
        Self {
            state: PathBuf::from(STATE_DIR),
            systemd: PathBuf::from("/etc/systemd/system"),
            nginx: PathBuf::from("/etc/nginx"),
            web_root: PathBuf::from("/var/www"),
            sudoers: PathBuf::from("/etc/sudoers.d"),
            log_file: PathBuf::from(LOG_FILE),
        }
    }

    /// Rebase every location under `base` (useful for testing)
    pub fn with_base(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            state: base.join("var/lib/provision-rs"),
            systemd: base.join("etc/systemd/system"),
            nginx: base.join("etc/nginx"),
            web_root: base.join("var/www"),
            sudoers: base.join("etc/sudoers.d"),
            log_file: base.join("var/log/provision-rs.log"),
        }
    }

    /// Completion marker file, overwritten on each finished run
    pub fn completion_marker(&self) -> PathBuf {
        self.state.join("provisioned")
    }

    /// Certificate-bootstrap state marker
    pub fn cert_state(&self) -> PathBuf {
        self.state.join("certificate-state")
    }

    /// Temporary location for the fetched initializer payload
    pub fn payload(&self) -> PathBuf {
        self.state.join("payload.init")
    }

    /// Per-domain virtual host definition
    pub fn vhost_available(&self, domain: &str) -> PathBuf {
        self.nginx.join("sites-available").join(domain)
    }

    /// Enabled vhost symlink
    pub fn vhost_enabled(&self, domain: &str) -> PathBuf {
        self.nginx.join("sites-enabled").join(domain)
    }

    /// Enabled distribution default site
    pub fn default_site_enabled(&self) -> PathBuf {
        self.nginx.join("sites-enabled").join("default")
    }

    /// Document root for a domain
    pub fn site_root(&self, domain: &str) -> PathBuf {
        self.web_root.join(domain).join("html")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let paths = ProvisionPaths::new();
        assert_eq!(
            paths.completion_marker(),
            PathBuf::from("/var/lib/provision-rs/provisioned")
        );
        assert_eq!(
            paths.vhost_available("example.com"),
            PathBuf::from("/etc/nginx/sites-available/example.com")
        );
    }

    #[test]
    fn test_with_base_rebases_everything() {
        let paths = ProvisionPaths::with_base("/tmp/test");
        assert!(paths.cert_state().starts_with("/tmp/test"));
        assert!(paths.site_root("example.com").starts_with("/tmp/test"));
        assert!(paths.log_file.starts_with("/tmp/test"));
    }
}
