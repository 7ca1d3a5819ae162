//! Run state management
//!
//! Two small pieces of persistent state live on disk:
//! - the completion marker, overwritten with a timestamp each time a
//!   provisioning run finishes;
//! - the certificate-bootstrap state, which records whether a certificate
//!   has been issued so the retry task can short-circuit instead of probing
//!   the CA client.

pub mod paths;

pub use paths::ProvisionPaths;

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::fs;
use tracing::debug;

use crate::ProvisionError;

/// Certificate-bootstrap state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertState {
    /// No certificate issued yet; the retry task keeps evaluating
    Pending,
    /// Certificate issued; terminal, no further evaluation
    Issued,
}

impl std::fmt::Display for CertState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Issued => write!(f, "issued"),
        }
    }
}

/// Read the persisted certificate state; absent marker means `Pending`
pub async fn load_cert_state(paths: &ProvisionPaths) -> Result<CertState, ProvisionError> {
    let path = paths.cert_state();
    if !path.exists() {
        return Ok(CertState::Pending);
    }

    let content = fs::read_to_string(&path).await?;
    if content.trim_start().starts_with("issued") {
        Ok(CertState::Issued)
    } else {
        Ok(CertState::Pending)
    }
}

/// Persist the certificate state with a timestamp
pub async fn store_cert_state(
    paths: &ProvisionPaths,
    state: CertState,
) -> Result<(), ProvisionError> {
    let path = paths.cert_state();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    fs::write(&path, format!("{state} {}\n", unix_timestamp())).await?;
    debug!("Recorded certificate state: {}", state);
    Ok(())
}

/// Overwrite the completion marker with the current timestamp
pub async fn write_completion_marker(paths: &ProvisionPaths) -> Result<(), ProvisionError> {
    let path = paths.completion_marker();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    fs::write(&path, format!("{}\n", unix_timestamp())).await?;
    debug!("Wrote completion marker: {}", path.display());
    Ok(())
}

/// Whether a previous run finished on this instance
pub fn is_provisioned(paths: &ProvisionPaths) -> bool {
    paths.completion_marker().exists()
}

/// Seconds since the epoch as a marker payload
fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_cert_state_defaults_to_pending() {
        let temp = TempDir::new().unwrap();
        let paths = ProvisionPaths::with_base(temp.path());

        assert_eq!(load_cert_state(&paths).await.unwrap(), CertState::Pending);
    }

    #[tokio::test]
    async fn test_cert_state_round_trip() {
        let temp = TempDir::new().unwrap();
        let paths = ProvisionPaths::with_base(temp.path());

        store_cert_state(&paths, CertState::Issued).await.unwrap();
        assert_eq!(load_cert_state(&paths).await.unwrap(), CertState::Issued);

        store_cert_state(&paths, CertState::Pending).await.unwrap();
        assert_eq!(load_cert_state(&paths).await.unwrap(), CertState::Pending);
    }

    #[tokio::test]
    async fn test_completion_marker_overwrite() {
        let temp = TempDir::new().unwrap();
        let paths = ProvisionPaths::with_base(temp.path());

        assert!(!is_provisioned(&paths));
        write_completion_marker(&paths).await.unwrap();
        assert!(is_provisioned(&paths));

        // Re-running overwrites rather than appends
        write_completion_marker(&paths).await.unwrap();
        let content = fs::read_to_string(paths.completion_marker()).await.unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}
