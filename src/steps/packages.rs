//! Package management
//!
//! Installs packages using the system package manager. Debian-family hosts
//! are the primary target but the detection handles the other common
//! managers too.

use tracing::{debug, info, warn};

use super::command_exists;
use crate::ProvisionError;

/// Baseline toolset installed on every provisioned host
pub const TOOLSET: [&str; 3] = ["fail2ban", "unattended-upgrades", "curl"];

/// Detected package manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
}

impl PackageManager {
    /// Detect the system's package manager
    pub async fn detect() -> Option<Self> {
        if command_exists("apt-get").await {
            return Some(Self::Apt);
        }
        if command_exists("dnf").await {
            return Some(Self::Dnf);
        }
        if command_exists("yum").await {
            return Some(Self::Yum);
        }
        None
    }

    fn install_command(&self) -> (&str, Vec<&str>) {
        match self {
            Self::Apt => ("apt-get", vec!["install", "-y"]),
            Self::Dnf => ("dnf", vec!["install", "-y"]),
            Self::Yum => ("yum", vec!["install", "-y"]),
        }
    }

    fn update_command(&self) -> (&str, Vec<&str>) {
        match self {
            Self::Apt => ("apt-get", vec!["update"]),
            Self::Dnf => ("dnf", vec!["check-update"]),
            Self::Yum => ("yum", vec!["check-update"]),
        }
    }

    fn upgrade_command(&self) -> (&str, Vec<&str>) {
        match self {
            Self::Apt => ("apt-get", vec!["upgrade", "-y"]),
            Self::Dnf => ("dnf", vec!["upgrade", "-y"]),
            Self::Yum => ("yum", vec!["update", "-y"]),
        }
    }
}

async fn detect_or_err() -> Result<PackageManager, ProvisionError> {
    PackageManager::detect()
        .await
        .ok_or_else(|| ProvisionError::Package("no supported package manager found".to_string()))
}

/// Update the package cache
pub async fn update_package_cache() -> Result<(), ProvisionError> {
    let pm = detect_or_err().await?;
    info!("Updating package cache using {:?}", pm);

    let (cmd, args) = pm.update_command();
    let output = tokio::process::Command::new(cmd)
        .args(&args)
        .env("DEBIAN_FRONTEND", "noninteractive")
        .output()
        .await
        .map_err(|e| ProvisionError::Command(e.to_string()))?;

    // yum/dnf check-update returns 100 when updates are available
    if !output.status.success() && output.status.code() != Some(100) {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!("Package cache update had issues: {}", stderr);
    }

    Ok(())
}

/// Apply pending OS upgrades
pub async fn upgrade_packages() -> Result<(), ProvisionError> {
    let pm = detect_or_err().await?;
    info!("Upgrading packages using {:?}", pm);

    let (cmd, args) = pm.upgrade_command();
    let output = tokio::process::Command::new(cmd)
        .args(&args)
        .env("DEBIAN_FRONTEND", "noninteractive")
        .output()
        .await
        .map_err(|e| ProvisionError::Command(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!("Package upgrade had issues: {}", stderr);
    }

    Ok(())
}

/// Install a list of packages
pub async fn install_packages(packages: &[&str]) -> Result<(), ProvisionError> {
    if packages.is_empty() {
        return Ok(());
    }

    let pm = detect_or_err().await?;
    info!("Installing {} packages using {:?}", packages.len(), pm);
    debug!("Packages: {:?}", packages);

    let (cmd, base_args) = pm.install_command();
    let mut args: Vec<&str> = base_args;
    args.extend_from_slice(packages);

    let output = tokio::process::Command::new(cmd)
        .args(&args)
        .env("DEBIAN_FRONTEND", "noninteractive")
        .output()
        .await
        .map_err(|e| ProvisionError::Command(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProvisionError::Package(format!(
            "failed to install {:?}: {}",
            packages,
            stderr.trim()
        )));
    }

    info!("Successfully installed {} packages", packages.len());
    Ok(())
}

/// Install a single package
pub async fn install_package(package: &str) -> Result<(), ProvisionError> {
    install_packages(&[package]).await
}

/// Update, upgrade, and install the baseline toolset
///
/// Individual toolset install failures are logged and skipped; the run
/// continues with whatever subset installed.
pub async fn apply_baseline() -> Result<(), ProvisionError> {
    update_package_cache().await?;
    upgrade_packages().await?;

    let mut failures = 0;
    for pkg in TOOLSET {
        if let Err(e) = install_package(pkg).await {
            warn!("Failed to install {}: {}", pkg, e);
            failures += 1;
        }
    }

    if failures == TOOLSET.len() {
        return Err(ProvisionError::Package(
            "no baseline package could be installed".to_string(),
        ));
    }

    Ok(())
}
