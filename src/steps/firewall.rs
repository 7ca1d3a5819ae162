//! Host firewall configuration
//!
//! Allows remote shell and both web services through ufw, then enables
//! enforcement. Failures here never abort the run; an unreachable firewall
//! tool leaves the host open but provisionable.

use tracing::{info, warn};

use super::{command_exists, packages, run_checked};
use crate::ProvisionError;

/// Services allowed through the firewall
const ALLOWED_SERVICES: [&str; 3] = ["OpenSSH", "Nginx HTTP", "Nginx HTTPS"];

/// Configure and enable the firewall
pub async fn configure() -> Result<(), ProvisionError> {
    if !command_exists("ufw").await {
        // Firewall-tool install failure is soft; the caller decides
        packages::install_package("ufw").await?;
    }

    for service in ALLOWED_SERVICES {
        if let Err(e) = run_checked("ufw", &["allow", service]).await {
            // An unknown application profile for one service shouldn't
            // block the others
            warn!("Failed to allow {}: {}", service, e);
        }
    }

    run_checked("ufw", &["--force", "enable"]).await?;

    info!("Firewall enabled with {} allowed services", ALLOWED_SERVICES.len());
    Ok(())
}
