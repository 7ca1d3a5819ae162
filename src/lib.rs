//! provision-rs library
//!
//! First-boot provisioning for freshly created cloud instances. Two entry
//! points compose into one flow: the fetcher downloads and runs the current
//! initializer payload, and the initializer walks a fixed pipeline that
//! sets up the firewall, web server, certificate bootstrap and the
//! administrative account. A systemd timer keeps re-attempting certificate
//! issuance after the run has exited, until DNS propagates and issuance
//! succeeds.
//!
//! # Design Principles
//!
//! - **Safety First**: No unsafe code (`#![forbid(unsafe_code)]`)
//! - **Best-effort steps**: every step reports an explicit outcome; only a
//!   missing mandatory configuration or a failed web-server install aborts
//! - **Re-entrant retry**: the certificate retry task is safe to invoke
//!   repeatedly and disarms itself once issuance succeeds

pub mod config;
pub mod fetcher;
pub mod metadata;
pub mod net;
pub mod pipeline;
pub mod report;
pub mod scheduler;
pub mod state;
pub mod steps;
pub mod template;

mod error;

pub use error::ProvisionError;

use tracing::info;

use crate::net::PublicIpClient;
use crate::pipeline::Pipeline;
use crate::report::RunReport;
use crate::state::{CertState, ProvisionPaths};

/// Run the fetcher: download the initializer payload and execute it
pub async fn run_fetch(url: &str, paths: &ProvisionPaths) -> Result<(), ProvisionError> {
    fetcher::run(url, paths).await
}

/// Run the full initializer pipeline
///
/// Loads the configuration (fatal if mandatory fields are missing), walks
/// the steps, and returns the aggregated report. The caller decides the
/// process exit status from `report.failed()`.
pub async fn run_init(paths: ProvisionPaths) -> Result<RunReport, ProvisionError> {
    let config = config::load_config().await?;
    info!("Provisioning {} for {}", config.domain, config.admin_email);
    if config.wants_floating_ip() {
        info!("Floating address attachment requested");
    }

    let pipeline = Pipeline::new(config, paths)?;
    Ok(pipeline.run().await)
}

/// Run one evaluation of the certificate retry task
///
/// Exits through `Err` when a precondition blocks issuance or the issuance
/// command fails, so the invoking timer sees a non-zero status and fires
/// again later.
pub async fn run_cert_retry(paths: ProvisionPaths) -> Result<CertState, ProvisionError> {
    let config = config::load_config().await?;
    let echo = PublicIpClient::new()?;
    steps::certbot::run_once(&config, &paths, &echo).await
}
