//! Initializer pipeline
//!
//! Runs the provisioning steps in their fixed order, collecting an explicit
//! outcome per step. Only two conditions abort the run: a missing mandatory
//! configuration value (caught before the pipeline starts) and a failed web
//! server install. Everything else is recorded and the run continues.

use tracing::{debug, info, warn};

use crate::config::ProvisionConfig;
use crate::metadata::{InstanceMetadataService, MetadataSource};
use crate::net::{FloatingIpClient, PublicIpClient, floating_ip};
use crate::report::{RunReport, StepOutcome};
use crate::state::{
    CertState, ProvisionPaths, load_cert_state, write_completion_marker,
};
use crate::steps::{certbot, firewall, packages, users, webserver};
use crate::{ProvisionError, scheduler};

/// Step names recorded in the run report
pub mod step {
    pub const CONFIG: &str = "config";
    pub const FLOATING_IP: &str = "floating-ip";
    pub const FIREWALL: &str = "firewall";
    pub const PACKAGES: &str = "packages";
    pub const WEBSERVER: &str = "webserver";
    pub const WEBSERVER_CONFIG: &str = "webserver-config";
    pub const SMOKE_TEST: &str = "smoke-test";
    pub const CERT_CLIENT: &str = "cert-client";
    pub const CERT_INLINE: &str = "cert-inline";
    pub const RETRY_TIMER: &str = "retry-timer";
    pub const ADMIN_USER: &str = "admin-user";
    pub const MARKER: &str = "marker";
}

/// The initializer, with injectable external sources
pub struct Pipeline {
    config: ProvisionConfig,
    paths: ProvisionPaths,
    metadata: Box<dyn MetadataSource>,
    echo: PublicIpClient,
    control_plane_url: Option<String>,
}

impl Pipeline {
    /// Build a pipeline against the real external services
    pub fn new(config: ProvisionConfig, paths: ProvisionPaths) -> Result<Self, ProvisionError> {
        Ok(Self {
            config,
            paths,
            metadata: Box::new(InstanceMetadataService::new()?),
            echo: PublicIpClient::new()?,
            control_plane_url: None,
        })
    }

    /// Build a pipeline with substituted sources (used by tests)
    pub fn with_sources(
        config: ProvisionConfig,
        paths: ProvisionPaths,
        metadata: Box<dyn MetadataSource>,
        echo: PublicIpClient,
    ) -> Self {
        Self {
            config,
            paths,
            metadata,
            echo,
            control_plane_url: None,
        }
    }

    /// Point the floating-address client at a custom control-plane URL
    pub fn with_control_plane_url(mut self, url: impl Into<String>) -> Self {
        self.control_plane_url = Some(url.into());
        self
    }

    /// Run every step in order; returns the aggregated report
    pub async fn run(&self) -> RunReport {
        let mut report = RunReport::new();

        // Configuration was validated before the pipeline was built
        report.record(step::CONFIG, StepOutcome::Success);

        report.record(step::FLOATING_IP, self.attach_floating_ip().await);

        report.record(step::FIREWALL, soft(firewall::configure().await));
        report.record(step::PACKAGES, soft(packages::apply_baseline().await));

        // Only the package install itself is fatal; a broken site deploy
        // or restart still leaves a provisionable host
        let proceed = report.record(step::WEBSERVER, hard(webserver::install().await));
        if !proceed {
            warn!("Web server install failed; aborting run");
            return report;
        }

        report.record(
            step::WEBSERVER_CONFIG,
            soft(webserver::configure(&self.config, &self.paths).await),
        );

        report.record(
            step::SMOKE_TEST,
            soft(webserver::smoke_test_localhost().await),
        );

        report.record(step::CERT_CLIENT, soft(certbot::install_client().await));

        report.record(step::CERT_INLINE, self.inline_issuance().await);
        report.record(step::RETRY_TIMER, self.arm_retry_timer().await);

        report.record(
            step::ADMIN_USER,
            soft(users::provision(&self.config, &self.paths, self.metadata.as_ref()).await),
        );

        report.record(
            step::MARKER,
            soft(write_completion_marker(&self.paths).await),
        );

        info!("Provisioning run finished:\n{}", report);
        report
    }

    /// Attach the configured floating address, then wait for it to appear
    pub async fn attach_floating_ip(&self) -> StepOutcome {
        let Some((token, floating)) = self.config.floating_ip_request() else {
            return StepOutcome::Skipped("no floating address configured".to_string());
        };

        let target: std::net::Ipv4Addr = match floating.parse() {
            Ok(addr) => addr,
            Err(_) => {
                return StepOutcome::SoftFailure(format!(
                    "floating address {floating:?} is not a valid IPv4 address"
                ));
            }
        };

        let client = match &self.control_plane_url {
            Some(url) => FloatingIpClient::with_base_url(url, token),
            None => FloatingIpClient::new(token),
        };
        let client = match client {
            Ok(c) => c,
            Err(e) => return StepOutcome::SoftFailure(e.to_string()),
        };

        debug!("Resolving instance id via {}", self.metadata.name());
        let instance_id = match self.metadata.instance_id().await {
            Ok(id) => id,
            Err(e) => {
                return StepOutcome::SoftFailure(format!("instance id unavailable: {e}"));
            }
        };
        let instance_id: u64 = match instance_id.parse() {
            Ok(id) => id,
            Err(_) => {
                return StepOutcome::SoftFailure(format!(
                    "instance id {instance_id:?} is not numeric"
                ));
            }
        };

        if let Err(e) = client.assign(floating, instance_id).await {
            return StepOutcome::SoftFailure(format!("assign failed: {e}"));
        }

        match floating_ip::wait_for_address(&self.echo, target).await {
            Ok(()) => StepOutcome::Success,
            // Exhausting the polling budget does not stop the run
            Err(e) => StepOutcome::SoftFailure(e.to_string()),
        }
    }

    /// Attempt certificate issuance now if the primary domain is DNS-ready
    pub async fn inline_issuance(&self) -> StepOutcome {
        match certbot::run_once(&self.config, &self.paths, &self.echo).await {
            Ok(CertState::Issued) => StepOutcome::Success,
            Ok(CertState::Pending) => {
                StepOutcome::SoftFailure("certificate still pending".to_string())
            }
            Err(e) => StepOutcome::SoftFailure(e.to_string()),
        }
    }

    /// Arm the retry timer unless the inline attempt already issued
    ///
    /// Arming after a successful inline issuance would install a timer
    /// whose first evaluation immediately disarms it again; skipping keeps
    /// an issued run timer-free from the start.
    pub async fn arm_retry_timer(&self) -> StepOutcome {
        match load_cert_state(&self.paths).await {
            Ok(CertState::Issued) => {
                StepOutcome::Skipped("certificate already issued".to_string())
            }
            Ok(CertState::Pending) => soft(scheduler::arm(&self.paths).await),
            Err(e) => StepOutcome::SoftFailure(e.to_string()),
        }
    }
}

fn soft(result: Result<(), ProvisionError>) -> StepOutcome {
    match result {
        Ok(()) => StepOutcome::Success,
        Err(e) => {
            warn!("{}", e);
            StepOutcome::SoftFailure(e.to_string())
        }
    }
}

fn hard(result: Result<(), ProvisionError>) -> StepOutcome {
    match result {
        Ok(()) => StepOutcome::Success,
        Err(e) => StepOutcome::HardFailure(e.to_string()),
    }
}
