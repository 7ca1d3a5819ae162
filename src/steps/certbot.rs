//! Certificate bootstrap
//!
//! Wraps the certbot CLI in a two-state machine: `Pending` until an
//! issuance attempt succeeds, `Issued` afterwards (terminal). An attempt is
//! made only when the primary domain is DNS-ready and the web server is
//! listening on port 80. The alternate `www` domain joins the request
//! opportunistically, only if it is independently DNS-ready at evaluation
//! time.
//!
//! The evaluation is re-entrant: invoked repeatedly by the systemd timer,
//! it has no side effects beyond logging while preconditions are unmet, and
//! it short-circuits once `Issued`.

use std::time::Duration;

use tokio::net::TcpStream;
use tracing::{info, warn};

use super::run_checked;
use crate::config::ProvisionConfig;
use crate::net::{PublicIpClient, dns};
use crate::state::{CertState, ProvisionPaths, load_cert_state, store_cert_state};
use crate::{ProvisionError, scheduler};

/// Address probed to confirm the web server is listening
const WEB_PROBE_ADDR: &str = "127.0.0.1:80";

/// Result of one evaluation of the issuance preconditions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// Terminal state reached earlier; nothing to do
    AlreadyIssued,
    /// A precondition is unmet; the named condition blocks issuance
    Blocked(String),
    /// Preconditions hold; attempt issuance for these domains
    Attempt { domains: Vec<String> },
}

/// Pure decision core of the state machine
pub fn evaluate(
    state: CertState,
    primary_ready: bool,
    www_ready: bool,
    web_listening: bool,
    config: &ProvisionConfig,
) -> Evaluation {
    if state == CertState::Issued {
        return Evaluation::AlreadyIssued;
    }

    if !primary_ready {
        return Evaluation::Blocked(format!("DNS not ready for {}", config.domain));
    }

    if !web_listening {
        return Evaluation::Blocked("web server not listening on port 80".to_string());
    }

    let mut domains = vec![config.domain.clone()];
    if www_ready {
        domains.push(config.www_domain.clone());
    }

    Evaluation::Attempt { domains }
}

/// Install the certbot client through the snap channel
pub async fn install_client() -> Result<(), ProvisionError> {
    run_checked("snap", &["install", "core"]).await?;
    run_checked("snap", &["refresh", "core"]).await?;
    run_checked("snap", &["install", "--classic", "certbot"]).await?;
    run_checked("ln", &["-sf", "/snap/bin/certbot", "/usr/bin/certbot"]).await?;

    info!("Certificate client installed");
    Ok(())
}

/// Whether anything is accepting connections on the local web port
pub async fn web_listening() -> bool {
    probe(WEB_PROBE_ADDR).await
}

/// TCP probe with a short timeout, address injectable for tests
pub async fn probe(addr: &str) -> bool {
    tokio::time::timeout(Duration::from_secs(3), TcpStream::connect(addr))
        .await
        .is_ok_and(|r| r.is_ok())
}

/// Invoke certbot non-interactively for the given domain set
async fn issue(email: &str, domains: &[String]) -> Result<(), ProvisionError> {
    let mut args: Vec<&str> = vec![
        "--nginx",
        "-n",
        "--agree-tos",
        "--redirect",
        "--no-eff-email",
        "-m",
        email,
    ];
    for domain in domains {
        args.push("-d");
        args.push(domain);
    }

    run_checked("certbot", &args)
        .await
        .map_err(|e| ProvisionError::Certificate(e.to_string()))
}

/// One full evaluation pass of the state machine
///
/// Returns the resulting state. A blocked evaluation or a failed issuance
/// attempt surfaces as an error so the timer-invoked entry point exits
/// non-zero and the timer fires again later.
pub async fn run_once(
    config: &ProvisionConfig,
    paths: &ProvisionPaths,
    echo: &PublicIpClient,
) -> Result<CertState, ProvisionError> {
    let state = load_cert_state(paths).await?;
    if state == CertState::Issued {
        info!("Certificate already issued; nothing to do");
        return Ok(CertState::Issued);
    }

    let public_ip = match echo.fetch().await {
        Ok(addr) => Some(addr),
        Err(e) => {
            warn!("Could not determine public address: {}", e);
            None
        }
    };

    let decision = evaluate(
        state,
        dns::is_ready(&config.domain, public_ip).await,
        dns::is_ready(&config.www_domain, public_ip).await,
        web_listening().await,
        config,
    );

    attempt(decision, config, paths).await
}

/// Act on an evaluation: issue, record, and disarm on success
pub async fn attempt(
    decision: Evaluation,
    config: &ProvisionConfig,
    paths: &ProvisionPaths,
) -> Result<CertState, ProvisionError> {
    match decision {
        Evaluation::AlreadyIssued => Ok(CertState::Issued),
        Evaluation::Blocked(reason) => {
            info!("Certificate issuance blocked: {}", reason);
            Err(ProvisionError::Certificate(reason))
        }
        Evaluation::Attempt { domains } => {
            info!("Attempting certificate issuance for {:?}", domains);
            issue(&config.admin_email, &domains).await?;

            store_cert_state(paths, CertState::Issued).await?;
            scheduler::disarm(paths).await?;

            info!("Certificate issued for {:?}; retry timer disarmed", domains);
            Ok(CertState::Issued)
        }
    }
}
