//! provision-rs - first-boot provisioning agent
//!
//! Subcommands map to the provisioning roles:
//! - `fetch`: download the current initializer payload and run it
//! - `init`: run the initializer pipeline directly
//! - `cert-retry`: one evaluation of the certificate retry task (invoked
//!   by the systemd timer)
//! - `status`: show completion marker, certificate and timer state

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use provision_rs::scheduler::{self, TimerState};
use provision_rs::state::{self, ProvisionPaths};
use provision_rs::{ProvisionError, run_cert_retry, run_fetch, run_init};

#[derive(Parser)]
#[command(name = "provision-rs")]
#[command(author, version, about = "First-boot provisioning agent", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the initializer payload from a URL and execute it
    Fetch {
        /// HTTPS URL of the initializer payload
        url: String,
    },
    /// Run the initializer pipeline
    Init,
    /// Evaluate the certificate retry task once
    CertRetry,
    /// Show provisioning status
    Status,
}

fn init_logging(verbosity: u8, paths: &ProvisionPaths) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact();

    // Append-only provisioning log; best-effort when the path is unwritable
    let file_layer = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.log_file)
        .ok()
        .map(|file| {
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Arc::new(file))
        });

    tracing_subscriber::registry()
        .with(tracing_subscriber::filter::LevelFilter::from_level(level))
        .with(console)
        .with(file_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), ProvisionError> {
    let cli = Cli::parse();
    let paths = ProvisionPaths::new();
    init_logging(cli.verbose, &paths);

    match cli.command {
        Commands::Fetch { url } => {
            info!("Fetching initializer payload");
            run_fetch(&url, &paths).await?;
        }
        Commands::Init => {
            info!("Running initializer pipeline");
            let report = run_init(paths).await?;
            if report.failed() {
                return Err(ProvisionError::step("init", "run aborted on hard failure"));
            }
        }
        Commands::CertRetry => {
            run_cert_retry(paths).await?;
        }
        Commands::Status => {
            print_status(&paths).await?;
        }
    }

    Ok(())
}

async fn print_status(paths: &ProvisionPaths) -> Result<(), ProvisionError> {
    let provisioned = state::is_provisioned(paths);
    let cert = state::load_cert_state(paths).await?;
    let timer = scheduler::timer_state(paths);

    println!("provisioned:  {}", if provisioned { "yes" } else { "no" });
    println!("certificate:  {cert}");
    println!(
        "retry timer:  {}",
        match timer {
            TimerState::Armed => "armed",
            TimerState::Disarmed => "disarmed",
        }
    );

    Ok(())
}
