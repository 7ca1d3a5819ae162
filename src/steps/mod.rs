//! Provisioning steps
//!
//! Each step handles one aspect of first-boot provisioning. Steps are
//! executed in a fixed order by the pipeline and report their outcome
//! explicitly instead of aborting the run.

pub mod certbot;
pub mod firewall;
pub mod packages;
pub mod users;
pub mod webserver;

use crate::ProvisionError;

/// Run a command, treating a non-zero exit as an error
pub(crate) async fn run_checked(cmd: &str, args: &[&str]) -> Result<(), ProvisionError> {
    let output = tokio::process::Command::new(cmd)
        .args(args)
        .output()
        .await
        .map_err(|e| ProvisionError::Command(format!("{cmd}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProvisionError::Command(format!(
            "{} {} exited with status {}: {}",
            cmd,
            args.join(" "),
            output.status.code().unwrap_or(-1),
            stderr.trim()
        )));
    }

    Ok(())
}

/// Check if a command exists on the PATH
pub(crate) async fn command_exists(cmd: &str) -> bool {
    tokio::process::Command::new("which")
        .arg(cmd)
        .output()
        .await
        .is_ok_and(|o| o.status.success())
}
