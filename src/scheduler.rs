//! Retry-task scheduling via systemd timer units
//!
//! The certificate-bootstrap retry task is driven by an external timer:
//! first fire ~2 minutes after arming, then every ~10 minutes, persisted
//! across reboots. The armed/disarmed state is modelled explicitly and the
//! operations are idempotent, so repeated arming or disarming is a no-op.

use tokio::fs;
use tracing::{debug, info, warn};

use crate::ProvisionError;
use crate::state::ProvisionPaths;

/// Base name of the retry-task unit pair
pub const UNIT_NAME: &str = "provision-cert";

/// Timer state as seen on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Armed,
    Disarmed,
}

/// Render the one-shot service unit invoked by the timer
pub fn service_unit() -> String {
    "[Unit]\n\
     Description=Certificate bootstrap retry\n\
     After=network-online.target\n\
     \n\
     [Service]\n\
     Type=oneshot\n\
     ExecStart=/usr/bin/provision-rs cert-retry\n"
        .to_string()
}

/// Render the recurring timer unit
pub fn timer_unit() -> String {
    "[Unit]\n\
     Description=Certificate bootstrap retry schedule\n\
     \n\
     [Timer]\n\
     OnActiveSec=2min\n\
     OnUnitActiveSec=10min\n\
     Persistent=true\n\
     \n\
     [Install]\n\
     WantedBy=timers.target\n"
        .to_string()
}

/// Write the service and timer unit files
pub async fn write_units(paths: &ProvisionPaths) -> Result<(), ProvisionError> {
    fs::create_dir_all(&paths.systemd).await?;

    let service_path = paths.systemd.join(format!("{UNIT_NAME}.service"));
    let timer_path = paths.systemd.join(format!("{UNIT_NAME}.timer"));

    fs::write(&service_path, service_unit()).await?;
    fs::write(&timer_path, timer_unit()).await?;

    debug!("Wrote retry-task units to {}", paths.systemd.display());
    Ok(())
}

/// Remove the unit files if present
pub async fn remove_units(paths: &ProvisionPaths) -> Result<(), ProvisionError> {
    for name in [format!("{UNIT_NAME}.service"), format!("{UNIT_NAME}.timer")] {
        let path = paths.systemd.join(name);
        if path.exists() {
            fs::remove_file(&path).await?;
        }
    }
    Ok(())
}

/// Timer state derived from the presence of the timer unit file
pub fn timer_state(paths: &ProvisionPaths) -> TimerState {
    if paths.systemd.join(format!("{UNIT_NAME}.timer")).exists() {
        TimerState::Armed
    } else {
        TimerState::Disarmed
    }
}

/// Arm the retry timer: write units, reload systemd, enable the timer
///
/// Safe to call when already armed; systemd treats re-enabling as a no-op.
pub async fn arm(paths: &ProvisionPaths) -> Result<(), ProvisionError> {
    write_units(paths).await?;

    systemctl(&["daemon-reload"]).await?;
    systemctl(&["enable", "--now", &format!("{UNIT_NAME}.timer")]).await?;

    info!("Retry timer armed");
    Ok(())
}

/// Disarm the retry timer and remove the unit files
///
/// Safe to call when already disarmed.
pub async fn disarm(paths: &ProvisionPaths) -> Result<(), ProvisionError> {
    if timer_state(paths) == TimerState::Disarmed {
        debug!("Retry timer already disarmed");
        return Ok(());
    }

    // Disabling an already-disabled unit is harmless; log, don't fail
    if let Err(e) = systemctl(&["disable", "--now", &format!("{UNIT_NAME}.timer")]).await {
        warn!("Failed to disable retry timer: {}", e);
    }

    remove_units(paths).await?;
    systemctl(&["daemon-reload"]).await?;

    info!("Retry timer disarmed");
    Ok(())
}

async fn systemctl(args: &[&str]) -> Result<(), ProvisionError> {
    let output = tokio::process::Command::new("systemctl")
        .args(args)
        .output()
        .await
        .map_err(|e| ProvisionError::Command(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProvisionError::Scheduler(format!(
            "systemctl {} failed: {}",
            args.join(" "),
            stderr
        )));
    }

    Ok(())
}
