//! Fetcher: download the current initializer payload and run it
//!
//! Runs once at boot. A download failure is fatal; a failure of the payload
//! itself is logged, not escalated. The temporary payload is removed after
//! execution regardless of outcome.

use std::time::Duration;

use reqwest::Client;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::ProvisionError;
use crate::state::ProvisionPaths;

/// Download the payload from `url`, execute it, and clean up
pub async fn run(url: &str, paths: &ProvisionPaths) -> Result<(), ProvisionError> {
    let payload_path = paths.payload();

    download(url, paths).await?;

    let result = execute(paths).await;

    // Remove the payload whether or not execution succeeded
    if let Err(e) = fs::remove_file(&payload_path).await {
        warn!("Failed to remove payload {}: {}", payload_path.display(), e);
    }

    result
}

/// Fetch the payload over HTTPS and mark it executable
async fn download(url: &str, paths: &ProvisionPaths) -> Result<(), ProvisionError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(60))
        .build()?;

    info!("Downloading initializer payload from {}", url);

    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(ProvisionError::Http(format!(
            "payload download returned {}",
            response.status()
        )));
    }

    let body = response.bytes().await?;

    let payload_path = paths.payload();
    if let Some(parent) = payload_path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(&payload_path, &body).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&payload_path, std::fs::Permissions::from_mode(0o755)).await?;
    }

    info!(
        "Payload written to {} ({} bytes)",
        payload_path.display(),
        body.len()
    );
    Ok(())
}

/// Run the payload, appending its combined output to the provisioning log
async fn execute(paths: &ProvisionPaths) -> Result<(), ProvisionError> {
    let payload_path = paths.payload();

    info!("Executing payload {}", payload_path.display());

    let output = tokio::process::Command::new(&payload_path)
        .output()
        .await
        .map_err(|e| ProvisionError::Command(e.to_string()))?;

    append_to_log(paths, &output.stdout).await?;
    append_to_log(paths, &output.stderr).await?;

    // Payload failures are recorded, not escalated
    if output.status.success() {
        info!("Payload completed successfully");
    } else {
        warn!(
            "Payload exited with status {}",
            output.status.code().unwrap_or(-1)
        );
    }

    Ok(())
}

async fn append_to_log(paths: &ProvisionPaths, data: &[u8]) -> Result<(), ProvisionError> {
    if data.is_empty() {
        return Ok(());
    }

    if let Some(parent) = paths.log_file.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.log_file)
        .await?;
    file.write_all(data).await?;

    Ok(())
}
