//! Administrative account provisioning
//!
//! Creates the non-root account, grants passwordless sudo through a
//! validated sudoers drop-in, and installs the instance's registered SSH
//! public keys as the account's authorized credentials.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

use super::command_exists;
use crate::ProvisionError;
use crate::config::ProvisionConfig;
use crate::metadata::MetadataSource;
use crate::state::ProvisionPaths;

/// Create the account, grant sudo, and install SSH keys
pub async fn provision(
    config: &ProvisionConfig,
    paths: &ProvisionPaths,
    metadata: &dyn MetadataSource,
) -> Result<(), ProvisionError> {
    create_user(&config.username).await?;
    write_sudoers_entry(paths, &config.username).await?;

    // Metadata-endpoint absence is tolerated; the account still exists
    match metadata.public_keys().await {
        Ok(keys) if keys.is_empty() => {
            warn!("No public keys registered for this instance");
        }
        Ok(keys) => {
            let home = user_home(&config.username).await;
            install_authorized_keys(&home, &keys).await?;
            chown_recursive(&home.join(".ssh"), &config.username).await;
            info!("Installed {} authorized keys for {}", keys.len(), config.username);
        }
        Err(e) => {
            warn!("Could not fetch public keys from metadata service: {}", e);
        }
    }

    Ok(())
}

/// Create the account with a home directory; "already exists" is fine
async fn create_user(username: &str) -> Result<(), ProvisionError> {
    info!("Creating user: {}", username);

    let output = tokio::process::Command::new("useradd")
        .args(["--create-home", "--shell", "/bin/bash", username])
        .output()
        .await
        .map_err(|e| ProvisionError::Command(e.to_string()))?;

    // Exit code 9 means the user already exists
    if !output.status.success() && output.status.code() != Some(9) {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProvisionError::UserGroup(format!(
            "failed to create user {username}: {stderr}"
        )));
    }

    Ok(())
}

/// Write a NOPASSWD sudoers drop-in for the account
///
/// The entry is validated with visudo when available; an invalid file is
/// removed rather than left to lock root out of sudo.
pub async fn write_sudoers_entry(
    paths: &ProvisionPaths,
    username: &str,
) -> Result<(), ProvisionError> {
    fs::create_dir_all(&paths.sudoers).await?;

    let sudoers_file = paths.sudoers.join(format!("90-provision-{username}"));
    let content = format!("{username} ALL=(ALL) NOPASSWD:ALL\n");
    fs::write(&sudoers_file, &content).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&sudoers_file, std::fs::Permissions::from_mode(0o440)).await?;
    }

    if command_exists("visudo").await {
        let output = tokio::process::Command::new("visudo")
            .args(["-c", "-f", &sudoers_file.to_string_lossy()])
            .output()
            .await
            .map_err(|e| ProvisionError::Command(e.to_string()))?;

        if !output.status.success() {
            let _ = fs::remove_file(&sudoers_file).await;
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProvisionError::UserGroup(format!(
                "invalid sudoers entry for {username}: {stderr}"
            )));
        }
    } else {
        warn!("visudo not available; sudoers entry written unvalidated");
    }

    debug!("Wrote sudoers entry {}", sudoers_file.display());
    Ok(())
}

/// Write `authorized_keys` under `home/.ssh` with restrictive permissions
pub async fn install_authorized_keys(
    home: &Path,
    keys: &[String],
) -> Result<(), ProvisionError> {
    let ssh_dir = home.join(".ssh");
    let authorized_keys = ssh_dir.join("authorized_keys");

    fs::create_dir_all(&ssh_dir).await?;

    let content = keys.join("\n") + "\n";
    fs::write(&authorized_keys, &content).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&ssh_dir, std::fs::Permissions::from_mode(0o700)).await?;
        fs::set_permissions(&authorized_keys, std::fs::Permissions::from_mode(0o600)).await?;
    }

    Ok(())
}

/// Resolve the account's home directory from /etc/passwd
async fn user_home(username: &str) -> PathBuf {
    if let Ok(passwd) = fs::read_to_string("/etc/passwd").await {
        for line in passwd.lines() {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() >= 6 && fields[0] == username {
                return PathBuf::from(fields[5]);
            }
        }
    }

    PathBuf::from(format!("/home/{username}"))
}

/// Chown best-effort; ownership failures are logged, not fatal
async fn chown_recursive(path: &Path, username: &str) {
    let result = tokio::process::Command::new("chown")
        .args(["-R", username, &path.to_string_lossy()])
        .output()
        .await;

    match result {
        Ok(output) if !output.status.success() => {
            debug!(
                "Failed to chown {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Err(e) => debug!("Failed to run chown: {}", e),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_install_authorized_keys_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let keys = vec![
            "ssh-ed25519 AAAA alice@host".to_string(),
            "ssh-rsa BBBB bob@host".to_string(),
        ];

        install_authorized_keys(temp.path(), &keys).await.unwrap();

        let ssh_dir = temp.path().join(".ssh");
        let file = ssh_dir.join("authorized_keys");

        let content = std::fs::read_to_string(&file).unwrap();
        assert_eq!(content, "ssh-ed25519 AAAA alice@host\nssh-rsa BBBB bob@host\n");

        let dir_mode = std::fs::metadata(&ssh_dir).unwrap().permissions().mode();
        let file_mode = std::fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o700);
        assert_eq!(file_mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_write_sudoers_entry_content() {
        let temp = TempDir::new().unwrap();
        let paths = ProvisionPaths::with_base(temp.path());

        write_sudoers_entry(&paths, "deploy").await.unwrap();

        let file = paths.sudoers.join("90-provision-deploy");
        let content = std::fs::read_to_string(&file).unwrap();
        assert_eq!(content, "deploy ALL=(ALL) NOPASSWD:ALL\n");
    }
}
