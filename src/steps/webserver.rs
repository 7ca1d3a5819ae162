//! Web server installation and site deployment
//!
//! Installs nginx, deploys the static landing page, renders the per-domain
//! port-80 virtual host (the certificate tool validates domain ownership
//! against it), restarts the server, and smoke-tests it locally.
//!
//! Only the nginx package install is a hard failure; the certificate flow
//! is useless without the server present at all. Site deployment and the
//! enable/restart commands are best-effort like every other step.

use std::time::Duration;

use reqwest::Client;
use tokio::fs;
use tracing::{debug, info, warn};

use super::{packages, run_checked};
use crate::ProvisionError;
use crate::config::ProvisionConfig;
use crate::state::ProvisionPaths;
use crate::template::{LANDING_MARKER, render_landing_page, render_vhost};

/// Install the nginx package
pub async fn install() -> Result<(), ProvisionError> {
    packages::install_package("nginx").await
}

/// Deploy the site and restart the server
///
/// Failures here are reported for the caller to record as soft outcomes;
/// a host with nginx installed but a broken restart is still worth
/// finishing provisioning on.
pub async fn configure(
    config: &ProvisionConfig,
    paths: &ProvisionPaths,
) -> Result<(), ProvisionError> {
    deploy_site(config, paths).await?;

    run_checked("systemctl", &["enable", "--now", "nginx"]).await?;
    run_checked("systemctl", &["restart", "nginx"]).await?;

    info!("Web server configured for {}", config.domain);
    Ok(())
}

/// Write the landing page and virtual host, enable the vhost, disable the
/// distribution default site
///
/// Pure filesystem work, separated from the install/restart commands so it
/// can be exercised in tests.
pub async fn deploy_site(
    config: &ProvisionConfig,
    paths: &ProvisionPaths,
) -> Result<(), ProvisionError> {
    let site_root = paths.site_root(&config.domain);
    fs::create_dir_all(&site_root).await?;

    let page = render_landing_page(&config.domain)?;
    fs::write(site_root.join("index.html"), page).await?;

    let vhost = render_vhost(
        &config.domain,
        &config.www_domain,
        &site_root.to_string_lossy(),
    )?;
    let available = paths.vhost_available(&config.domain);
    if let Some(parent) = available.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(&available, vhost).await?;

    let enabled = paths.vhost_enabled(&config.domain);
    if let Some(parent) = enabled.parent() {
        fs::create_dir_all(parent).await?;
    }
    if !enabled.exists() {
        #[cfg(unix)]
        fs::symlink(&available, &enabled).await?;
    }

    // The default site would shadow server_name matching for the new vhost
    let default_site = paths.default_site_enabled();
    if default_site.exists() {
        fs::remove_file(&default_site).await?;
        debug!("Disabled distribution default site");
    }

    Ok(())
}

/// Fetch the landing page from the local server and check the marker text
pub async fn smoke_test(base_url: &str) -> Result<(), ProvisionError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let response = client.get(base_url).send().await?;
    if !response.status().is_success() {
        return Err(ProvisionError::Http(format!(
            "local fetch returned {}",
            response.status()
        )));
    }

    let body = response.text().await?;
    if !body.contains(LANDING_MARKER) {
        return Err(ProvisionError::Step {
            step: "webserver".to_string(),
            message: "landing page marker not found in local response".to_string(),
        });
    }

    info!("Web server smoke test passed");
    Ok(())
}

/// Run the smoke test against localhost, logging the result
pub async fn smoke_test_localhost() -> Result<(), ProvisionError> {
    match smoke_test("http://127.0.0.1/").await {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!("Web server smoke test failed: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawConfig;
    use tempfile::TempDir;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> ProvisionConfig {
        RawConfig {
            domain: Some("example.com".to_string()),
            admin_email: Some("a@example.com".to_string()),
            ..Default::default()
        }
        .validate()
        .unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_deploy_site_layout() {
        let temp = TempDir::new().unwrap();
        let paths = ProvisionPaths::with_base(temp.path());
        let config = test_config();

        deploy_site(&config, &paths).await.unwrap();

        let index = paths.site_root("example.com").join("index.html");
        let page = fs::read_to_string(&index).await.unwrap();
        assert!(page.contains(LANDING_MARKER));

        let vhost = fs::read_to_string(paths.vhost_available("example.com"))
            .await
            .unwrap();
        assert!(vhost.contains("server_name example.com www.example.com;"));
        assert!(paths.vhost_enabled("example.com").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_deploy_site_disables_default_site() {
        let temp = TempDir::new().unwrap();
        let paths = ProvisionPaths::with_base(temp.path());
        let config = test_config();

        fs::create_dir_all(paths.nginx.join("sites-enabled"))
            .await
            .unwrap();
        fs::write(paths.default_site_enabled(), "default vhost")
            .await
            .unwrap();

        deploy_site(&config, &paths).await.unwrap();
        assert!(!paths.default_site_enabled().exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_deploy_site_rerun_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let paths = ProvisionPaths::with_base(temp.path());
        let config = test_config();

        deploy_site(&config, &paths).await.unwrap();
        deploy_site(&config, &paths).await.unwrap();
        assert!(paths.vhost_enabled("example.com").exists());
    }

    #[tokio::test]
    async fn test_smoke_test_marker_present() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(format!("<html><p>{LANDING_MARKER}</p></html>")),
            )
            .mount(&server)
            .await;

        smoke_test(&server.uri()).await.unwrap();
    }

    #[tokio::test]
    async fn test_smoke_test_marker_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>welcome</html>"))
            .mount(&server)
            .await;

        assert!(smoke_test(&server.uri()).await.is_err());
    }
}
