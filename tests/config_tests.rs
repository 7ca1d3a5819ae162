//! Integration tests for configuration loading

use provision_rs::ProvisionError;
use provision_rs::config::{ConfigLoader, DEFAULT_USERNAME};
use tempfile::TempDir;

async fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.yaml");
    tokio::fs::write(&path, content).await.unwrap();
    path
}

/// Missing domain aborts before anything else can run
#[tokio::test]
async fn test_missing_domain_is_fatal() {
    let temp = TempDir::new().unwrap();
    let path = write_config(&temp, "admin_email: a@example.com\n").await;

    let result = ConfigLoader::new().with_path(&path).skip_env().load().await;
    match result {
        Err(ProvisionError::Config(msg)) => assert!(msg.contains("domain")),
        other => panic!("expected config error, got {other:?}"),
    }
}

/// Missing admin contact aborts; there is no derived default
#[tokio::test]
async fn test_missing_admin_email_is_fatal() {
    let temp = TempDir::new().unwrap();
    let path = write_config(&temp, "domain: example.com\n").await;

    let result = ConfigLoader::new().with_path(&path).skip_env().load().await;
    match result {
        Err(ProvisionError::Config(msg)) => assert!(msg.contains("admin_email")),
        other => panic!("expected config error, got {other:?}"),
    }
}

/// The alternate domain defaults to www. + primary
#[tokio::test]
async fn test_www_domain_default() {
    let temp = TempDir::new().unwrap();
    let path = write_config(&temp, "domain: example.com\nadmin_email: a@example.com\n").await;

    let config = ConfigLoader::new()
        .with_path(&path)
        .skip_env()
        .load()
        .await
        .unwrap();

    assert_eq!(config.www_domain, "www.example.com");
    assert_eq!(config.username, DEFAULT_USERNAME);
    assert!(config.api_token.is_none());
    assert!(!config.wants_floating_ip());
}

/// Explicit values win over defaults
#[tokio::test]
async fn test_explicit_values() {
    let temp = TempDir::new().unwrap();
    let path = write_config(
        &temp,
        "domain: example.com\n\
         www_domain: web.example.com\n\
         admin_email: ops@example.com\n\
         username: deploy\n\
         api_token: tok\n\
         floating_ip: 203.0.113.7\n",
    )
    .await;

    let config = ConfigLoader::new()
        .with_path(&path)
        .skip_env()
        .load()
        .await
        .unwrap();

    assert_eq!(config.www_domain, "web.example.com");
    assert_eq!(config.username, "deploy");
    assert!(config.wants_floating_ip());
}

/// Unknown keys in the config file are ignored rather than fatal
#[tokio::test]
async fn test_unknown_keys_ignored() {
    let temp = TempDir::new().unwrap();
    let path = write_config(
        &temp,
        "domain: example.com\nadmin_email: a@example.com\nlegacy_flag: true\n",
    )
    .await;

    let config = ConfigLoader::new()
        .with_path(&path)
        .skip_env()
        .load()
        .await
        .unwrap();

    assert_eq!(config.domain, "example.com");
}
