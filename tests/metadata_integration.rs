//! Integration tests for the HTTP-facing clients using wiremock

use std::time::Duration;

use provision_rs::metadata::{InstanceMetadataService, MetadataSource};
use provision_rs::net::floating_ip::wait_for_address_with;
use provision_rs::net::{FloatingIpClient, PublicIpClient};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Instance id comes back trimmed
#[tokio::test]
async fn test_metadata_instance_id() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/metadata/v1/id"))
        .respond_with(ResponseTemplate::new(200).set_body_string("12345678\n"))
        .mount(&server)
        .await;

    let metadata = InstanceMetadataService::with_base_url(server.uri()).unwrap();
    assert_eq!(metadata.instance_id().await.unwrap(), "12345678");
}

/// Public keys are returned one per line, blanks dropped
#[tokio::test]
async fn test_metadata_public_keys() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/metadata/v1/public-keys"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("ssh-ed25519 AAAA a@h\n\nssh-rsa BBBB b@h\n"),
        )
        .mount(&server)
        .await;

    let metadata = InstanceMetadataService::with_base_url(server.uri()).unwrap();
    let keys = metadata.public_keys().await.unwrap();
    assert_eq!(keys.len(), 2);
    assert_eq!(keys[0], "ssh-ed25519 AAAA a@h");
}

/// Metadata endpoint errors surface as errors, not panics
#[tokio::test]
async fn test_metadata_endpoint_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/metadata/v1/id"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let metadata = InstanceMetadataService::with_base_url(server.uri()).unwrap();
    assert!(metadata.instance_id().await.is_err());
}

/// Address echo returns the observed IPv4 as plain text
#[tokio::test]
async fn test_public_ip_echo() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("203.0.113.7\n"))
        .mount(&server)
        .await;

    let echo = PublicIpClient::with_url(server.uri()).unwrap();
    assert_eq!(echo.fetch().await.unwrap().to_string(), "203.0.113.7");
}

/// A non-address body is rejected
#[tokio::test]
async fn test_public_ip_echo_garbage_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>error</html>"))
        .mount(&server)
        .await;

    let echo = PublicIpClient::with_url(server.uri()).unwrap();
    assert!(echo.fetch().await.is_err());
}

/// Floating-address assignment posts the assign action with the token
#[tokio::test]
async fn test_floating_ip_assign() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/floating_ips/203.0.113.7/actions"))
        .and(header("authorization", "Bearer tok-123"))
        .and(body_partial_json(
            serde_json::json!({"type": "assign", "droplet_id": 12345678}),
        ))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "action": { "id": 1, "status": "in-progress" }
        })))
        .mount(&server)
        .await;

    let client = FloatingIpClient::with_base_url(server.uri(), "tok-123").unwrap();
    client.assign("203.0.113.7", 12345678).await.unwrap();
}

/// Control-plane rejection is an error the pipeline treats as soft
#[tokio::test]
async fn test_floating_ip_assign_unauthorized() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/floating_ips/203.0.113.7/actions"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = FloatingIpClient::with_base_url(server.uri(), "bad-token").unwrap();
    assert!(client.assign("203.0.113.7", 12345678).await.is_err());
}

/// Polling succeeds as soon as the echo reports the target address
#[tokio::test]
async fn test_wait_for_address_match() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("203.0.113.7\n"))
        .mount(&server)
        .await;

    let echo = PublicIpClient::with_url(server.uri()).unwrap();
    wait_for_address_with(&echo, "203.0.113.7".parse().unwrap(), 3, Duration::from_millis(10))
        .await
        .unwrap();
}

/// Exhausting the polling budget returns a timeout
#[tokio::test]
async fn test_wait_for_address_budget_exhausted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("198.51.100.1\n"))
        .mount(&server)
        .await;

    let echo = PublicIpClient::with_url(server.uri()).unwrap();
    let result = wait_for_address_with(
        &echo,
        "203.0.113.7".parse().unwrap(),
        3,
        Duration::from_millis(10),
    )
    .await;

    assert!(result.is_err());
}
