//! DNS-readiness predicate
//!
//! A domain is "ready" when its resolved A record equals the instance's
//! currently observed public address. Resolution goes through the system
//! resolver via tokio's `lookup_host`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tokio::net::lookup_host;
use tracing::debug;

/// Resolve the first IPv4 A record for a name, `None` if it does not resolve
pub async fn resolve_ipv4(name: &str) -> Option<Ipv4Addr> {
    let addrs = lookup_host((name, 80)).await.ok()?;

    let ipv4 = addrs
        .filter_map(|addr| match addr {
            SocketAddr::V4(v4) => Some(*v4.ip()),
            SocketAddr::V6(_) => None,
        })
        .next();

    debug!("Resolved {} -> {:?}", name, ipv4);
    ipv4
}

/// Core of the readiness predicate: both sides present and equal
pub fn addresses_match(resolved: Option<Ipv4Addr>, public: Option<Ipv4Addr>) -> bool {
    match (resolved, public) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Whether `name` currently resolves to `public_ip`
pub async fn is_ready(name: &str, public_ip: Option<Ipv4Addr>) -> bool {
    let resolved = resolve_ipv4(name).await;
    let ready = addresses_match(resolved, public_ip);
    debug!(
        "DNS readiness for {}: resolved={:?} public={:?} ready={}",
        name, resolved, public_ip, ready
    );
    ready
}

/// Parse an address-echo response body into an IPv4 address
pub fn parse_echo_body(body: &str) -> Option<Ipv4Addr> {
    match body.trim().parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => Some(v4),
        _ => None,
    }
}
