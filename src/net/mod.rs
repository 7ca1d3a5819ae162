//! Network-facing helpers
//!
//! DNS-readiness checking, the public address echo client, and the
//! control-plane floating-address attachment.

pub mod dns;
pub mod floating_ip;
pub mod public_ip;

pub use dns::{addresses_match, resolve_ipv4};
pub use floating_ip::FloatingIpClient;
pub use public_ip::PublicIpClient;
