//! Connection admission control
//!
//! A peer is admitted iff its hostname exactly matches one entry of the
//! allow-list given at startup. Refused peers get no state and must reconnect.

use std::net::SocketAddr;

use tracing::info;

/// Result of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow,
    Refuse,
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allow)
    }
}

/// Static hostname allow-list
#[derive(Debug, Clone, Default)]
pub struct AccessControl {
    allowed_hosts: Vec<String>,
    admitted: u64,
    refused: u64,
}

impl AccessControl {
    pub fn new(allowed_hosts: Vec<String>) -> Self {
        Self {
            allowed_hosts,
            admitted: 0,
            refused: 0,
        }
    }

    /// Check a peer hostname against the allow-list and log the decision
    pub fn admit(&mut self, peer_hostname: &str) -> Admission {
        if self.allowed_hosts.iter().any(|h| h == peer_hostname) {
            self.admitted += 1;
            info!("Accepted connection from {}.", peer_hostname);
            Admission::Allow
        } else {
            self.refused += 1;
            info!("Refused connection from {}.", peer_hostname);
            Admission::Refuse
        }
    }

    pub fn allowed_hosts(&self) -> &[String] {
        &self.allowed_hosts
    }

    /// Number of peers admitted so far
    pub fn admitted(&self) -> u64 {
        self.admitted
    }

    /// Number of peers refused so far
    pub fn refused(&self) -> u64 {
        self.refused
    }
}

/// Hostname a peer is matched under
///
/// Peers are identified by the textual form of their address, so the
/// allow-list holds addresses such as `127.0.0.1` or `::1`.
pub fn peer_hostname(addr: &SocketAddr) -> String {
    addr.ip().to_string()
}
