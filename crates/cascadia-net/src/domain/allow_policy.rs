//! Remote-address admission policy.
//!
//! A connection is admitted when any of these holds:
//!
//! 1. the configured set contains the wildcard `"*"`;
//! 2. the peer is a loopback address (`127.0.0.0/8` or `::1`);
//! 3. the peer's textual address is literally present in the set.
//!
//! Dual-stack listeners report IPv4 peers as IPv4-mapped IPv6 addresses
//! (`::ffff:10.0.0.5`).  Those are unwrapped before rules 2 and 3 so an
//! allow-list written with plain IPv4 addresses keeps working.

use std::collections::HashSet;
use std::net::IpAddr;

/// The literal that allows every remote address.
pub const WILDCARD: &str = "*";

/// Decides whether a remote address may connect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowPolicy {
    allow_all: bool,
    addresses: HashSet<String>,
}

impl AllowPolicy {
    /// Builds a policy from textual addresses.  Surrounding whitespace is ignored.
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let addresses: HashSet<String> = addresses
            .into_iter()
            .map(|a| a.into().trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        Self {
            allow_all: addresses.contains(WILDCARD),
            addresses,
        }
    }

    /// A policy that admits every peer.
    pub fn allow_all() -> Self {
        Self::new([WILDCARD])
    }

    /// Returns `true` when the wildcard is configured.
    pub fn allows_everyone(&self) -> bool {
        self.allow_all
    }

    /// Applies the three admission rules to `remote`.
    pub fn is_allowed(&self, remote: IpAddr) -> bool {
        if self.allow_all {
            return true;
        }

        let canonical = canonical(remote);
        if canonical.is_loopback() {
            return true;
        }

        self.addresses.contains(&canonical.to_string())
            || self.addresses.contains(&remote.to_string())
    }
}

/// Unwraps IPv4-mapped IPv6 addresses to plain IPv4.
fn canonical(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
