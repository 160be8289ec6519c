//! Textual bind-address resolution.
//!
//! Turns what an operator types into an [`IpAddr`] the listener can bind:
//!
//! | Input                      | Result             |
//! |----------------------------|--------------------|
//! | `0.0.0.0`, `*`             | IPv4 any           |
//! | `::`                       | IPv6 any           |
//! | `::1`                      | IPv6 loopback      |
//! | `127.0.0.1`, `localhost`   | IPv4 loopback      |
//! | other literal IP           | itself, if local   |
//! | anything else              | `None`             |
//!
//! "Local" means the address is assigned to one of this host's interfaces,
//! which is checked by binding a throw-away UDP socket to it on port 0.
//! Only called while building configuration, never per connection.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use socket2::{Domain, Protocol, Socket, Type};

/// Resolves `address` to a bindable IP, or `None` when it is not usable here.
pub fn resolve_bind_address(address: &str) -> Option<IpAddr> {
    match address.trim() {
        "0.0.0.0" | "*" => Some(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
        "::" => Some(IpAddr::V6(Ipv6Addr::UNSPECIFIED)),
        "::1" => Some(IpAddr::V6(Ipv6Addr::LOCALHOST)),
        "127.0.0.1" | "localhost" => Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        other => {
            let ip: IpAddr = other.parse().ok()?;
            is_local_address(ip).then_some(ip)
        }
    }
}

/// `true` when a socket can be bound to `ip`, i.e. the address belongs to
/// this host.
pub fn is_local_address(ip: IpAddr) -> bool {
    if ip.is_unspecified() {
        return true;
    }
    let domain = match ip {
        IpAddr::V4(_) => Domain::IPV4,
        IpAddr::V6(_) => Domain::IPV6,
    };
    let Ok(socket) = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP)) else {
        return false;
    };
    socket.bind(&SocketAddr::new(ip, 0).into()).is_ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_forms() {
        assert_eq!(
            resolve_bind_address("0.0.0.0"),
            Some(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
        );
        assert_eq!(
            resolve_bind_address("::"),
            Some(IpAddr::V6(Ipv6Addr::UNSPECIFIED))
        );
        assert_eq!(
            resolve_bind_address("::1"),
            Some(IpAddr::V6(Ipv6Addr::LOCALHOST))
        );
        assert_eq!(
            resolve_bind_address("localhost"),
            Some(IpAddr::V4(Ipv4Addr::LOCALHOST))
        );
        assert_eq!(
            resolve_bind_address("127.0.0.1"),
            Some(IpAddr::V4(Ipv4Addr::LOCALHOST))
        );
    }

    #[test]
    fn test_wildcard_binds_ipv4_any() {
        assert_eq!(
            resolve_bind_address("*"),
            Some(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
        );
    }

    #[test]
    fn test_garbage_is_not_found() {
        assert_eq!(resolve_bind_address("not-an-address"), None);
        assert_eq!(resolve_bind_address(""), None);
    }

    #[test]
    fn test_foreign_address_is_not_found() {
        // TEST-NET-3 is reserved for documentation and never assigned locally.
        assert_eq!(resolve_bind_address("203.0.113.77"), None);
    }

    #[test]
    fn test_loopback_literal_outside_shortcuts_is_local() {
        // 127.0.0.2 is routed to lo on Linux but not on every platform.
        #[cfg(target_os = "linux")]
        assert!(is_local_address("127.0.0.2".parse().unwrap()));
    }
}
