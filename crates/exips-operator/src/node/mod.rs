//! Node views
//!
//! Read-only capability set over a single observed cluster node. The live
//! implementation wraps the Kubernetes `Node` object; the static one is built
//! from explicit fields and lets the registry, policy and reconciler run
//! without a cluster.

mod fixture;
mod live;

pub use self::fixture::StaticNode;
pub use self::live::KubeNode;

use crate::error::NoPublicIp;
use std::fmt::Debug;
use std::net::{IpAddr, Ipv6Addr};

/// A snapshot of one node. Implementations are immutable; a changed node is
/// represented by a new value.
pub trait NodeView: Debug + Send + Sync {
    /// Stable, non-empty node name.
    fn name(&self) -> &str;

    /// True only when the latest `Ready` condition is explicitly `True`.
    fn is_ready(&self) -> bool;

    /// False when the node is cordoned.
    fn is_schedulable(&self) -> bool;

    /// False when a control-plane `NoSchedule` taint is present. Always true
    /// for workers.
    fn is_control_plane_schedulable(&self) -> bool;

    /// First non-private external IP, falling back to the first non-private
    /// internal IP.
    fn public_ip(&self) -> Result<IpAddr, NoPublicIp>;
}

/// Kind of a reported node address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    External,
    Internal,
}

impl AddressKind {
    /// Value of the `type` field in `NodeStatus.addresses`.
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressKind::External => "ExternalIP",
            AddressKind::Internal => "InternalIP",
        }
    }
}

/// RFC 1918 for IPv4 and `fc00::/7` for IPv6. IPv4-mapped IPv6 addresses
/// are classified by their IPv4 form. Loopback and link-local addresses are
/// not considered private.
pub fn is_private(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private(),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.is_private(),
            None => is_unique_local(v6),
        },
    }
}

fn is_unique_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xfe00) == 0xfc00
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_ranges() {
        for ip in [
            "10.0.0.5",
            "172.16.0.1",
            "172.31.255.255",
            "192.168.1.9",
            "fd00::1",
            "fc00::1",
            "::ffff:10.0.0.5",
            "::ffff:192.168.1.9",
        ] {
            let ip: IpAddr = ip.parse().unwrap();
            assert!(is_private(&ip), "{ip} should be private");
        }
    }

    #[test]
    fn test_public_ranges() {
        for ip in ["198.51.100.7", "172.32.0.1", "8.8.8.8", "2001:db8::1", "fe00::1", "::ffff:198.51.100.7"] {
            let ip: IpAddr = ip.parse().unwrap();
            assert!(!is_private(&ip), "{ip} should not be private");
        }
    }

    #[test]
    fn test_loopback_and_link_local_are_not_private() {
        for ip in ["127.0.0.1", "169.254.1.1", "::1", "fe80::1"] {
            let ip: IpAddr = ip.parse().unwrap();
            assert!(!is_private(&ip));
        }
    }

    #[test]
    fn test_address_kind_wire_names() {
        assert_eq!(AddressKind::External.as_str(), "ExternalIP");
        assert_eq!(AddressKind::Internal.as_str(), "InternalIP");
    }
}
