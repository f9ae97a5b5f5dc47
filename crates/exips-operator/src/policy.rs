//! Eligibility and address policy.

use crate::node::NodeView;
use std::net::IpAddr;
use std::ops::Deref;

/// A node takes traffic when it is ready, not cordoned, and not a tainted
/// control plane.
pub fn is_eligible<N: NodeView + ?Sized>(node: &N) -> bool {
    node.is_ready() && node.is_schedulable() && node.is_control_plane_schedulable()
}

/// Public IPs of all eligible nodes. The output keeps the order of `nodes`,
/// which is name-ascending when taken from `Registry::list`. Eligible nodes
/// without a public IP are skipped.
pub fn external_ips<N>(nodes: &[N]) -> Vec<IpAddr>
where
    N: Deref,
    N::Target: NodeView,
{
    nodes
        .iter()
        .map(|n| &**n)
        .filter(|n| is_eligible(*n))
        .filter_map(|n| n.public_ip().ok())
        .collect()
}
