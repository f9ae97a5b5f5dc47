//! Anti-corruption layer over `corev1::Node`.

use super::{is_private, AddressKind, NodeView};
use crate::error::NoPublicIp;
use k8s_openapi::api::core::v1::{Node, Taint};
use std::net::IpAddr;
use tracing::debug;

const UNSCHEDULABLE_TAINT: &str = "node.kubernetes.io/unschedulable";
const CONTROL_PLANE_TAINTS: [&str; 2] = [
    "node-role.kubernetes.io/control-plane",
    "node-role.kubernetes.io/master",
];

/// Live view over a watched Kubernetes node.
#[derive(Debug, Clone)]
pub struct KubeNode {
    name: String,
    node: Node,
}

impl KubeNode {
    /// Wraps a node object. Returns `None` for objects without a name, which
    /// the API server never produces but a malformed event could.
    pub fn new(node: Node) -> Option<Self> {
        let name = node.metadata.name.clone().filter(|n| !n.is_empty())?;
        Some(Self { name, node })
    }

    fn taints(&self) -> impl Iterator<Item = &Taint> + '_ {
        self.node
            .spec
            .as_ref()
            .and_then(|s| s.taints.as_ref())
            .into_iter()
            .flatten()
    }

    /// First parseable non-private address of the given kind, in the order the
    /// kubelet reported them.
    fn first_public(&self, kind: AddressKind) -> Result<IpAddr, NoPublicIp> {
        let addresses = self
            .node
            .status
            .as_ref()
            .and_then(|s| s.addresses.as_ref())
            .into_iter()
            .flatten()
            .filter(|a| a.type_ == kind.as_str());

        for addr in addresses {
            let ip: IpAddr = match addr.address.parse() {
                Ok(ip) => ip,
                Err(_) => {
                    debug!(
                        node = %self.name,
                        kind = kind.as_str(),
                        addr = %addr.address,
                        "Ignoring unparsable node address"
                    );
                    continue;
                }
            };
            if !is_private(&ip) {
                return Ok(ip);
            }
        }
        Err(NoPublicIp)
    }
}

impl NodeView for KubeNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        self.node
            .status
            .as_ref()
            .and_then(|s| s.conditions.as_ref())
            .into_iter()
            .flatten()
            .any(|c| c.type_ == "Ready" && c.status == "True")
    }

    fn is_schedulable(&self) -> bool {
        let cordoned = self
            .node
            .spec
            .as_ref()
            .and_then(|s| s.unschedulable)
            .unwrap_or(false);
        !cordoned
            && !self
                .taints()
                .any(|t| t.key == UNSCHEDULABLE_TAINT && t.effect == "NoSchedule")
    }

    fn is_control_plane_schedulable(&self) -> bool {
        !self.taints().any(|t| {
            CONTROL_PLANE_TAINTS.contains(&t.key.as_str())
                && (t.effect == "NoSchedule" || t.effect == "NoExecute")
        })
    }

    fn public_ip(&self) -> Result<IpAddr, NoPublicIp> {
        self.first_public(AddressKind::External)
            .or_else(|_| self.first_public(AddressKind::Internal))
    }
}
