//! Node view built from explicit fields.

use super::NodeView;
use crate::error::NoPublicIp;
use std::net::IpAddr;

/// A node that is not backed by a cluster object. Defaults to a ready,
/// schedulable worker without a public IP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticNode {
    name: String,
    ready: bool,
    schedulable: bool,
    control_plane_schedulable: bool,
    public_ip: Option<IpAddr>,
}

impl StaticNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ready: true,
            schedulable: true,
            control_plane_schedulable: true,
            public_ip: None,
        }
    }

    pub fn ready(mut self, ready: bool) -> Self {
        self.ready = ready;
        self
    }

    pub fn schedulable(mut self, schedulable: bool) -> Self {
        self.schedulable = schedulable;
        self
    }

    pub fn control_plane_schedulable(mut self, allowed: bool) -> Self {
        self.control_plane_schedulable = allowed;
        self
    }

    pub fn with_public_ip(mut self, ip: IpAddr) -> Self {
        self.public_ip = Some(ip);
        self
    }
}

impl NodeView for StaticNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn is_schedulable(&self) -> bool {
        self.schedulable
    }

    fn is_control_plane_schedulable(&self) -> bool {
        self.control_plane_schedulable
    }

    fn public_ip(&self) -> Result<IpAddr, NoPublicIp> {
        self.public_ip.ok_or(NoPublicIp)
    }
}
