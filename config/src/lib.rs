// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Configuration passed into the provisioning workflows.
//!
//! Workflows never read process-wide state; everything they need
//! arrives in these structs, validated up front. Validation failures
//! surface before any store mutation happens.

#![deny(clippy::all, clippy::pedantic)]
#![forbid(unsafe_code)]

use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// Default name of the cluster-wide distributed router.
pub const DEFAULT_ROUTER_NAME: &str = "cluster-router";

/// Name of the local integration bridge every node port attaches to.
pub const INTEGRATION_BRIDGE: &str = "br-int";

/// The reasons a configuration may be rejected.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Gateway interface selection is an exclusive-or.
    #[error("exactly one of a physical interface and a bridge interface must be supplied")]
    InterfaceExclusive,
    /// A mandatory parameter is missing.
    #[error("missing mandatory parameter: {0}")]
    MissingParameter(&'static str),
    /// The node name cannot be used to derive entity names.
    #[error("invalid node name: {0}")]
    InvalidNodeName(String),
}

/// Cluster-wide settings shared by every workflow.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// The cluster-wide container subnet.
    pub cluster_subnet: Ipv4Net,
    /// This node's name; entity names derive from it.
    pub node_name: String,
    /// Name given to the distributed router when first created.
    pub router_name: String,
    /// Local integration bridge name.
    pub integration_bridge: String,
}

impl ClusterConfig {
    /// Cluster configuration with default router and bridge names.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidNodeName`] for empty or whitespace-bearing
    /// node names.
    pub fn new(cluster_subnet: Ipv4Net, node_name: &str) -> Result<Self, ConfigError> {
        if node_name.is_empty() || node_name.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidNodeName(node_name.to_string()));
        }
        Ok(ClusterConfig {
            cluster_subnet,
            node_name: node_name.to_string(),
            router_name: DEFAULT_ROUTER_NAME.to_string(),
            integration_bridge: INTEGRATION_BRIDGE.to_string(),
        })
    }
}

/// How a gateway node reaches the physical network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayInterface {
    /// A dedicated physical interface, attached to the integration
    /// bridge directly.
    Physical(String),
    /// An existing bridge, connected via a patch-port pair.
    Bridge(String),
}

/// Gateway-role settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Physical interface name, exclusive with `bridge_interface`.
    pub physical_interface: Option<String>,
    /// Bridge interface name, exclusive with `physical_interface`.
    pub bridge_interface: Option<String>,
    /// The gateway's address on the physical network, CIDR notation.
    pub physical_ip: Ipv4Net,
    /// Next hop for the gateway's default route, when one exists.
    pub default_gateway: Option<Ipv4Addr>,
    /// Source subnets whose egress should ramp out through this
    /// gateway; kept raw, parsed (and possibly skipped) at use site.
    pub rampout_subnets: Vec<String>,
}

impl GatewayConfig {
    /// Resolve the interface selection, enforcing the exclusive-or.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InterfaceExclusive`] when both or neither
    /// interface option is present.
    pub fn interface(&self) -> Result<GatewayInterface, ConfigError> {
        match (&self.physical_interface, &self.bridge_interface) {
            (Some(phys), None) => Ok(GatewayInterface::Physical(phys.clone())),
            (None, Some(bridge)) => Ok(GatewayInterface::Bridge(bridge.clone())),
            _ => Err(ConfigError::InterfaceExclusive),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn gateway(phys: Option<&str>, bridge: Option<&str>) -> GatewayConfig {
        GatewayConfig {
            physical_interface: phys.map(str::to_string),
            bridge_interface: bridge.map(str::to_string),
            physical_ip: "192.168.1.5/24".parse().unwrap(),
            default_gateway: None,
            rampout_subnets: vec![],
        }
    }

    #[test]
    fn interface_selection_is_exclusive() {
        assert_eq!(
            gateway(Some("eth1"), Some("br-ex")).interface(),
            Err(ConfigError::InterfaceExclusive)
        );
        assert_eq!(
            gateway(None, None).interface(),
            Err(ConfigError::InterfaceExclusive)
        );
        assert_eq!(
            gateway(Some("eth1"), None).interface(),
            Ok(GatewayInterface::Physical("eth1".to_string()))
        );
        assert_eq!(
            gateway(None, Some("br-ex")).interface(),
            Ok(GatewayInterface::Bridge("br-ex".to_string()))
        );
    }

    #[test]
    fn node_names_are_validated() {
        let subnet = "10.0.0.0/14".parse().unwrap();
        assert!(ClusterConfig::new(subnet, "m1").is_ok());
        assert!(ClusterConfig::new(subnet, "").is_err());
        assert!(ClusterConfig::new(subnet, "bad name").is_err());
    }
}
