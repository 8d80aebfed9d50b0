// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Entity names and tag selectors.
//!
//! Every name the workflows create or look up derives from a node or
//! router name through these functions, and every tag-based lookup
//! uses one of these selectors. Port names encode direction: `rtos-`
//! and `stor-` pair a router with a node switch, `rtoj-` and `jtor-`
//! pair it with the join switch, `rtoe-` and `etor-` with an external
//! switch.

/// Tag marking the one cluster-wide distributed router.
pub const TAG_CLUSTER_ROUTER: &str = "external_ids:cluster-router";

/// Tag of the cluster-wide east-west TCP load balancer.
pub const TAG_LB_TCP: &str = "external_ids:cluster-lb-tcp";

/// Tag of the cluster-wide east-west UDP load balancer.
pub const TAG_LB_UDP: &str = "external_ids:cluster-lb-udp";

/// Tag on every router port attached to the join switch; its networks
/// column is what the join-address scan reads.
pub const TAG_CONNECT_TO_JOIN: &str = "external_ids:connect-to-join";

/// Tag recording a gateway router's address on the physical network.
pub const TAG_PHYSICAL_IP: &str = "external_ids:physical-ip";

/// Tag recording whether a gateway router was the first one bound to
/// a chassis. Metadata only.
pub const TAG_FIRST_GATEWAY: &str = "external_ids:first-gateway";

/// Tag on the router port carrying a gateway's physical address.
pub const TAG_GATEWAY_PHYSICAL_IP: &str = "external_ids:gateway-physical-ip";

/// Name of the switch interconnecting the distributed router with the
/// gateway routers.
pub const JOIN_SWITCH: &str = "join";

/// The gateway router of a node.
#[must_use]
pub fn gateway_router(node: &str) -> String {
    format!("GR_{node}")
}

/// The external switch of a gateway node.
#[must_use]
pub fn external_switch(node: &str) -> String {
    format!("ext_{node}")
}

/// The host-facing management port of a node.
#[must_use]
pub fn mgmt_port(node: &str) -> String {
    format!("k8s-{node}")
}

/// Router side of the router / node-switch pair.
#[must_use]
pub fn rtos(node: &str) -> String {
    format!("rtos-{node}")
}

/// Switch side of the router / node-switch pair.
#[must_use]
pub fn stor(node: &str) -> String {
    format!("stor-{node}")
}

/// Router side of the router / join-switch pair.
#[must_use]
pub fn rtoj(router: &str) -> String {
    format!("rtoj-{router}")
}

/// Join-switch side of the router / join-switch pair.
#[must_use]
pub fn jtor(router: &str) -> String {
    format!("jtor-{router}")
}

/// Router side of the router / external-switch pair.
#[must_use]
pub fn rtoe(router: &str) -> String {
    format!("rtoe-{router}")
}

/// External-switch side of the router / external-switch pair.
#[must_use]
pub fn etor(router: &str) -> String {
    format!("etor-{router}")
}

/// The learning port binding a physical interface or provider bridge
/// into a gateway's external switch.
#[must_use]
pub fn external_port(interface: &str, node: &str) -> String {
    format!("{interface}_{node}")
}

/// Tag scoping a north-south load balancer to one gateway router.
#[must_use]
pub fn gateway_lb_tag(protocol: &str) -> String {
    format!("external_ids:{protocol}-lb-gateway-router")
}
