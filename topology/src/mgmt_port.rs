// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-node management-port provisioning.
//!
//! Shared by the master and minion workflows: attaches a node's
//! private subnet to the distributed router and gives the node's OS a
//! host-facing port into the overlay. Each step is an idempotent
//! upsert; any failure aborts the call and re-running converges.

use crate::{find_cluster_router, names, stable_port_mac, TopologyError};
use config::ClusterConfig;
use ipnet::Ipv4Net;
use nb::{Clause, Nb, NbTable, NbTransport};
use netcfg::LocalNetConfigurator;
use tracing::info;

/// Attach the east-west load balancers to a node switch.
fn attach_cluster_lbs<T: NbTransport>(nb: &Nb<T>, switch: &str) -> Result<(), TopologyError> {
    let tcp = nb
        .find_uuid(NbTable::LoadBalancer, vec![Clause::eq(names::TAG_LB_TCP, "yes")])?
        .ok_or(TopologyError::Discovery("east-west tcp load balancer"))?;
    let udp = nb
        .find_uuid(NbTable::LoadBalancer, vec![Clause::eq(names::TAG_LB_UDP, "yes")])?
        .ok_or(TopologyError::Discovery("east-west udp load balancer"))?;
    // set-then-add: converges to exactly {tcp, udp} on every run
    nb.set(NbTable::LogicalSwitch, switch, &[("load_balancer", &tcp)])?;
    nb.add(NbTable::LogicalSwitch, switch, "load_balancer", &udp)?;
    Ok(())
}

/// Build the node switch, its router uplink and its host-facing port,
/// then hand the OS side to the local-network configurator.
pub(crate) fn provision<T, C>(
    nb: &Nb<T>,
    netcfg: &C,
    cluster: &ClusterConfig,
    node_subnet: Ipv4Net,
) -> Result<(), TopologyError>
where
    T: NbTransport,
    C: LocalNetConfigurator + ?Sized,
{
    let node = cluster.node_name.as_str();
    let router = find_cluster_router(nb)?;
    let (router_ip, host_ip) = ipam::subnet_endpoints(node_subnet)?;
    let router_net = Ipv4Net::new(router_ip, node_subnet.prefix_len())
        .unwrap_or_else(|_| unreachable!());
    let host_net =
        Ipv4Net::new(host_ip, node_subnet.prefix_len()).unwrap_or_else(|_| unreachable!());

    let rtos = names::rtos(node);
    let router_mac = stable_port_mac(nb, &rtos)?;
    nb.lrp_add(&router, &rtos, router_mac, &router_net.to_string())?;

    nb.ls_add(node)?;
    nb.set(
        NbTable::LogicalSwitch,
        node,
        &[
            ("other-config:subnet", &node_subnet.to_string()),
            ("external_ids:gateway_ip", &router_net.to_string()),
        ],
    )?;

    let stor = names::stor(node);
    nb.lsp_add(node, &stor)?;
    nb.set(
        NbTable::LogicalSwitchPort,
        &stor,
        &[("type", "router"), ("options:router-port", &rtos)],
    )?;
    nb.lsp_set_addresses(&stor, &[router_mac.to_string()])?;

    let port = names::mgmt_port(node);
    let host_mac = netcfg.ensure_port(&cluster.integration_bridge, &port)?;
    nb.lsp_add(node, &port)?;
    nb.lsp_set_addresses(&port, &[format!("{host_mac} {host_ip}")])?;
    netcfg.configure(&port, host_net, cluster.cluster_subnet, router_ip)?;

    attach_cluster_lbs(nb, node)?;
    info!("management port for {node} provisioned on {node_subnet}");
    Ok(())
}
