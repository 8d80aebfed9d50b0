// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Gateway workflow: a per-node gateway router with external
//! connectivity, NAT and north-south load balancing.

use crate::joinip::{self, JoinPort};
use crate::{find_cluster_router, names, stable_port_mac, TopologyError};
use config::{ClusterConfig, GatewayConfig, GatewayInterface};
use ipam::{Mac, DISTRIBUTED_ROUTER_JOIN_IP, GATEWAY_DEFAULT_JOIN_IP};
use ipnet::Ipv4Net;
use nb::{Clause, Nb, NbTable, NbTransport};
use netcfg::LocalNetConfigurator;
use tracing::{info, warn};
use vswitch::{Vs, VsTransport};

/// One-shot gateway initialization.
#[derive(Debug)]
pub struct GatewayInit<'a, T, V, C: ?Sized> {
    nb: &'a Nb<T>,
    vs: &'a Vs<V>,
    netcfg: &'a C,
    cluster: &'a ClusterConfig,
    gateway: &'a GatewayConfig,
}

impl<'a, T, V, C> GatewayInit<'a, T, V, C>
where
    T: NbTransport,
    V: VsTransport,
    C: LocalNetConfigurator + ?Sized,
{
    /// Workflow over the given collaborators.
    #[must_use]
    pub fn new(
        nb: &'a Nb<T>,
        vs: &'a Vs<V>,
        netcfg: &'a C,
        cluster: &'a ClusterConfig,
        gateway: &'a GatewayConfig,
    ) -> Self {
        GatewayInit {
            nb,
            vs,
            netcfg,
            cluster,
            gateway,
        }
    }

    /// Run the workflow to completion or first failure.
    ///
    /// Validation and discovery come first so that a rejected
    /// invocation mutates nothing.
    pub fn run(&self) -> Result<(), TopologyError> {
        let interface = self.gateway.interface()?;
        let chassis = self
            .vs
            .chassis_id()?
            .ok_or(TopologyError::Discovery("chassis identity"))?;
        let cluster_router = find_cluster_router(self.nb)?;

        let gr = names::gateway_router(&self.cluster.node_name);
        self.ensure_gateway_router(&gr, &chassis)?;
        let join = self.ensure_join_port(&gr)?;
        self.ensure_cluster_routes(&gr, &cluster_router)?;
        self.ensure_gateway_lbs(&gr)?;

        let ext_switch = names::external_switch(&self.cluster.node_name);
        self.nb.ls_add(&ext_switch)?;
        let external_mac = self.bind_external_interface(&interface, &ext_switch)?;
        self.ensure_external_ports(&gr, &ext_switch, external_mac, &interface)?;

        self.nb.lr_nat_add_snat(
            &gr,
            self.gateway.physical_ip.addr(),
            &self.cluster.cluster_subnet.to_string(),
        )?;

        if join.newly_allocated {
            self.bind_rampout(&gr, &cluster_router, join)?;
        }
        info!("gateway topology for {} complete", self.cluster.node_name);
        Ok(())
    }

    /// The gateway router, bound to the local chassis. The
    /// first-gateway flag is computed before creation and recorded
    /// only then, so re-runs do not flip it.
    fn ensure_gateway_router(&self, gr: &str, chassis: &str) -> Result<(), TopologyError> {
        let first_gateway = self
            .nb
            .find_uuid(
                NbTable::LogicalRouter,
                vec![Clause::not_empty("options:chassis")],
            )?
            .is_none();
        let exists = self
            .nb
            .find_uuid(NbTable::LogicalRouter, vec![Clause::eq("name", gr)])?
            .is_some();
        self.nb.lr_add(gr)?;
        self.nb.set(
            NbTable::LogicalRouter,
            gr,
            &[
                ("options:chassis", chassis),
                (
                    names::TAG_PHYSICAL_IP,
                    &self.gateway.physical_ip.addr().to_string(),
                ),
            ],
        )?;
        if !exists {
            let flag = if first_gateway { "yes" } else { "no" };
            self.nb
                .set(NbTable::LogicalRouter, gr, &[(names::TAG_FIRST_GATEWAY, flag)])?;
            info!("created gateway router {gr} on chassis {chassis} (first: {flag})");
        }
        Ok(())
    }

    /// The gateway's port on the join switch and its mirror port.
    fn ensure_join_port(&self, gr: &str) -> Result<JoinPort, TopologyError> {
        let join = joinip::resolve_join_port(self.nb, gr)?;
        let rtoj = names::rtoj(gr);
        let network = format!("{}/{}", join.ip, ipam::join_subnet().prefix_len());
        self.nb.lrp_add(gr, &rtoj, join.mac, &network)?;
        self.nb.set(
            NbTable::LogicalRouterPort,
            &rtoj,
            &[(names::TAG_CONNECT_TO_JOIN, "yes")],
        )?;

        let jtor = names::jtor(gr);
        self.nb.lsp_add(names::JOIN_SWITCH, &jtor)?;
        self.nb.set(
            NbTable::LogicalSwitchPort,
            &jtor,
            &[("type", "router"), ("options:router-port", &rtoj)],
        )?;
        self.nb.lsp_set_addresses(&jtor, &["router".to_string()])?;
        Ok(join)
    }

    /// East-west reachability: cluster traffic from the gateway goes
    /// to the distributed router; the distributed router's default
    /// points at the conventional first-gateway join address.
    fn ensure_cluster_routes(&self, gr: &str, cluster_router: &str) -> Result<(), TopologyError> {
        self.nb.lr_route_add(
            gr,
            &self.cluster.cluster_subnet.to_string(),
            DISTRIBUTED_ROUTER_JOIN_IP,
            None,
        )?;
        self.nb
            .lr_route_add(cluster_router, "0.0.0.0/0", GATEWAY_DEFAULT_JOIN_IP, None)?;
        Ok(())
    }

    /// This gateway's north-south load balancers, scoped by a tag
    /// carrying the router's name.
    fn ensure_gateway_lbs(&self, gr: &str) -> Result<(), TopologyError> {
        let mut uuids = Vec::with_capacity(2);
        for protocol in ["tcp", "udp"] {
            let tag = names::gateway_lb_tag(protocol);
            let found = self
                .nb
                .find_uuid(NbTable::LoadBalancer, vec![Clause::eq(&tag, gr)])?;
            let uuid = if let Some(uuid) = found {
                uuid
            } else {
                self.nb
                    .create(NbTable::LoadBalancer, &[(&tag, gr), ("protocol", protocol)])?
            };
            uuids.push(uuid);
        }
        self.nb
            .set(NbTable::LogicalRouter, gr, &[("load_balancer", &uuids[0])])?;
        self.nb
            .add(NbTable::LogicalRouter, gr, "load_balancer", &uuids[1])?;
        Ok(())
    }

    /// Bind the physical side: either a dedicated interface attached
    /// straight to the integration bridge, or a provider bridge linked
    /// in with a patch-port pair. Answers the MAC the external router
    /// port will carry.
    fn bind_external_interface(
        &self,
        interface: &GatewayInterface,
        ext_switch: &str,
    ) -> Result<Mac, TopologyError> {
        let port_id = self.external_port_name(interface);
        match interface {
            GatewayInterface::Physical(iface) => {
                let mac =
                    self.vs
                        .attach_physical(&self.cluster.integration_bridge, iface, &port_id)?;
                // addressing moves to the gateway router
                self.netcfg.flush_addresses(iface)?;
                Ok(mac)
            }
            GatewayInterface::Bridge(bridge) => {
                // pin first: adding the patch port may change the
                // bridge's own MAC otherwise
                let mac = self.vs.pin_bridge_mac(bridge)?;
                self.vs
                    .connect_via_patch(bridge, &self.cluster.integration_bridge, &port_id)?;
                Ok(mac)
            }
        }
        .map(|mac| {
            info!("external interface for {ext_switch} has mac {mac}");
            mac
        })
    }

    /// External switch ports and the gateway's external router port.
    fn ensure_external_ports(
        &self,
        gr: &str,
        ext_switch: &str,
        external_mac: Mac,
        interface: &GatewayInterface,
    ) -> Result<(), TopologyError> {
        let learning_port = self.external_port_name(interface);
        self.nb.lsp_add(ext_switch, &learning_port)?;
        self.nb
            .lsp_set_addresses(&learning_port, &["unknown".to_string()])?;

        let rtoe = names::rtoe(gr);
        self.nb
            .lrp_add(gr, &rtoe, external_mac, &self.gateway.physical_ip.to_string())?;
        self.nb.set(
            NbTable::LogicalRouterPort,
            &rtoe,
            &[(names::TAG_GATEWAY_PHYSICAL_IP, "yes")],
        )?;

        if let Some(next_hop) = self.gateway.default_gateway {
            self.nb.lr_route_add(gr, "0.0.0.0/0", next_hop, Some(&rtoe))?;
        }

        let etor = names::etor(gr);
        self.nb.lsp_add(ext_switch, &etor)?;
        self.nb.set(
            NbTable::LogicalSwitchPort,
            &etor,
            &[("type", "router"), ("options:router-port", &rtoe)],
        )?;
        self.nb.lsp_set_addresses(&etor, &["router".to_string()])?;
        Ok(())
    }

    /// Pin load-balanced return traffic to this gateway and install
    /// the caller's rampout routes. Only runs when the join address
    /// was allocated by this invocation.
    fn bind_rampout(
        &self,
        gr: &str,
        cluster_router: &str,
        join: JoinPort,
    ) -> Result<(), TopologyError> {
        self.nb.set(
            NbTable::LogicalRouter,
            gr,
            &[("options:lb_force_snat_ip", &join.ip.to_string())],
        )?;
        for raw in &self.gateway.rampout_subnets {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            match raw.parse::<Ipv4Net>() {
                Ok(subnet) => {
                    self.nb
                        .lr_route_add_src(cluster_router, &subnet.to_string(), join.ip)?;
                }
                Err(_) => warn!("skipping unparsable rampout subnet {raw:?}"),
            }
        }
        Ok(())
    }

    fn external_port_name(&self, interface: &GatewayInterface) -> String {
        let iface = match interface {
            GatewayInterface::Physical(name) | GatewayInterface::Bridge(name) => name,
        };
        names::external_port(iface, &self.cluster.node_name)
    }
}
