// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Master workflow: cluster-wide singletons plus the master's own
//! management port.

use crate::{mgmt_port, names, stable_port_mac, TopologyError};
use config::ClusterConfig;
use ipam::DISTRIBUTED_ROUTER_JOIN_IP;
use ipnet::Ipv4Net;
use nb::{Clause, Nb, NbTable, NbTransport};
use netcfg::LocalNetConfigurator;
use tracing::info;

/// One-shot master initialization.
#[derive(Debug)]
pub struct MasterInit<'a, T, C: ?Sized> {
    nb: &'a Nb<T>,
    netcfg: &'a C,
    cluster: &'a ClusterConfig,
    node_subnet: Ipv4Net,
}

impl<'a, T, C> MasterInit<'a, T, C>
where
    T: NbTransport,
    C: LocalNetConfigurator + ?Sized,
{
    /// Workflow over the given collaborators.
    #[must_use]
    pub fn new(
        nb: &'a Nb<T>,
        netcfg: &'a C,
        cluster: &'a ClusterConfig,
        node_subnet: Ipv4Net,
    ) -> Self {
        MasterInit {
            nb,
            netcfg,
            cluster,
            node_subnet,
        }
    }

    /// Run the workflow to completion or first failure.
    pub fn run(&self) -> Result<(), TopologyError> {
        let router = self.ensure_cluster_router()?;
        self.ensure_cluster_lbs()?;
        self.ensure_join_switch(&router)?;
        mgmt_port::provision(self.nb, self.netcfg, self.cluster, self.node_subnet)?;
        info!("master topology for {} complete", self.cluster.node_name);
        Ok(())
    }

    /// The distributed router, created on first run, located by tag
    /// thereafter.
    fn ensure_cluster_router(&self) -> Result<String, TopologyError> {
        let found = self.nb.find_uuid(
            NbTable::LogicalRouter,
            vec![Clause::eq(names::TAG_CLUSTER_ROUTER, "yes")],
        )?;
        if let Some(uuid) = found {
            return Ok(uuid);
        }
        let uuid = self.nb.create(
            NbTable::LogicalRouter,
            &[
                ("name", &self.cluster.router_name),
                (names::TAG_CLUSTER_ROUTER, "yes"),
            ],
        )?;
        info!("created distributed router {}", self.cluster.router_name);
        Ok(uuid)
    }

    /// The two cluster-wide east-west load balancers.
    fn ensure_cluster_lbs(&self) -> Result<(), TopologyError> {
        for (tag, protocol) in [(names::TAG_LB_TCP, "tcp"), (names::TAG_LB_UDP, "udp")] {
            let found = self
                .nb
                .find_uuid(NbTable::LoadBalancer, vec![Clause::eq(tag, "yes")])?;
            if found.is_none() {
                self.nb
                    .create(NbTable::LoadBalancer, &[(tag, "yes"), ("protocol", protocol)])?;
                info!("created east-west {protocol} load balancer");
            }
        }
        Ok(())
    }

    /// The join switch and the distributed router's port on it, at the
    /// fixed first usable join address.
    fn ensure_join_switch(&self, router: &str) -> Result<(), TopologyError> {
        self.nb.ls_add(names::JOIN_SWITCH)?;
        self.nb.set(
            NbTable::LogicalSwitch,
            names::JOIN_SWITCH,
            &[("other-config:subnet", &ipam::join_subnet().to_string())],
        )?;

        let rtoj = names::rtoj(&self.cluster.router_name);
        let mac = stable_port_mac(self.nb, &rtoj)?;
        let network = format!(
            "{DISTRIBUTED_ROUTER_JOIN_IP}/{}",
            ipam::join_subnet().prefix_len()
        );
        self.nb.lrp_add(router, &rtoj, mac, &network)?;
        self.nb.set(
            NbTable::LogicalRouterPort,
            &rtoj,
            &[(names::TAG_CONNECT_TO_JOIN, "yes")],
        )?;

        let jtor = names::jtor(&self.cluster.router_name);
        self.nb.lsp_add(names::JOIN_SWITCH, &jtor)?;
        self.nb.set(
            NbTable::LogicalSwitchPort,
            &jtor,
            &[("type", "router"), ("options:router-port", &rtoj)],
        )?;
        self.nb.lsp_set_addresses(&jtor, &["router".to_string()])?;
        Ok(())
    }
}
