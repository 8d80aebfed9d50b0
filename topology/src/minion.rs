// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Minion workflow: CNI integration plus the node's management port.

use crate::{mgmt_port, TopologyError};
use config::ClusterConfig;
use ipnet::Ipv4Net;
use nb::{Nb, NbTransport};
use netcfg::cni::{self, NetConf};
use netcfg::LocalNetConfigurator;
use std::path::PathBuf;
use tracing::info;

/// Where the CNI plugin and its descriptor should land on this node.
#[derive(Debug, Clone)]
pub struct CniInstall {
    /// Plugin binary to link from.
    pub plugin_source: PathBuf,
    /// Directory the plugin is linked into.
    pub plugin_dir: PathBuf,
    /// Directory the network descriptor is written into.
    pub conf_dir: PathBuf,
}

/// One-shot minion initialization.
#[derive(Debug)]
pub struct MinionInit<'a, T, C: ?Sized> {
    nb: &'a Nb<T>,
    netcfg: &'a C,
    cluster: &'a ClusterConfig,
    node_subnet: Ipv4Net,
    cni: Option<CniInstall>,
}

impl<'a, T, C> MinionInit<'a, T, C>
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
        cni: Option<CniInstall>,
    ) -> Self {
        MinionInit {
            nb,
            netcfg,
            cluster,
            node_subnet,
            cni,
        }
    }

    /// Run the workflow to completion or first failure.
    pub fn run(&self) -> Result<(), TopologyError> {
        if let Some(install) = &self.cni {
            cni::install_plugin(&install.plugin_source, &install.plugin_dir)?;
            let conf = NetConf::for_node(&self.cluster.integration_bridge, self.node_subnet);
            cni::write_netconf(&install.conf_dir, &conf)?;
        }
        mgmt_port::provision(self.nb, self.netcfg, self.cluster, self.node_subnet)?;
        info!("minion topology for {} complete", self.cluster.node_name);
        Ok(())
    }
}
