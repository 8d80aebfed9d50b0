// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Command-line surface of `overlay-init`.
//!
//! Parsing stops at syntax; semantic validation (the physical/bridge
//! exclusive-or, node-name rules) lives in the config structs so a
//! rejected invocation reports the same error whether it came from the
//! command line or from another caller.

#![deny(clippy::all, clippy::pedantic)]
#![forbid(unsafe_code)]

pub use clap::Parser;
use clap::{Args, Subcommand};
use config::{ClusterConfig, ConfigError, GatewayConfig};
use ipnet::Ipv4Net;
use nb::TlsConfig;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use topology::CniInstall;

/// Default directory CNI plugin binaries are linked into.
const DEFAULT_CNI_PLUGIN_DIR: &str = "/opt/cni/bin";

#[derive(Debug, Parser)]
#[command(name = "overlay-init")]
#[command(version)]
#[command(
    about = "Provision the overlay-network topology for a cluster node",
    long_about = None
)]
pub struct CmdArgs {
    /// Role workflow to run.
    #[command(subcommand)]
    pub role: RoleCommand,

    /// Northbound store address (e.g. `ssl:10.0.0.1:6641`); local
    /// connection when omitted.
    #[arg(long, value_name = "ADDRESS", global = true)]
    nb_address: Option<String>,

    /// Client private key for the store connection.
    #[arg(long, value_name = "FILE", global = true, requires = "nb_cert")]
    nb_privkey: Option<PathBuf>,

    /// Client certificate for the store connection.
    #[arg(long, value_name = "FILE", global = true, requires = "nb_cacert")]
    nb_cert: Option<PathBuf>,

    /// CA certificate for the store connection.
    #[arg(long, value_name = "FILE", global = true, requires = "nb_privkey")]
    nb_cacert: Option<PathBuf>,
}

impl CmdArgs {
    /// Store address, when a remote one was given.
    #[must_use]
    pub fn nb_address(&self) -> Option<&str> {
        self.nb_address.as_deref()
    }

    /// TLS material for the store connection, when supplied. The three
    /// files come as a package; clap enforces that.
    #[must_use]
    pub fn nb_tls(&self) -> Option<TlsConfig> {
        match (&self.nb_privkey, &self.nb_cert, &self.nb_cacert) {
            (Some(private_key), Some(certificate), Some(ca_cert)) => Some(TlsConfig {
                private_key: private_key.clone(),
                certificate: certificate.clone(),
                ca_cert: ca_cert.clone(),
            }),
            _ => None,
        }
    }
}

/// The role workflows.
#[derive(Debug, Subcommand)]
pub enum RoleCommand {
    /// Establish the cluster-wide topology and the master's own subnet.
    MasterInit(MasterArgs),
    /// Attach a worker node's subnet to the cluster topology.
    MinionInit(MinionArgs),
    /// Stand up this node's gateway router with external connectivity.
    GatewayInit(GatewayArgs),
}

/// Flags shared by every role.
#[derive(Debug, Args)]
pub struct CommonArgs {
    /// Cluster-wide container subnet, CIDR notation.
    #[arg(long, value_name = "CIDR")]
    cluster_ip_subnet: Ipv4Net,

    /// This node's name; topology entity names derive from it.
    #[arg(long, value_name = "NAME")]
    node_name: String,
}

impl CommonArgs {
    /// Validated cluster configuration.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidNodeName`] for unusable node names.
    pub fn cluster(&self) -> Result<ClusterConfig, ConfigError> {
        ClusterConfig::new(self.cluster_ip_subnet, &self.node_name)
    }
}

/// `master-init` flags.
#[derive(Debug, Args)]
pub struct MasterArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// The master node's private subnet, CIDR notation.
    #[arg(long, value_name = "CIDR")]
    master_switch_subnet: Ipv4Net,
}

impl MasterArgs {
    /// The master node's private subnet.
    #[must_use]
    pub fn node_subnet(&self) -> Ipv4Net {
        self.master_switch_subnet
    }
}

/// `minion-init` flags.
#[derive(Debug, Args)]
pub struct MinionArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// This node's private subnet, CIDR notation.
    #[arg(long, value_name = "CIDR")]
    minion_switch_subnet: Ipv4Net,

    /// CNI plugin binary to link into the plugin directory; CNI
    /// integration is skipped when omitted.
    #[arg(long, value_name = "FILE")]
    cni_plugin: Option<PathBuf>,

    /// Directory the CNI plugin is linked into.
    #[arg(long, value_name = "DIR", default_value = DEFAULT_CNI_PLUGIN_DIR)]
    cni_plugin_dir: PathBuf,

    /// Directory the CNI network descriptor is written into.
    #[arg(long, value_name = "DIR", default_value = netcfg::cni::DEFAULT_CONF_DIR)]
    cni_conf_dir: PathBuf,
}

impl MinionArgs {
    /// This node's private subnet.
    #[must_use]
    pub fn node_subnet(&self) -> Ipv4Net {
        self.minion_switch_subnet
    }

    /// CNI installation to perform, when a plugin was given.
    #[must_use]
    pub fn cni_install(&self) -> Option<CniInstall> {
        self.cni_plugin.as_ref().map(|plugin| CniInstall {
            plugin_source: plugin.clone(),
            plugin_dir: self.cni_plugin_dir.clone(),
            conf_dir: self.cni_conf_dir.clone(),
        })
    }
}

/// `gateway-init` flags.
#[derive(Debug, Args)]
pub struct GatewayArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Dedicated physical interface for external traffic; exclusive
    /// with `--bridge-interface`.
    #[arg(long, value_name = "IFACE")]
    physical_interface: Option<String>,

    /// Existing bridge for external traffic; exclusive with
    /// `--physical-interface`.
    #[arg(long, value_name = "BRIDGE")]
    bridge_interface: Option<String>,

    /// This gateway's address on the physical network, CIDR notation.
    #[arg(long, value_name = "CIDR")]
    physical_ip: Ipv4Net,

    /// Next hop for the gateway's default route.
    #[arg(long, value_name = "ADDRESS")]
    default_gw: Option<Ipv4Addr>,

    /// Source subnets whose egress ramps out through this gateway,
    /// comma-separated CIDRs. Malformed entries are skipped with a
    /// warning.
    #[arg(long, value_name = "CIDRS", value_delimiter = ',')]
    rampout_ip_subnets: Vec<String>,
}

impl GatewayArgs {
    /// Gateway configuration; the interface exclusive-or is validated
    /// when the workflow resolves it.
    #[must_use]
    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig {
            physical_interface: self.physical_interface.clone(),
            bridge_interface: self.bridge_interface.clone(),
            physical_ip: self.physical_ip,
            default_gateway: self.default_gw,
            rampout_subnets: self.rampout_ip_subnets.clone(),
        }
    }
}
