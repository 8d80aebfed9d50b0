// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Overlay topology construction.
//!
//! One workflow per node role, each running top-to-bottom to
//! completion or first failure:
//!
//! - [`MasterInit`] stands up the distributed router, the east-west
//!   load balancers and the join switch, then provisions the master's
//!   own management port.
//! - [`MinionInit`] provisions a worker's management port (and the
//!   node-local CNI descriptor).
//! - [`GatewayInit`] builds a per-node gateway router with external
//!   connectivity, NAT and north-south load balancing.
//!
//! Every store mutation is phrased as create-if-absent or
//! idempotent-set, so re-running a workflow with the same arguments
//! converges on the same store state. Nothing here deletes entities.
//! There is no rollback on failure; the recovery action is to fix the
//! condition and re-run the same command.

#![deny(clippy::all, clippy::pedantic)]
#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc)]

mod gateway;
mod joinip;
mod master;
mod mgmt_port;
mod minion;
pub mod names;

pub use gateway::GatewayInit;
pub use master::MasterInit;
pub use minion::{CniInstall, MinionInit};

use config::ConfigError;
use ipam::{IpamError, Mac};
use nb::{Clause, Nb, NbError, NbTable, NbTransport};
use netcfg::NetcfgError;
use vswitch::VswitchError;

/// Errors aborting a provisioning workflow.
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    /// The supplied configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// An expected singleton could not be resolved.
    #[error("discovery failed: no {0} found")]
    Discovery(&'static str),
    /// Address allocation or derivation failed.
    #[error(transparent)]
    Address(#[from] IpamError),
    /// A northbound store operation failed.
    #[error(transparent)]
    Store(#[from] NbError),
    /// A local vswitch operation failed.
    #[error(transparent)]
    Vswitch(#[from] VswitchError),
    /// Node-local network configuration failed.
    #[error(transparent)]
    Netcfg(#[from] NetcfgError),
    /// The store answered a value this tool cannot interpret.
    #[error("malformed store value for {what}: {value}")]
    BadStoreValue {
        /// What the value was read as.
        what: &'static str,
        /// The raw value.
        value: String,
    },
}

/// Locate the distributed router by its tag, never by name.
fn find_cluster_router<T: NbTransport>(nb: &Nb<T>) -> Result<String, TopologyError> {
    nb.find_uuid(
        NbTable::LogicalRouter,
        vec![Clause::eq(names::TAG_CLUSTER_ROUTER, "yes")],
    )?
    .ok_or(TopologyError::Discovery("cluster router"))
}

/// Resolve a router port's MAC, reusing the stored one when the port
/// already exists so re-runs never churn addresses.
fn stable_port_mac<T: NbTransport>(nb: &Nb<T>, port: &str) -> Result<Mac, TopologyError> {
    match nb.get_field(NbTable::LogicalRouterPort, port, "mac")? {
        Some(raw) => raw.parse().map_err(|_| TopologyError::BadStoreValue {
            what: "router port mac",
            value: raw,
        }),
        None => Ok(Mac::random_unicast()),
    }
}
