// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Node-local network configuration.
//!
//! The provisioning workflows hand off to this crate at two points:
//! when the per-node management port must exist on the integration
//! bridge (and its MAC read back), and when the OS side of that port
//! must be brought up with the host endpoint address and the cluster
//! route. Both are behind the [`LocalNetConfigurator`] trait with one
//! implementation per supported platform, selected at startup.
//!
//! The CNI integration descriptor the minion role persists also lives
//! here; it is a boundary artifact, not core topology.

#![deny(clippy::all, clippy::pedantic)]
#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc)]

pub mod cni;
pub mod linux;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use linux::{detect_platform, Debian, Platform, RedHat};

use ipam::Mac;
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use vswitch::VswitchError;

/// Errors configuring the local network.
#[derive(Debug, thiserror::Error)]
pub enum NetcfgError {
    /// An OS-level network command failed.
    #[error(transparent)]
    Exec(#[from] exec::ExecutionError),
    /// A local vswitch operation failed.
    #[error(transparent)]
    Vswitch(#[from] VswitchError),
    /// Reading or writing a local file failed.
    #[error("i/o error on {path}: {err}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        err: std::io::Error,
    },
    /// The host platform could not be mapped to a configurator.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

/// Contract between the workflows and the OS-specific network setup.
///
/// Every operation is idempotent: calling it against an
/// already-provisioned interface converges instead of failing.
pub trait LocalNetConfigurator {
    /// Ensure the bridge and the host-facing internal port exist, and
    /// answer the port's stable MAC.
    fn ensure_port(&self, bridge: &str, port: &str) -> Result<Mac, NetcfgError>;

    /// Bring the port up with the host endpoint address and install
    /// the cluster route via the router endpoint.
    fn configure(
        &self,
        port: &str,
        address: Ipv4Net,
        cluster_subnet: Ipv4Net,
        router_ip: Ipv4Addr,
    ) -> Result<(), NetcfgError>;

    /// Drop every address configured on an interface. Used on a
    /// physical interface just before its addressing moves to a
    /// gateway router.
    fn flush_addresses(&self, iface: &str) -> Result<(), NetcfgError>;
}
