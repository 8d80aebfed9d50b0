// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Linux platform configurators.
//!
//! Debian and RedHat differ only in how the management port's
//! configuration is persisted across reboots; the live setup (`ip`
//! commands against the running kernel) is shared.

use crate::{LocalNetConfigurator, NetcfgError};
use ipam::Mac;
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};
use vswitch::{Vs, VsTransport};

const IP: &str = "ip";

/// Supported host platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Debian-family hosts (`/etc/network/interfaces.d`).
    Debian,
    /// RedHat-family hosts (`/etc/sysconfig/network-scripts`).
    RedHat,
}

/// Map the host to a [`Platform`] from an os-release file.
///
/// # Errors
///
/// [`NetcfgError::UnsupportedPlatform`] when neither family matches,
/// [`NetcfgError::Io`] when the file cannot be read.
pub fn detect_platform(os_release: &Path) -> Result<Platform, NetcfgError> {
    let text = std::fs::read_to_string(os_release).map_err(|err| NetcfgError::Io {
        path: os_release.to_path_buf(),
        err,
    })?;
    let mut id_fields = text
        .lines()
        .filter(|line| line.starts_with("ID=") || line.starts_with("ID_LIKE="))
        .map(|line| line.to_ascii_lowercase());
    if id_fields.clone().any(|l| l.contains("debian") || l.contains("ubuntu")) {
        return Ok(Platform::Debian);
    }
    if id_fields.any(|l| {
        l.contains("rhel") || l.contains("fedora") || l.contains("centos")
    }) {
        return Ok(Platform::RedHat);
    }
    Err(NetcfgError::UnsupportedPlatform(text.trim().to_string()))
}

fn flush_live(iface: &str) -> Result<(), NetcfgError> {
    exec::execute(Command::new(IP).args(["addr", "flush", "dev", iface]))?;
    Ok(())
}

fn ensure_port_on_bridge<T: VsTransport>(
    vs: &Vs<T>,
    bridge: &str,
    port: &str,
) -> Result<Mac, NetcfgError> {
    vs.ensure_bridge(bridge)?;
    vs.add_port(
        bridge,
        port,
        &[("type", "internal"), ("external_ids:iface-id", port)],
    )?;
    let mac = vs.interface_mac(port)?;
    debug!("management port {port} on {bridge} has mac {mac}");
    Ok(mac)
}

/// Live (non-persistent) interface setup shared by both platforms.
fn configure_live(
    port: &str,
    address: Ipv4Net,
    cluster_subnet: Ipv4Net,
    router_ip: Ipv4Addr,
) -> Result<(), NetcfgError> {
    exec::execute(Command::new(IP).args(["link", "set", "dev", port, "up"]))?;
    // re-derive addressing from scratch so re-runs converge
    exec::execute(Command::new(IP).args(["addr", "flush", "dev", port]))?;
    exec::execute(Command::new(IP).args(["addr", "add", &address.to_string(), "dev", port]))?;
    exec::execute(Command::new(IP).args(["route", "flush", &cluster_subnet.to_string()]))?;
    exec::execute(Command::new(IP).args([
        "route",
        "add",
        &cluster_subnet.to_string(),
        "via",
        &router_ip.to_string(),
    ]))?;
    info!("management port {port} configured with {address}");
    Ok(())
}

fn persist(path: PathBuf, contents: String) -> Result<(), NetcfgError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| NetcfgError::Io {
            path: parent.to_path_buf(),
            err,
        })?;
    }
    std::fs::write(&path, contents).map_err(|err| NetcfgError::Io { path, err })
}

/// Configurator for Debian-family hosts.
#[derive(Debug)]
pub struct Debian<T> {
    vs: Vs<T>,
    persist_dir: PathBuf,
}

impl<T: VsTransport> Debian<T> {
    /// Configurator persisting under `/etc/network/interfaces.d`.
    #[must_use]
    pub fn new(vs: Vs<T>) -> Self {
        Debian {
            vs,
            persist_dir: PathBuf::from("/etc/network/interfaces.d"),
        }
    }

    /// Persist under a different directory (tests).
    #[must_use]
    pub fn persist_dir(mut self, dir: &Path) -> Self {
        self.persist_dir = dir.to_path_buf();
        self
    }
}

impl<T: VsTransport> LocalNetConfigurator for Debian<T> {
    fn ensure_port(&self, bridge: &str, port: &str) -> Result<Mac, NetcfgError> {
        ensure_port_on_bridge(&self.vs, bridge, port)
    }

    fn configure(
        &self,
        port: &str,
        address: Ipv4Net,
        cluster_subnet: Ipv4Net,
        router_ip: Ipv4Addr,
    ) -> Result<(), NetcfgError> {
        configure_live(port, address, cluster_subnet, router_ip)?;
        let contents = format!(
            "auto {port}\niface {port} inet static\n    address {addr}\n    netmask {mask}\n    up ip route add {subnet} via {router}\n",
            addr = address.addr(),
            mask = address.netmask(),
            subnet = cluster_subnet,
            router = router_ip,
        );
        persist(self.persist_dir.join(port), contents)
    }

    fn flush_addresses(&self, iface: &str) -> Result<(), NetcfgError> {
        flush_live(iface)
    }
}

/// Configurator for RedHat-family hosts.
#[derive(Debug)]
pub struct RedHat<T> {
    vs: Vs<T>,
    persist_dir: PathBuf,
}

impl<T: VsTransport> RedHat<T> {
    /// Configurator persisting under `/etc/sysconfig/network-scripts`.
    #[must_use]
    pub fn new(vs: Vs<T>) -> Self {
        RedHat {
            vs,
            persist_dir: PathBuf::from("/etc/sysconfig/network-scripts"),
        }
    }

    /// Persist under a different directory (tests).
    #[must_use]
    pub fn persist_dir(mut self, dir: &Path) -> Self {
        self.persist_dir = dir.to_path_buf();
        self
    }
}

impl<T: VsTransport> LocalNetConfigurator for RedHat<T> {
    fn ensure_port(&self, bridge: &str, port: &str) -> Result<Mac, NetcfgError> {
        ensure_port_on_bridge(&self.vs, bridge, port)
    }

    fn configure(
        &self,
        port: &str,
        address: Ipv4Net,
        cluster_subnet: Ipv4Net,
        router_ip: Ipv4Addr,
    ) -> Result<(), NetcfgError> {
        configure_live(port, address, cluster_subnet, router_ip)?;
        let contents = format!(
            "DEVICE={port}\nONBOOT=yes\nBOOTPROTO=static\nIPADDR={addr}\nNETMASK={mask}\n",
            addr = address.addr(),
            mask = address.netmask(),
        );
        persist(self.persist_dir.join(format!("ifcfg-{port}")), contents)
    }

    fn flush_addresses(&self, iface: &str) -> Result<(), NetcfgError> {
        flush_live(iface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_os_release(contents: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), contents).unwrap();
        file
    }

    #[test]
    fn detects_debian_family() {
        let file = write_os_release("NAME=\"Ubuntu\"\nID=ubuntu\nID_LIKE=debian\n");
        assert_eq!(detect_platform(file.path()).unwrap(), Platform::Debian);
    }

    #[test]
    fn detects_redhat_family() {
        let file = write_os_release("NAME=\"CentOS Stream\"\nID=\"centos\"\nID_LIKE=\"rhel fedora\"\n");
        assert_eq!(detect_platform(file.path()).unwrap(), Platform::RedHat);
    }

    #[test]
    fn unknown_platform_is_rejected() {
        let file = write_os_release("ID=plan9\n");
        assert!(matches!(
            detect_platform(file.path()),
            Err(NetcfgError::UnsupportedPlatform(_))
        ));
    }

    #[test]
    fn ensure_port_reports_a_stable_mac() {
        use vswitch::testing::FakeVs;
        let vs = Vs::new(FakeVs::new());
        let first = ensure_port_on_bridge(&vs, "br-int", "k8s-m1").unwrap();
        let second = ensure_port_on_bridge(&vs, "br-int", "k8s-m1").unwrap();
        assert_eq!(first, second);
        let port = vs.transport().port("k8s-m1").unwrap();
        assert_eq!(port.fields.get("type").unwrap(), "internal");
    }
}
