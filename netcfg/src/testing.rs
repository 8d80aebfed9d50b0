// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Recording configurator for workflow tests.

use crate::{LocalNetConfigurator, NetcfgError};
use ipam::Mac;
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use std::sync::Mutex;

/// One recorded `configure` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigureCall {
    /// Port configured.
    pub port: String,
    /// Host endpoint address.
    pub address: Ipv4Net,
    /// Cluster subnet routed via the router endpoint.
    pub cluster_subnet: Ipv4Net,
    /// Router endpoint used as next hop.
    pub router_ip: Ipv4Addr,
}

/// Configurator that touches nothing and records everything.
#[derive(Debug, Default)]
pub struct FakeConfigurator {
    ensured: Mutex<Vec<(String, String)>>,
    configured: Mutex<Vec<ConfigureCall>>,
    flushed: Mutex<Vec<String>>,
}

fn port_mac(port: &str) -> Mac {
    let mut octets = [0x0au8, 0x58, 0, 0, 0, 0];
    let mut i: u8 = 0;
    for byte in port.bytes() {
        octets[2 + usize::from(i % 4)] ^= byte.wrapping_add(i);
        i = i.wrapping_add(1);
    }
    Mac(octets)
}

impl FakeConfigurator {
    /// New recording configurator.
    #[must_use]
    pub fn new() -> Self {
        FakeConfigurator::default()
    }

    /// Recorded `(bridge, port)` pairs from `ensure_port`.
    #[must_use]
    pub fn ensured(&self) -> Vec<(String, String)> {
        self.ensured.lock().expect("poisoned").clone()
    }

    /// Recorded `configure` calls.
    #[must_use]
    pub fn configured(&self) -> Vec<ConfigureCall> {
        self.configured.lock().expect("poisoned").clone()
    }

    /// Recorded `flush_addresses` calls.
    #[must_use]
    pub fn flushed(&self) -> Vec<String> {
        self.flushed.lock().expect("poisoned").clone()
    }

    /// The MAC this fake answers for a port.
    #[must_use]
    pub fn mac_for(port: &str) -> Mac {
        port_mac(port)
    }
}

impl LocalNetConfigurator for FakeConfigurator {
    fn ensure_port(&self, bridge: &str, port: &str) -> Result<Mac, NetcfgError> {
        self.ensured
            .lock()
            .expect("poisoned")
            .push((bridge.to_string(), port.to_string()));
        Ok(port_mac(port))
    }

    fn configure(
        &self,
        port: &str,
        address: Ipv4Net,
        cluster_subnet: Ipv4Net,
        router_ip: Ipv4Addr,
    ) -> Result<(), NetcfgError> {
        self.configured.lock().expect("poisoned").push(ConfigureCall {
            port: port.to_string(),
            address,
            cluster_subnet,
            router_ip,
        });
        Ok(())
    }

    fn flush_addresses(&self, iface: &str) -> Result<(), NetcfgError> {
        self.flushed.lock().expect("poisoned").push(iface.to_string());
        Ok(())
    }
}
