// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! In-memory vswitch for tests.
//!
//! Models just enough of the local switch database for the workflows:
//! bridges, ports with interface fields, a chassis identity, and a
//! deterministic `mac_in_use` per interface.

use crate::client::{VsRequest, VsTransport};
use crate::VswitchError;
use ipam::Mac;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// A port attached to a fake bridge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakePort {
    /// Owning bridge.
    pub bridge: String,
    /// Interface fields, map entries flattened.
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct State {
    chassis_id: Option<String>,
    bridges: BTreeMap<String, BTreeMap<String, String>>,
    ports: BTreeMap<String, FakePort>,
}

/// Derive a stable MAC from an interface name.
fn stable_mac(name: &str) -> Mac {
    let mut octets = [0x02u8, 0x42, 0, 0, 0, 0];
    let mut i: u8 = 0;
    for byte in name.bytes() {
        octets[2 + usize::from(i % 4)] ^= byte.wrapping_mul(31).wrapping_add(i);
        i = i.wrapping_add(1);
    }
    Mac(octets)
}

/// In-memory transport interpreting vswitch requests.
#[derive(Debug, Default)]
pub struct FakeVs {
    state: Mutex<State>,
}

impl FakeVs {
    /// Empty switch with no chassis identity.
    #[must_use]
    pub fn new() -> Self {
        FakeVs::default()
    }

    /// Switch with a configured chassis identity.
    #[must_use]
    pub fn with_chassis(chassis_id: &str) -> Self {
        let fake = FakeVs::default();
        fake.lock().chassis_id = Some(chassis_id.to_string());
        fake
    }

    /// Whether a bridge exists.
    #[must_use]
    pub fn has_bridge(&self, name: &str) -> bool {
        self.lock().bridges.contains_key(name)
    }

    /// Clone of a port's state.
    #[must_use]
    pub fn port(&self, name: &str) -> Option<FakePort> {
        self.lock().ports.get(name).cloned()
    }

    /// A bridge field, as set via the client.
    #[must_use]
    pub fn bridge_field(&self, bridge: &str, column: &str) -> Option<String> {
        self.lock().bridges.get(bridge)?.get(column).cloned()
    }

    /// Preset an interface field (e.g. a specific `mac_in_use`).
    pub fn preset_interface_field(&self, iface: &str, column: &str, value: &str) {
        let mut state = self.lock();
        state
            .ports
            .entry(iface.to_string())
            .or_default()
            .fields
            .insert(column.to_string(), value.to_string());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("fake vswitch poisoned")
    }
}

impl VsTransport for FakeVs {
    fn run(&self, request: &VsRequest) -> Result<String, VswitchError> {
        let mut state = self.lock();
        match request {
            VsRequest::GetChassisId => Ok(state.chassis_id.clone().unwrap_or_default()),
            VsRequest::EnsureBridge { name } => {
                state.bridges.entry(name.clone()).or_default();
                Ok(String::new())
            }
            VsRequest::AddPort {
                bridge,
                port,
                iface_fields,
            } => {
                if !state.bridges.contains_key(bridge) {
                    return Err(VswitchError::NoSuchEntity {
                        kind: "bridge",
                        name: bridge.clone(),
                    });
                }
                let entry = state.ports.entry(port.clone()).or_default();
                entry.bridge.clone_from(bridge);
                for (column, value) in iface_fields {
                    entry.fields.insert(column.clone(), value.clone());
                }
                Ok(String::new())
            }
            VsRequest::SetInterface { iface, fields } => {
                let Some(entry) = state.ports.get_mut(iface) else {
                    return Err(VswitchError::NoSuchEntity {
                        kind: "interface",
                        name: iface.clone(),
                    });
                };
                for (column, value) in fields {
                    entry.fields.insert(column.clone(), value.clone());
                }
                Ok(String::new())
            }
            VsRequest::GetInterfaceField { iface, column } => {
                // bridges expose an internal interface of their own name
                let known =
                    state.ports.contains_key(iface) || state.bridges.contains_key(iface);
                if !known {
                    return Ok(String::new());
                }
                if let Some(value) = state.ports.get(iface).and_then(|p| p.fields.get(column)) {
                    return Ok(value.clone());
                }
                if column == "mac_in_use" {
                    return Ok(stable_mac(iface).to_string());
                }
                Ok(String::new())
            }
            VsRequest::SetBridgeField { bridge, fields } => {
                let Some(entry) = state.bridges.get_mut(bridge) else {
                    return Err(VswitchError::NoSuchEntity {
                        kind: "bridge",
                        name: bridge.clone(),
                    });
                };
                for (column, value) in fields {
                    entry.insert(column.clone(), value.clone());
                }
                Ok(String::new())
            }
        }
    }
}
