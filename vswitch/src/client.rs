// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Typed vswitch requests and the client built on them.

use crate::VswitchError;
use ipam::Mac;
use tracing::debug;

/// One operation against the local vswitch database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VsRequest {
    /// Read the chassis identity of the local vswitch daemon.
    GetChassisId,
    /// Create a bridge if absent.
    EnsureBridge {
        /// Bridge name.
        name: String,
    },
    /// Attach a port to a bridge if absent, optionally setting
    /// interface fields in the same transaction.
    AddPort {
        /// Owning bridge.
        bridge: String,
        /// Port (and interface) name.
        port: String,
        /// `column=value` fields applied to the interface.
        iface_fields: Vec<(String, String)>,
    },
    /// Overwrite interface fields.
    SetInterface {
        /// Interface name.
        iface: String,
        /// `column=value` fields.
        fields: Vec<(String, String)>,
    },
    /// Read one interface field; absent interfaces answer empty.
    GetInterfaceField {
        /// Interface name.
        iface: String,
        /// Column or map-entry selector.
        column: String,
    },
    /// Overwrite bridge fields.
    SetBridgeField {
        /// Bridge name.
        bridge: String,
        /// `column=value` fields.
        fields: Vec<(String, String)>,
    },
}

impl VsRequest {
    /// Render the request to vswitch-client arguments.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();
        match self {
            VsRequest::GetChassisId => {
                args.extend(
                    ["--if-exists", "get", "Open_vSwitch", ".", "external_ids:system-id"]
                        .map(str::to_string),
                );
            }
            VsRequest::EnsureBridge { name } => {
                args.push("--may-exist".to_string());
                args.push("add-br".to_string());
                args.push(name.clone());
            }
            VsRequest::AddPort {
                bridge,
                port,
                iface_fields,
            } => {
                args.push("--may-exist".to_string());
                args.push("add-port".to_string());
                args.push(bridge.clone());
                args.push(port.clone());
                if !iface_fields.is_empty() {
                    args.push("--".to_string());
                    args.push("set".to_string());
                    args.push("interface".to_string());
                    args.push(port.clone());
                    args.extend(iface_fields.iter().map(|(k, v)| format!("{k}={v}")));
                }
            }
            VsRequest::SetInterface { iface, fields } => {
                args.push("set".to_string());
                args.push("interface".to_string());
                args.push(iface.clone());
                args.extend(fields.iter().map(|(k, v)| format!("{k}={v}")));
            }
            VsRequest::GetInterfaceField { iface, column } => {
                args.push("--if-exists".to_string());
                args.push("get".to_string());
                args.push("interface".to_string());
                args.push(iface.clone());
                args.push(column.clone());
            }
            VsRequest::SetBridgeField { bridge, fields } => {
                args.push("set".to_string());
                args.push("bridge".to_string());
                args.push(bridge.clone());
                args.extend(fields.iter().map(|(k, v)| format!("{k}={v}")));
            }
        }
        args
    }
}

/// Transport seam for the local vswitch.
pub trait VsTransport {
    /// Execute one request, answering its raw output.
    fn run(&self, request: &VsRequest) -> Result<String, VswitchError>;
}

/// Typed client for the local vswitch.
#[derive(Debug)]
pub struct Vs<T> {
    transport: T,
}

fn normalize(raw: &str) -> String {
    raw.trim().trim_matches('"').to_string()
}

impl<T: VsTransport> Vs<T> {
    /// Wrap a transport.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Vs { transport }
    }

    /// Access the underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn run(&self, request: &VsRequest) -> Result<String, VswitchError> {
        debug!("vswitch: {:?}", request.to_args().join(" "));
        self.transport.run(request)
    }

    /// The chassis identity of the local vswitch daemon, if set.
    pub fn chassis_id(&self) -> Result<Option<String>, VswitchError> {
        let raw = normalize(&self.run(&VsRequest::GetChassisId)?);
        if raw.is_empty() {
            return Ok(None);
        }
        Ok(Some(raw))
    }

    /// Create a bridge if absent.
    pub fn ensure_bridge(&self, name: &str) -> Result<(), VswitchError> {
        self.run(&VsRequest::EnsureBridge {
            name: name.to_string(),
        })?;
        Ok(())
    }

    /// Attach a port to a bridge if absent, applying interface fields.
    pub fn add_port(
        &self,
        bridge: &str,
        port: &str,
        iface_fields: &[(&str, &str)],
    ) -> Result<(), VswitchError> {
        self.run(&VsRequest::AddPort {
            bridge: bridge.to_string(),
            port: port.to_string(),
            iface_fields: iface_fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        })?;
        Ok(())
    }

    /// Read one interface field, `None` when absent or empty.
    pub fn get_interface_field(
        &self,
        iface: &str,
        column: &str,
    ) -> Result<Option<String>, VswitchError> {
        let raw = normalize(&self.run(&VsRequest::GetInterfaceField {
            iface: iface.to_string(),
            column: column.to_string(),
        })?);
        if raw.is_empty() || raw == "[]" {
            return Ok(None);
        }
        Ok(Some(raw))
    }

    /// The MAC an interface is actually using.
    pub fn interface_mac(&self, iface: &str) -> Result<Mac, VswitchError> {
        let raw = self
            .get_interface_field(iface, "mac_in_use")?
            .ok_or_else(|| VswitchError::NoSuchEntity {
                kind: "interface",
                name: iface.to_string(),
            })?;
        raw.parse().map_err(|_| VswitchError::BadValue {
            what: "interface mac",
            value: raw,
        })
    }

    /// Pin a bridge's MAC to its current value so it no longer drifts
    /// as ports come and go.
    pub fn pin_bridge_mac(&self, bridge: &str) -> Result<Mac, VswitchError> {
        let mac = self.interface_mac(bridge)?;
        self.run(&VsRequest::SetBridgeField {
            bridge: bridge.to_string(),
            fields: vec![("other-config:hwaddr".to_string(), mac.to_string())],
        })?;
        Ok(mac)
    }

    /// Attach a physical interface to the integration bridge, binding
    /// it to a logical port id, and answer its MAC.
    pub fn attach_physical(
        &self,
        integration_bridge: &str,
        iface: &str,
        iface_id: &str,
    ) -> Result<Mac, VswitchError> {
        self.add_port(
            integration_bridge,
            iface,
            &[("external_ids:iface-id", iface_id)],
        )?;
        self.interface_mac(iface)
    }

    /// Connect an existing bridge to the integration bridge with a
    /// patch-port pair, binding the integration side to a logical port
    /// id.
    pub fn connect_via_patch(
        &self,
        bridge: &str,
        integration_bridge: &str,
        iface_id: &str,
    ) -> Result<(), VswitchError> {
        let to_ext = format!("patch-{integration_bridge}-to-{bridge}");
        let to_int = format!("patch-{bridge}-to-{integration_bridge}");
        self.add_port(
            integration_bridge,
            &to_ext,
            &[
                ("type", "patch"),
                ("options:peer", &to_int),
                ("external_ids:iface-id", iface_id),
            ],
        )?;
        self.add_port(
            bridge,
            &to_int,
            &[("type", "patch"), ("options:peer", &to_ext)],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn chassis_request_renders_if_exists_get() {
        assert_eq!(
            VsRequest::GetChassisId.to_args(),
            ["--if-exists", "get", "Open_vSwitch", ".", "external_ids:system-id"]
        );
    }

    #[test]
    fn add_port_renders_compound_transaction() {
        let req = VsRequest::AddPort {
            bridge: "br-int".to_string(),
            port: "k8s-m1".to_string(),
            iface_fields: vec![("type".to_string(), "internal".to_string())],
        };
        assert_eq!(
            req.to_args(),
            [
                "--may-exist",
                "add-port",
                "br-int",
                "k8s-m1",
                "--",
                "set",
                "interface",
                "k8s-m1",
                "type=internal",
            ]
        );
    }

    #[test]
    fn add_port_without_fields_has_no_trailing_transaction() {
        let req = VsRequest::AddPort {
            bridge: "br-int".to_string(),
            port: "eth1".to_string(),
            iface_fields: vec![],
        };
        assert_eq!(req.to_args(), ["--may-exist", "add-port", "br-int", "eth1"]);
    }
}
