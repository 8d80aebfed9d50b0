// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! CNI integration artifacts written by the minion role.

use crate::NetcfgError;
use ipnet::Ipv4Net;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default directory for CNI network configuration files.
pub const DEFAULT_CONF_DIR: &str = "/etc/cni/net.d";
/// File name of the descriptor written by this tool.
pub const CONF_FILE: &str = "10-overlay.conf";
/// Plugin type named in the descriptor.
pub const PLUGIN_TYPE: &str = "overlay-cni";

/// IPAM section of the CNI descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct IpamConf {
    /// IPAM plugin type.
    #[serde(rename = "type")]
    pub plugin_type: String,
    /// Subnet addresses are handed out from.
    pub subnet: Ipv4Net,
}

/// The node-local CNI network descriptor.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetConf {
    /// Network name.
    pub name: String,
    /// Plugin type.
    #[serde(rename = "type")]
    pub plugin_type: String,
    /// Integration bridge the plugin attaches pods to.
    pub bridge: String,
    /// Whether the bridge acts as a gateway.
    pub is_gateway: bool,
    /// Whether the plugin masquerades egress traffic.
    pub ip_masq: bool,
    /// IPAM section.
    pub ipam: IpamConf,
}

impl NetConf {
    /// Descriptor for a node's subnet on the integration bridge.
    #[must_use]
    pub fn for_node(bridge: &str, node_subnet: Ipv4Net) -> NetConf {
        NetConf {
            name: "overlay".to_string(),
            plugin_type: PLUGIN_TYPE.to_string(),
            bridge: bridge.to_string(),
            is_gateway: true,
            ip_masq: false,
            ipam: IpamConf {
                plugin_type: "host-local".to_string(),
                subnet: node_subnet,
            },
        }
    }
}

/// Write the descriptor into a CNI configuration directory.
///
/// # Errors
///
/// [`NetcfgError::Io`] when the directory or file cannot be written.
pub fn write_netconf(conf_dir: &Path, conf: &NetConf) -> Result<PathBuf, NetcfgError> {
    std::fs::create_dir_all(conf_dir).map_err(|err| NetcfgError::Io {
        path: conf_dir.to_path_buf(),
        err,
    })?;
    let path = conf_dir.join(CONF_FILE);
    let body = serde_json::to_string_pretty(conf).unwrap_or_else(|_| unreachable!());
    std::fs::write(&path, body).map_err(|err| NetcfgError::Io {
        path: path.clone(),
        err,
    })?;
    info!("wrote CNI descriptor {}", path.display());
    Ok(path)
}

/// Link the CNI plugin binary into a plugin directory, tolerating an
/// existing link.
///
/// # Errors
///
/// [`NetcfgError::Io`] when the link cannot be created.
pub fn install_plugin(source: &Path, plugin_dir: &Path) -> Result<(), NetcfgError> {
    std::fs::create_dir_all(plugin_dir).map_err(|err| NetcfgError::Io {
        path: plugin_dir.to_path_buf(),
        err,
    })?;
    let Some(file_name) = source.file_name() else {
        return Err(NetcfgError::Io {
            path: source.to_path_buf(),
            err: std::io::Error::from(std::io::ErrorKind::InvalidInput),
        });
    };
    let target = plugin_dir.join(file_name);
    match std::os::unix::fs::symlink(source, &target) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(err) => Err(NetcfgError::Io { path: target, err }),
    }
}
