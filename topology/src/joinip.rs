// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Join-switch address resolution for gateway routers.

use crate::names::TAG_CONNECT_TO_JOIN;
use crate::{names, TopologyError};
use ipam::Mac;
use ipnet::Ipv4Net;
use nb::{Clause, Nb, NbTable, NbTransport};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use tracing::{debug, warn};

/// A gateway router's identity on the join switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct JoinPort {
    /// Port MAC, stable across re-runs.
    pub mac: Mac,
    /// Address in the join subnet.
    pub ip: Ipv4Addr,
    /// True when the address was allocated by this call rather than
    /// read back from an existing port.
    pub newly_allocated: bool,
}

/// Every join address currently claimed by a router port.
fn used_join_ips<T: NbTransport>(nb: &Nb<T>) -> Result<HashSet<Ipv4Addr>, TopologyError> {
    let networks = nb.find_values(
        NbTable::LogicalRouterPort,
        "networks",
        vec![Clause::eq(TAG_CONNECT_TO_JOIN, "yes")],
    )?;
    let mut used = HashSet::new();
    for raw in networks {
        match raw.parse::<Ipv4Net>() {
            Ok(net) => {
                used.insert(net.addr());
            }
            Err(_) => warn!("ignoring unparsable join port network {raw:?}"),
        }
    }
    Ok(used)
}

/// Resolve a router's join port identity: read it back when the port
/// exists, otherwise allocate a fresh address and MAC.
///
/// Pure resolution; the caller creates the port afterwards, so an
/// exhausted pool fails before any store mutation.
pub(crate) fn resolve_join_port<T: NbTransport>(
    nb: &Nb<T>,
    router: &str,
) -> Result<JoinPort, TopologyError> {
    let port = names::rtoj(router);
    let existing_mac = nb.get_field(NbTable::LogicalRouterPort, &port, "mac")?;
    let existing_net = nb.get_field(NbTable::LogicalRouterPort, &port, "networks")?;
    if let (Some(mac), Some(net)) = (existing_mac, existing_net) {
        let mac: Mac = mac.parse().map_err(|_| TopologyError::BadStoreValue {
            what: "join port mac",
            value: mac.clone(),
        })?;
        let net: Ipv4Net = net.parse().map_err(|_| TopologyError::BadStoreValue {
            what: "join port network",
            value: net.clone(),
        })?;
        debug!("join port {port} already holds {}", net.addr());
        return Ok(JoinPort {
            mac,
            ip: net.addr(),
            newly_allocated: false,
        });
    }
    let used = used_join_ips(nb)?;
    let ip = ipam::next_join_ip(&used)?;
    debug!("allocated join address {ip} for {router}");
    Ok(JoinPort {
        mac: Mac::random_unicast(),
        ip,
        newly_allocated: true,
    })
}
