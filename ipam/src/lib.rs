// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Address arithmetic for the overlay topology.
//!
//! Owns the fixed join-subnet constants, the scan that picks the next
//! free router address in the join pool, and the derivation of the two
//! endpoint addresses of a node's private subnet. Everything here is
//! pure; reading the set of claimed addresses out of the store is the
//! caller's concern.

#![deny(clippy::all, clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod mac;

pub use mac::Mac;

use ipnet::Ipv4Net;
use std::collections::HashSet;
use std::net::Ipv4Addr;

/// Address held by the distributed router's port on the join switch.
pub const DISTRIBUTED_ROUTER_JOIN_IP: Ipv4Addr = Ipv4Addr::new(100, 64, 1, 1);

/// Join address the distributed router's default route points at.
///
/// This is the conventional address of the first gateway router; the
/// route is not re-derived per gateway (see DESIGN.md).
pub const GATEWAY_DEFAULT_JOIN_IP: Ipv4Addr = Ipv4Addr::new(100, 64, 1, 2);

/// The fixed subnet of the join switch interconnecting the distributed
/// router with every gateway router.
#[must_use]
pub fn join_subnet() -> Ipv4Net {
    Ipv4Net::new(Ipv4Addr::new(100, 64, 1, 0), 24).unwrap_or_else(|_| unreachable!())
}

/// Failures of the pure address computations.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum IpamError {
    /// Every candidate address in the join pool is already claimed.
    #[error("join address pool {0} is exhausted")]
    PoolExhausted(Ipv4Net),
    /// The subnet cannot hold a router and a host endpoint.
    #[error("subnet {0} is too small to hold router and host endpoints")]
    SubnetTooSmall(Ipv4Net),
}

/// Pick the next free address in the join pool.
///
/// Scans candidates from the second usable address of the join subnet
/// upward (the first usable address is reserved for the distributed
/// router) and returns the first one not present in `used`.
///
/// Deterministic: the same `used` set always yields the same answer.
/// The scan and the caller's subsequent claim are not atomic; two nodes
/// initializing concurrently can race for the same address (accepted,
/// see DESIGN.md).
///
/// # Errors
///
/// [`IpamError::PoolExhausted`] when every candidate is claimed.
pub fn next_join_ip(used: &HashSet<Ipv4Addr>) -> Result<Ipv4Addr, IpamError> {
    let pool = join_subnet();
    pool.hosts()
        .filter(|addr| *addr != DISTRIBUTED_ROUTER_JOIN_IP)
        .find(|addr| !used.contains(addr))
        .ok_or(IpamError::PoolExhausted(pool))
}

/// Derive the router-side and host-side endpoint addresses of a node's
/// private subnet: the first and second usable addresses, in that order.
///
/// # Errors
///
/// [`IpamError::SubnetTooSmall`] when the subnet has fewer than two
/// usable addresses.
pub fn subnet_endpoints(subnet: Ipv4Net) -> Result<(Ipv4Addr, Ipv4Addr), IpamError> {
    let mut hosts = subnet.hosts();
    match (hosts.next(), hosts.next()) {
        (Some(router), Some(host)) => Ok((router, host)),
        _ => Err(IpamError::SubnetTooSmall(subnet)),
    }
}
