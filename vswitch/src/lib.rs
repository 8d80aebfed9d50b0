// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Client for the node-local virtual switch.
//!
//! Mirrors the northbound client's shape: a typed request enum, a
//! transport seam, a production transport spawning the vswitch control
//! binary, and a `testing` in-memory switch. The vswitch owns the
//! integration bridge, the per-node management port, the chassis
//! identity, and the gateway-side physical/bridge attachments.

#![deny(clippy::all, clippy::pedantic)]
#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc)]

pub mod client;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod vsctl;

pub use client::{Vs, VsRequest, VsTransport};
pub use vsctl::VsCtl;

/// Errors talking to the local vswitch.
#[derive(Debug, thiserror::Error)]
pub enum VswitchError {
    /// The vswitch control command failed or could not be spawned.
    #[error(transparent)]
    Exec(#[from] exec::ExecutionError),
    /// A request referenced a bridge or interface that does not exist.
    #[error("no such {kind} '{name}'")]
    NoSuchEntity {
        /// `bridge` or `interface`.
        kind: &'static str,
        /// Name looked up.
        name: String,
    },
    /// A field the caller requires came back empty or unparseable.
    #[error("bad value for {what}: {value}")]
    BadValue {
        /// What was being read.
        what: &'static str,
        /// The raw value.
        value: String,
    },
}
