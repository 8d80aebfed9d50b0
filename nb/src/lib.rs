// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Client for the northbound topology store.
//!
//! The store speaks a command-style protocol: find rows by predicate,
//! create records, set and add fields, plus a handful of compound verbs
//! for routers, switches, ports, routes and NAT rules, all carrying a
//! may-exist / if-exists idempotency modifier. This crate centralizes
//! that protocol behind a typed request builder ([`NbRequest`]) and a
//! transport seam ([`NbTransport`]): the production transport renders
//! requests to an `ovn-nbctl`-compatible command line, while the
//! `testing` feature exports an in-memory store interpreting the same
//! requests so workflow tests can assert final store state.
//!
//! No business logic lives here; the workflows in the topology crate
//! decide what to create and in which order.

#![deny(clippy::all, clippy::pedantic)]
#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc)]

pub mod client;
pub mod nbctl;
pub mod request;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{Nb, NbTransport};
pub use nbctl::{NbCtl, TlsConfig};
pub use request::{Clause, NbRequest, NbTable};

use std::path::PathBuf;

/// Errors talking to the northbound store.
#[derive(Debug, thiserror::Error)]
pub enum NbError {
    /// The store client command failed or could not be spawned.
    #[error(transparent)]
    Exec(#[from] exec::ExecutionError),
    /// A mutation referenced a record that does not exist.
    #[error("no such record '{record}' in table {table}")]
    NoSuchRecord {
        /// The table the record was looked up in.
        table: NbTable,
        /// The record name or uuid.
        record: String,
    },
    /// The store answered something the client cannot interpret.
    #[error("malformed store response: {0}")]
    BadResponse(String),
    /// The TLS bootstrap probe ran but the certificate never appeared.
    #[error("client certificate {0} missing after TLS bootstrap probe")]
    TlsBootstrap(PathBuf),
}
