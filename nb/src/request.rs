// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Typed request builder for the northbound store protocol.
//!
//! Every store interaction is one [`NbRequest`] value. Rendering the
//! request to a command line happens in exactly one place
//! ([`NbRequest::to_args`]), which is also where the may-exist /
//! if-exists modifiers and the bare output flags are attached, so no
//! caller ever assembles protocol strings by hand.

use ipam::Mac;
use std::net::Ipv4Addr;

/// The store tables this tool touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum NbTable {
    /// Logical routers (the distributed router, gateway routers).
    #[strum(serialize = "logical_router")]
    LogicalRouter,
    /// Router-to-switch ports.
    #[strum(serialize = "logical_router_port")]
    LogicalRouterPort,
    /// Logical switches (node switches, join switch, external switches).
    #[strum(serialize = "logical_switch")]
    LogicalSwitch,
    /// Switch-side ports.
    #[strum(serialize = "logical_switch_port")]
    LogicalSwitchPort,
    /// East-west and north-south load balancers.
    #[strum(serialize = "load_balancer")]
    LoadBalancer,
    /// NAT rules on gateway routers.
    #[strum(serialize = "nat")]
    Nat,
    /// Static routes on logical routers.
    #[strum(serialize = "logical_router_static_route")]
    LogicalRouterStaticRoute,
}

/// A predicate clause of a `find` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// Column (or map entry, `map:key` syntax) equals a value.
    Eq {
        /// Column or map-entry selector.
        column: String,
        /// Value to match.
        value: String,
    },
    /// Column (or map entry) holds a non-null value.
    NotEmpty {
        /// Column or map-entry selector.
        column: String,
    },
}

impl Clause {
    /// Equality clause.
    #[must_use]
    pub fn eq(column: &str, value: &str) -> Clause {
        Clause::Eq {
            column: column.to_string(),
            value: value.to_string(),
        }
    }

    /// Non-null clause.
    #[must_use]
    pub fn not_empty(column: &str) -> Clause {
        Clause::NotEmpty {
            column: column.to_string(),
        }
    }

    fn render(&self) -> String {
        match self {
            Clause::Eq { column, value } => format!("{column}={value}"),
            Clause::NotEmpty { column } => format!("{column}!=null"),
        }
    }
}

/// One operation against the northbound store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NbRequest {
    /// Return one column of every row matching all clauses, in bare
    /// no-heading output mode (one row per line).
    Find {
        /// Table to scan.
        table: NbTable,
        /// Column to return (`_uuid` for record ids).
        column: String,
        /// Predicate clauses, all of which must match.
        clauses: Vec<Clause>,
    },
    /// Read one field of one record; absent records answer empty
    /// (if-exists modifier).
    Get {
        /// Table holding the record.
        table: NbTable,
        /// Record name or uuid.
        record: String,
        /// Column or map-entry selector.
        column: String,
    },
    /// Create a record with the given fields, answering its uuid.
    Create {
        /// Table to insert into.
        table: NbTable,
        /// Initial `column=value` fields.
        fields: Vec<(String, String)>,
    },
    /// Overwrite fields of an existing record.
    Set {
        /// Table holding the record.
        table: NbTable,
        /// Record name or uuid.
        record: String,
        /// `column=value` fields to overwrite.
        fields: Vec<(String, String)>,
    },
    /// Add a value to a set-valued column of an existing record.
    Add {
        /// Table holding the record.
        table: NbTable,
        /// Record name or uuid.
        record: String,
        /// Set-valued column.
        column: String,
        /// Value to add.
        value: String,
    },
    /// Create a logical router if absent.
    LrAdd {
        /// Router name.
        name: String,
    },
    /// Create a logical switch if absent.
    LsAdd {
        /// Switch name.
        name: String,
    },
    /// Create a router port if absent.
    LrpAdd {
        /// Owning router.
        router: String,
        /// Port name.
        port: String,
        /// Port MAC.
        mac: Mac,
        /// Port network in CIDR notation.
        network: String,
    },
    /// Create a switch port if absent.
    LspAdd {
        /// Owning switch.
        switch: String,
        /// Port name.
        port: String,
    },
    /// Replace the address set of a switch port. Each element is one
    /// address specification (`"<mac> <ip>"`, `router`, `unknown`).
    LspSetAddresses {
        /// Port name.
        port: String,
        /// Address specifications.
        addresses: Vec<String>,
    },
    /// Install a static route on a router if absent.
    LrRouteAdd {
        /// Owning router.
        router: String,
        /// Destination prefix in CIDR notation.
        prefix: String,
        /// Next hop address.
        nexthop: Ipv4Addr,
        /// Optional egress port.
        out_port: Option<String>,
        /// When true the prefix matches source addresses instead of
        /// destinations (rampout routes).
        src_policy: bool,
    },
    /// Install a source-NAT rule on a router if absent.
    LrNatAddSnat {
        /// Owning router.
        router: String,
        /// External address translated to.
        external_ip: Ipv4Addr,
        /// Logical subnet translated from, CIDR notation.
        logical_net: String,
    },
}

impl NbRequest {
    /// Render the request to store-client arguments.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();
        match self {
            NbRequest::Find {
                table,
                column,
                clauses,
            } => {
                args.push("--data=bare".to_string());
                args.push("--no-heading".to_string());
                args.push(format!("--columns={column}"));
                args.push("find".to_string());
                args.push(table.to_string());
                args.extend(clauses.iter().map(Clause::render));
            }
            NbRequest::Get {
                table,
                record,
                column,
            } => {
                args.push("--if-exists".to_string());
                args.push("get".to_string());
                args.push(table.to_string());
                args.push(record.clone());
                args.push(column.clone());
            }
            NbRequest::Create { table, fields } => {
                args.push("create".to_string());
                args.push(table.to_string());
                args.extend(fields.iter().map(|(k, v)| format!("{k}={v}")));
            }
            NbRequest::Set {
                table,
                record,
                fields,
            } => {
                args.push("set".to_string());
                args.push(table.to_string());
                args.push(record.clone());
                args.extend(fields.iter().map(|(k, v)| format!("{k}={v}")));
            }
            NbRequest::Add {
                table,
                record,
                column,
                value,
            } => {
                args.push("add".to_string());
                args.push(table.to_string());
                args.push(record.clone());
                args.push(column.clone());
                args.push(value.clone());
            }
            NbRequest::LrAdd { name } => {
                args.push("--may-exist".to_string());
                args.push("lr-add".to_string());
                args.push(name.clone());
            }
            NbRequest::LsAdd { name } => {
                args.push("--may-exist".to_string());
                args.push("ls-add".to_string());
                args.push(name.clone());
            }
            NbRequest::LrpAdd {
                router,
                port,
                mac,
                network,
            } => {
                args.push("--may-exist".to_string());
                args.push("lrp-add".to_string());
                args.push(router.clone());
                args.push(port.clone());
                args.push(mac.to_string());
                args.push(network.clone());
            }
            NbRequest::LspAdd { switch, port } => {
                args.push("--may-exist".to_string());
                args.push("lsp-add".to_string());
                args.push(switch.clone());
                args.push(port.clone());
            }
            NbRequest::LspSetAddresses { port, addresses } => {
                args.push("lsp-set-addresses".to_string());
                args.push(port.clone());
                args.extend(addresses.iter().cloned());
            }
            NbRequest::LrRouteAdd {
                router,
                prefix,
                nexthop,
                out_port,
                src_policy,
            } => {
                args.push("--may-exist".to_string());
                if *src_policy {
                    args.push("--policy=src-ip".to_string());
                }
                args.push("lr-route-add".to_string());
                args.push(router.clone());
                args.push(prefix.clone());
                args.push(nexthop.to_string());
                if let Some(port) = out_port {
                    args.push(port.clone());
                }
            }
            NbRequest::LrNatAddSnat {
                router,
                external_ip,
                logical_net,
            } => {
                args.push("--may-exist".to_string());
                args.push("lr-nat-add".to_string());
                args.push(router.clone());
                args.push("snat".to_string());
                args.push(external_ip.to_string());
                args.push(logical_net.clone());
            }
        }
        args
    }
}
