// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! In-memory northbound store for tests.
//!
//! [`FakeNb`] interprets every [`NbRequest`] against plain tables with
//! the same create-if-absent / if-exists semantics the real store
//! client provides, so workflow tests can run end-to-end and assert the
//! final store state. Only the semantics this tool relies on are
//! modeled.

use crate::client::NbTransport;
use crate::request::{Clause, NbRequest, NbTable};
use crate::NbError;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

/// Columns holding sets rather than scalars.
const SET_COLUMNS: [&str; 2] = ["load_balancer", "addresses"];

/// One record of the fake store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    /// Record id.
    pub uuid: String,
    /// Scalar columns, map entries flattened to `map:key` form.
    pub fields: BTreeMap<String, String>,
    /// Set-valued columns.
    pub sets: BTreeMap<String, BTreeSet<String>>,
}

impl Row {
    /// The record's `name` column.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.field("name")
    }

    /// A scalar column or flattened map entry.
    #[must_use]
    pub fn field(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    fn column_text(&self, column: &str) -> String {
        if column == "_uuid" {
            return self.uuid.clone();
        }
        if let Some(value) = self.fields.get(column) {
            return value.clone();
        }
        if let Some(set) = self.sets.get(column) {
            return set.iter().cloned().collect::<Vec<_>>().join(" ");
        }
        String::new()
    }

    fn matches(&self, clause: &Clause) -> bool {
        match clause {
            Clause::Eq { column, value } => {
                self.fields.get(column) == Some(value)
                    || self.sets.get(column).is_some_and(|s| s.contains(value))
            }
            Clause::NotEmpty { column } => {
                self.fields.get(column).is_some_and(|v| !v.is_empty())
                    || self.sets.get(column).is_some_and(|s| !s.is_empty())
            }
        }
    }
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<NbTable, Vec<Row>>,
    next_id: u64,
}

impl State {
    fn new_uuid(&mut self) -> String {
        self.next_id += 1;
        format!("uuid-{}", self.next_id)
    }

    fn rows(&mut self, table: NbTable) -> &mut Vec<Row> {
        self.tables.entry(table).or_default()
    }

    fn lookup(&mut self, table: NbTable, record: &str) -> Option<&mut Row> {
        self.rows(table)
            .iter_mut()
            .find(|row| row.uuid == record || row.name() == Some(record))
    }

    fn require(&mut self, table: NbTable, record: &str) -> Result<&mut Row, NbError> {
        if self.lookup(table, record).is_none() {
            return Err(NbError::NoSuchRecord {
                table,
                record: record.to_string(),
            });
        }
        Ok(self
            .lookup(table, record)
            .unwrap_or_else(|| unreachable!()))
    }

    fn insert_named(&mut self, table: NbTable, name: &str) -> bool {
        if self.lookup(table, name).is_some() {
            return false;
        }
        let uuid = self.new_uuid();
        let mut row = Row {
            uuid,
            ..Row::default()
        };
        row.fields.insert("name".to_string(), name.to_string());
        self.rows(table).push(row);
        true
    }

    fn apply_field(row: &mut Row, column: &str, value: &str) {
        if SET_COLUMNS.contains(&column) {
            row.sets
                .insert(column.to_string(), BTreeSet::from([value.to_string()]));
        } else {
            row.fields.insert(column.to_string(), value.to_string());
        }
    }
}

/// In-memory transport interpreting northbound requests.
#[derive(Debug, Default)]
pub struct FakeNb {
    state: Mutex<State>,
}

impl FakeNb {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        FakeNb::default()
    }

    /// Clone of every row of a table.
    #[must_use]
    pub fn rows(&self, table: NbTable) -> Vec<Row> {
        let mut state = self.lock();
        state.rows(table).clone()
    }

    /// Clone of the named record of a table.
    #[must_use]
    pub fn row_by_name(&self, table: NbTable, name: &str) -> Option<Row> {
        let mut state = self.lock();
        state.lookup(table, name).map(|row| row.clone())
    }

    /// Number of rows in a table.
    #[must_use]
    pub fn count(&self, table: NbTable) -> usize {
        self.rows(table).len()
    }

    /// Full copy of the store, for whole-state idempotence comparisons.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<NbTable, Vec<Row>> {
        self.lock().tables.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("fake store poisoned")
    }
}

impl NbTransport for FakeNb {
    #[allow(clippy::too_many_lines)]
    fn run(&self, request: &NbRequest) -> Result<String, NbError> {
        let mut state = self.lock();
        match request {
            NbRequest::Find {
                table,
                column,
                clauses,
            } => {
                let out: Vec<String> = state
                    .rows(*table)
                    .iter()
                    .filter(|row| clauses.iter().all(|c| row.matches(c)))
                    .map(|row| row.column_text(column))
                    .collect();
                Ok(out.join("\n"))
            }
            NbRequest::Get {
                table,
                record,
                column,
            } => match state.lookup(*table, record) {
                Some(row) => Ok(row.column_text(column)),
                None => Ok(String::new()),
            },
            NbRequest::Create { table, fields } => {
                let uuid = state.new_uuid();
                let mut row = Row {
                    uuid: uuid.clone(),
                    ..Row::default()
                };
                for (column, value) in fields {
                    State::apply_field(&mut row, column, value);
                }
                state.rows(*table).push(row);
                Ok(uuid)
            }
            NbRequest::Set {
                table,
                record,
                fields,
            } => {
                let row = state.require(*table, record)?;
                for (column, value) in fields {
                    State::apply_field(row, column, value);
                }
                Ok(String::new())
            }
            NbRequest::Add {
                table,
                record,
                column,
                value,
            } => {
                let row = state.require(*table, record)?;
                row.sets
                    .entry(column.clone())
                    .or_default()
                    .insert(value.clone());
                Ok(String::new())
            }
            NbRequest::LrAdd { name } => {
                state.insert_named(NbTable::LogicalRouter, name);
                Ok(String::new())
            }
            NbRequest::LsAdd { name } => {
                state.insert_named(NbTable::LogicalSwitch, name);
                Ok(String::new())
            }
            NbRequest::LrpAdd {
                router,
                port,
                mac,
                network,
            } => {
                state.require(NbTable::LogicalRouter, router)?;
                if state.insert_named(NbTable::LogicalRouterPort, port) {
                    let row = state.require(NbTable::LogicalRouterPort, port)?;
                    row.fields.insert("mac".to_string(), mac.to_string());
                    row.fields.insert("networks".to_string(), network.clone());
                    let port_uuid = row.uuid.clone();
                    let owner = state.require(NbTable::LogicalRouter, router)?;
                    owner
                        .sets
                        .entry("ports".to_string())
                        .or_default()
                        .insert(port_uuid);
                }
                Ok(String::new())
            }
            NbRequest::LspAdd { switch, port } => {
                state.require(NbTable::LogicalSwitch, switch)?;
                if state.insert_named(NbTable::LogicalSwitchPort, port) {
                    let port_uuid = state
                        .require(NbTable::LogicalSwitchPort, port)?
                        .uuid
                        .clone();
                    let owner = state.require(NbTable::LogicalSwitch, switch)?;
                    owner
                        .sets
                        .entry("ports".to_string())
                        .or_default()
                        .insert(port_uuid);
                }
                Ok(String::new())
            }
            NbRequest::LspSetAddresses { port, addresses } => {
                let row = state.require(NbTable::LogicalSwitchPort, port)?;
                row.sets
                    .insert("addresses".to_string(), addresses.iter().cloned().collect());
                Ok(String::new())
            }
            NbRequest::LrRouteAdd {
                router,
                prefix,
                nexthop,
                out_port,
                src_policy,
            } => {
                state.require(NbTable::LogicalRouter, router)?;
                let policy = if *src_policy { "src-ip" } else { "dst-ip" };
                let exists = state.rows(NbTable::LogicalRouterStaticRoute).iter().any(
                    |row| {
                        row.field("router") == Some(router)
                            && row.field("ip_prefix") == Some(prefix)
                            && row.field("policy") == Some(policy)
                    },
                );
                if !exists {
                    let uuid = state.new_uuid();
                    let mut row = Row {
                        uuid,
                        ..Row::default()
                    };
                    row.fields.insert("router".to_string(), router.clone());
                    row.fields.insert("ip_prefix".to_string(), prefix.clone());
                    row.fields
                        .insert("nexthop".to_string(), nexthop.to_string());
                    row.fields.insert("policy".to_string(), policy.to_string());
                    if let Some(port) = out_port {
                        row.fields.insert("output_port".to_string(), port.clone());
                    }
                    state.rows(NbTable::LogicalRouterStaticRoute).push(row);
                }
                Ok(String::new())
            }
            NbRequest::LrNatAddSnat {
                router,
                external_ip,
                logical_net,
            } => {
                state.require(NbTable::LogicalRouter, router)?;
                let exists = state.rows(NbTable::Nat).iter().any(|row| {
                    row.field("router") == Some(router)
                        && row.field("type") == Some("snat")
                        && row.field("logical_ip") == Some(logical_net)
                });
                if !exists {
                    let uuid = state.new_uuid();
                    let mut row = Row {
                        uuid,
                        ..Row::default()
                    };
                    row.fields.insert("router".to_string(), router.clone());
                    row.fields.insert("type".to_string(), "snat".to_string());
                    row.fields
                        .insert("external_ip".to_string(), external_ip.to_string());
                    row.fields
                        .insert("logical_ip".to_string(), logical_net.clone());
                    state.rows(NbTable::Nat).push(row);
                }
                Ok(String::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Nb;
    use pretty_assertions::assert_eq;

    #[test]
    fn lr_add_is_idempotent() {
        let nb = Nb::new(FakeNb::new());
        nb.lr_add("cluster-router").unwrap();
        nb.lr_add("cluster-router").unwrap();
        assert_eq!(nb.transport().count(NbTable::LogicalRouter), 1);
    }

    #[test]
    fn lrp_add_requires_the_router() {
        let nb = Nb::new(FakeNb::new());
        let mac = "0a:58:01:02:03:04".parse().unwrap();
        let err = nb
            .lrp_add("missing", "rtos-m1", mac, "10.1.0.1/24")
            .unwrap_err();
        assert!(matches!(err, NbError::NoSuchRecord { .. }));
    }

    #[test]
    fn lrp_add_keeps_first_mac_on_rerun() {
        let nb = Nb::new(FakeNb::new());
        nb.lr_add("cluster-router").unwrap();
        let first = "0a:58:01:02:03:04".parse().unwrap();
        let second = "0a:58:ff:ff:ff:ff".parse().unwrap();
        nb.lrp_add("cluster-router", "rtos-m1", first, "10.1.0.1/24")
            .unwrap();
        nb.lrp_add("cluster-router", "rtos-m1", second, "10.1.0.1/24")
            .unwrap();
        let got = nb
            .get_field(NbTable::LogicalRouterPort, "rtos-m1", "mac")
            .unwrap();
        assert_eq!(got, Some(first.to_string()));
    }

    #[test]
    fn find_matches_flattened_map_entries() {
        let nb = Nb::new(FakeNb::new());
        nb.create(
            NbTable::LoadBalancer,
            &[("external_ids:cluster-lb-tcp", "yes"), ("protocol", "tcp")],
        )
        .unwrap();
        let uuid = nb
            .find_uuid(
                NbTable::LoadBalancer,
                vec![Clause::eq("external_ids:cluster-lb-tcp", "yes")],
            )
            .unwrap();
        assert!(uuid.is_some());
    }

    #[test]
    fn set_then_add_builds_a_two_element_set() {
        let nb = Nb::new(FakeNb::new());
        nb.ls_add("m1").unwrap();
        nb.set(NbTable::LogicalSwitch, "m1", &[("load_balancer", "uuid-tcp")])
            .unwrap();
        nb.add(NbTable::LogicalSwitch, "m1", "load_balancer", "uuid-udp")
            .unwrap();
        let row = nb
            .transport()
            .row_by_name(NbTable::LogicalSwitch, "m1")
            .unwrap();
        assert_eq!(row.sets["load_balancer"].len(), 2);
    }

    #[test]
    fn routes_deduplicate_on_router_prefix_and_policy() {
        let nb = Nb::new(FakeNb::new());
        nb.lr_add("gr").unwrap();
        let hop = "100.64.1.1".parse().unwrap();
        nb.lr_route_add("gr", "10.0.0.0/14", hop, None).unwrap();
        nb.lr_route_add("gr", "10.0.0.0/14", hop, None).unwrap();
        nb.lr_route_add_src("gr", "10.0.0.0/14", hop).unwrap();
        assert_eq!(nb.transport().count(NbTable::LogicalRouterStaticRoute), 2);
    }
}
