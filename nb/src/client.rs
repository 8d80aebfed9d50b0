// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Typed client over an [`NbTransport`].
//!
//! [`Nb`] owns response parsing: bare output rows, quoted scalars and
//! bracketed sets all normalize to plain tokens before workflows see
//! them. Not-found is an explicit `None`, never a sentinel string.

use crate::request::{Clause, NbRequest, NbTable};
use crate::NbError;
use ipam::Mac;
use std::net::Ipv4Addr;
use tracing::debug;

/// Transport seam for the northbound store.
///
/// Implementations execute one typed request and answer raw output:
/// the production transport spawns the store client binary, the testing
/// transport interprets the request against in-memory tables.
pub trait NbTransport {
    /// Execute one request, answering its raw output.
    fn run(&self, request: &NbRequest) -> Result<String, NbError>;
}

/// Typed client for the northbound store.
#[derive(Debug)]
pub struct Nb<T> {
    transport: T,
}

/// Strip quoting and set brackets from a raw store value and split it
/// into plain tokens.
fn tokens(raw: &str) -> Vec<String> {
    raw.split(|c: char| c.is_whitespace() || c == ',')
        .map(|tok| tok.trim_matches(|c| c == '[' || c == ']' || c == '"'))
        .filter(|tok| !tok.is_empty())
        .map(str::to_string)
        .collect()
}

impl<T: NbTransport> Nb<T> {
    /// Wrap a transport.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Nb { transport }
    }

    /// Access the underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn run(&self, request: &NbRequest) -> Result<String, NbError> {
        debug!("nb: {:?}", request.to_args().join(" "));
        self.transport.run(request)
    }

    /// Find the uuid of the first record matching all clauses.
    pub fn find_uuid(
        &self,
        table: NbTable,
        clauses: Vec<Clause>,
    ) -> Result<Option<String>, NbError> {
        let raw = self.run(&NbRequest::Find {
            table,
            column: "_uuid".to_string(),
            clauses,
        })?;
        Ok(tokens(&raw).into_iter().next())
    }

    /// Return one column of every record matching all clauses, set
    /// values flattened to individual tokens.
    pub fn find_values(
        &self,
        table: NbTable,
        column: &str,
        clauses: Vec<Clause>,
    ) -> Result<Vec<String>, NbError> {
        let raw = self.run(&NbRequest::Find {
            table,
            column: column.to_string(),
            clauses,
        })?;
        Ok(tokens(&raw))
    }

    /// Read one field of one record; `None` when the record is absent
    /// or the field is empty.
    pub fn get_field(
        &self,
        table: NbTable,
        record: &str,
        column: &str,
    ) -> Result<Option<String>, NbError> {
        let raw = self.run(&NbRequest::Get {
            table,
            record: record.to_string(),
            column: column.to_string(),
        })?;
        let toks = tokens(&raw);
        if toks.is_empty() {
            return Ok(None);
        }
        Ok(Some(toks.join(" ")))
    }

    /// Create a record, answering its uuid.
    pub fn create(&self, table: NbTable, fields: &[(&str, &str)]) -> Result<String, NbError> {
        let raw = self.run(&NbRequest::Create {
            table,
            fields: owned(fields),
        })?;
        tokens(&raw)
            .into_iter()
            .next()
            .ok_or_else(|| NbError::BadResponse(format!("create {table} answered no uuid")))
    }

    /// Overwrite fields of an existing record.
    pub fn set(&self, table: NbTable, record: &str, fields: &[(&str, &str)]) -> Result<(), NbError> {
        self.run(&NbRequest::Set {
            table,
            record: record.to_string(),
            fields: owned(fields),
        })?;
        Ok(())
    }

    /// Add a value to a set-valued column of an existing record.
    pub fn add(
        &self,
        table: NbTable,
        record: &str,
        column: &str,
        value: &str,
    ) -> Result<(), NbError> {
        self.run(&NbRequest::Add {
            table,
            record: record.to_string(),
            column: column.to_string(),
            value: value.to_string(),
        })?;
        Ok(())
    }

    /// Create a logical router if absent.
    pub fn lr_add(&self, name: &str) -> Result<(), NbError> {
        self.run(&NbRequest::LrAdd {
            name: name.to_string(),
        })?;
        Ok(())
    }

    /// Create a logical switch if absent.
    pub fn ls_add(&self, name: &str) -> Result<(), NbError> {
        self.run(&NbRequest::LsAdd {
            name: name.to_string(),
        })?;
        Ok(())
    }

    /// Create a router port if absent.
    pub fn lrp_add(&self, router: &str, port: &str, mac: Mac, network: &str) -> Result<(), NbError> {
        self.run(&NbRequest::LrpAdd {
            router: router.to_string(),
            port: port.to_string(),
            mac,
            network: network.to_string(),
        })?;
        Ok(())
    }

    /// Create a switch port if absent.
    pub fn lsp_add(&self, switch: &str, port: &str) -> Result<(), NbError> {
        self.run(&NbRequest::LspAdd {
            switch: switch.to_string(),
            port: port.to_string(),
        })?;
        Ok(())
    }

    /// Replace the address set of a switch port.
    pub fn lsp_set_addresses(&self, port: &str, addresses: &[String]) -> Result<(), NbError> {
        self.run(&NbRequest::LspSetAddresses {
            port: port.to_string(),
            addresses: addresses.to_vec(),
        })?;
        Ok(())
    }

    /// Install a destination route on a router if absent.
    pub fn lr_route_add(
        &self,
        router: &str,
        prefix: &str,
        nexthop: Ipv4Addr,
        out_port: Option<&str>,
    ) -> Result<(), NbError> {
        self.run(&NbRequest::LrRouteAdd {
            router: router.to_string(),
            prefix: prefix.to_string(),
            nexthop,
            out_port: out_port.map(str::to_string),
            src_policy: false,
        })?;
        Ok(())
    }

    /// Install a source-scoped (rampout) route on a router if absent.
    pub fn lr_route_add_src(
        &self,
        router: &str,
        prefix: &str,
        nexthop: Ipv4Addr,
    ) -> Result<(), NbError> {
        self.run(&NbRequest::LrRouteAdd {
            router: router.to_string(),
            prefix: prefix.to_string(),
            nexthop,
            out_port: None,
            src_policy: true,
        })?;
        Ok(())
    }

    /// Install a SNAT rule on a router if absent.
    pub fn lr_nat_add_snat(
        &self,
        router: &str,
        external_ip: Ipv4Addr,
        logical_net: &str,
    ) -> Result<(), NbError> {
        self.run(&NbRequest::LrNatAddSnat {
            router: router.to_string(),
            external_ip,
            logical_net: logical_net.to_string(),
        })?;
        Ok(())
    }
}

fn owned(fields: &[(&str, &str)]) -> Vec<(String, String)> {
    fields
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    /// Transport canned with one response, recording the request.
    struct Canned {
        response: String,
        seen: RefCell<Vec<NbRequest>>,
    }

    impl Canned {
        fn new(response: &str) -> Self {
            Canned {
                response: response.to_string(),
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl NbTransport for Canned {
        fn run(&self, request: &NbRequest) -> Result<String, NbError> {
            self.seen.borrow_mut().push(request.clone());
            Ok(self.response.clone())
        }
    }

    #[test]
    fn get_field_normalizes_quoted_scalar() {
        let nb = Nb::new(Canned::new("\"0a:58:01:02:03:04\"\n"));
        let got = nb
            .get_field(NbTable::LogicalRouterPort, "rtoj-GR_g1", "mac")
            .unwrap();
        assert_eq!(got, Some("0a:58:01:02:03:04".to_string()));
    }

    #[test]
    fn get_field_normalizes_bracketed_set() {
        let nb = Nb::new(Canned::new("[\"100.64.1.3/24\"]"));
        let got = nb
            .get_field(NbTable::LogicalRouterPort, "rtoj-GR_g1", "networks")
            .unwrap();
        assert_eq!(got, Some("100.64.1.3/24".to_string()));
    }

    #[test]
    fn get_field_maps_absence_to_none() {
        for empty in ["", "\n", "[]"] {
            let nb = Nb::new(Canned::new(empty));
            let got = nb
                .get_field(NbTable::LogicalRouterPort, "rtoj-GR_g1", "networks")
                .unwrap();
            assert_eq!(got, None, "for raw {empty:?}");
        }
    }

    #[test]
    fn find_values_flattens_rows_and_sets() {
        let nb = Nb::new(Canned::new("100.64.1.1/24\n100.64.1.2/24 100.64.1.3/24\n"));
        let got = nb
            .find_values(
                NbTable::LogicalRouterPort,
                "networks",
                vec![Clause::eq("external_ids:connect-to-join", "yes")],
            )
            .unwrap();
        assert_eq!(got, ["100.64.1.1/24", "100.64.1.2/24", "100.64.1.3/24"]);
    }

    #[test]
    fn find_uuid_takes_first_row() {
        let nb = Nb::new(Canned::new("uuid-1\nuuid-2\n"));
        let got = nb.find_uuid(NbTable::LogicalRouter, vec![]).unwrap();
        assert_eq!(got, Some("uuid-1".to_string()));
    }

    #[test]
    fn create_without_uuid_is_bad_response() {
        let nb = Nb::new(Canned::new(""));
        let err = nb.create(NbTable::LoadBalancer, &[]).unwrap_err();
        assert!(matches!(err, NbError::BadResponse(_)));
    }
}
