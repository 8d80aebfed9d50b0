// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Production transport: renders requests to the store client binary.

use crate::client::NbTransport;
use crate::request::{NbRequest, NbTable};
use crate::NbError;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Default store client program name.
pub const DEFAULT_PROGRAM: &str = "ovn-nbctl";

/// TLS material for the store connection.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Client private key file.
    pub private_key: PathBuf,
    /// Client certificate file.
    pub certificate: PathBuf,
    /// CA certificate file.
    pub ca_cert: PathBuf,
}

/// Store transport spawning an `ovn-nbctl`-compatible binary per request.
#[derive(Debug, Clone)]
pub struct NbCtl {
    program: String,
    database: Option<String>,
    tls: Option<TlsConfig>,
}

impl Default for NbCtl {
    fn default() -> Self {
        NbCtl::new()
    }
}

impl NbCtl {
    /// Transport using the default program, local connection.
    #[must_use]
    pub fn new() -> Self {
        NbCtl {
            program: DEFAULT_PROGRAM.to_string(),
            database: None,
            tls: None,
        }
    }

    /// Use a different client program.
    #[must_use]
    pub fn with_program(program: &str) -> Self {
        NbCtl {
            program: program.to_string(),
            database: None,
            tls: None,
        }
    }

    /// Point the transport at a remote store address.
    #[must_use]
    pub fn database(mut self, address: &str) -> Self {
        self.database = Some(address.to_string());
        self
    }

    /// Present TLS material on every request.
    #[must_use]
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    fn base_command(&self, with_tls: bool) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(db) = &self.database {
            cmd.arg(format!("--db={db}"));
        }
        if with_tls && let Some(tls) = &self.tls {
            cmd.arg(format!("-p{}", tls.private_key.display()));
            cmd.arg(format!("-c{}", tls.certificate.display()));
            cmd.arg(format!("-C{}", tls.ca_cert.display()));
        }
        cmd
    }

    /// Trigger server-side credential bootstrap.
    ///
    /// A certificate-less probe query is issued purely for its side
    /// effect on the server; its outcome is deliberately ignored.
    /// Success is inferred from the certificate file existing
    /// afterwards. Safe to call when the certificate is already in
    /// place.
    ///
    /// # Errors
    ///
    /// [`NbError::TlsBootstrap`] when the certificate file still does
    /// not exist after the probe.
    pub fn bootstrap_tls(&self, certificate: &Path) -> Result<(), NbError> {
        if certificate.exists() {
            return Ok(());
        }
        info!("bootstrapping store credentials via certificate-less probe");
        let probe = NbRequest::Find {
            table: NbTable::LogicalRouter,
            column: "_uuid".to_string(),
            clauses: vec![],
        };
        let mut cmd = self.base_command(false);
        cmd.args(probe.to_args());
        // outcome intentionally ignored; the probe exists only to make
        // the server mint our credentials
        if let Err(err) = exec::execute(&mut cmd) {
            debug!("bootstrap probe failed (ignored): {err}");
        }
        if certificate.exists() {
            Ok(())
        } else {
            Err(NbError::TlsBootstrap(certificate.to_path_buf()))
        }
    }
}

impl NbTransport for NbCtl {
    fn run(&self, request: &NbRequest) -> Result<String, NbError> {
        let mut cmd = self.base_command(true);
        cmd.args(request.to_args());
        Ok(exec::execute_stdout(&mut cmd)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_is_a_no_op_when_certificate_exists() {
        // the probe would fail loudly with a missing program; an
        // existing certificate must short-circuit before that
        let dir = std::env::temp_dir();
        let cert = dir.join("overlay-nb-bootstrap-test.pem");
        std::fs::write(&cert, "cert").unwrap();
        let ctl = NbCtl::with_program("/nonexistent/overlay-nbctl");
        ctl.bootstrap_tls(&cert).unwrap();
        std::fs::remove_file(&cert).unwrap();
    }

    #[test]
    fn bootstrap_swallows_probe_failure_and_reports_missing_certificate() {
        let ctl = NbCtl::with_program("/nonexistent/overlay-nbctl");
        let missing = Path::new("/nonexistent/overlay-nb-cert.pem");
        let err = ctl.bootstrap_tls(missing).unwrap_err();
        assert!(matches!(err, NbError::TlsBootstrap(_)));
    }
}
