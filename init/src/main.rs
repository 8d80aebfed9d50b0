// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The `overlay-init` binary: one role workflow per invocation.

#![deny(clippy::all, clippy::pedantic)]

use args::{CmdArgs, Parser, RoleCommand};
use nb::{Nb, NbCtl};
use netcfg::{detect_platform, Debian, LocalNetConfigurator, Platform, RedHat};
use std::path::Path;
use std::process::ExitCode;
use topology::{GatewayInit, MasterInit, MinionInit, TopologyError};
use tracing::{error, info};
use vswitch::{Vs, VsCtl};

const OS_RELEASE: &str = "/etc/os-release";

fn init_logging() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &CmdArgs) -> Result<(), TopologyError> {
    let mut ctl = NbCtl::new();
    if let Some(address) = args.nb_address() {
        ctl = ctl.database(address);
    }
    if let Some(tls) = args.nb_tls() {
        ctl.bootstrap_tls(&tls.certificate)?;
        ctl = ctl.tls(tls);
    }
    let nb = Nb::new(ctl);

    let platform = detect_platform(Path::new(OS_RELEASE))?;
    let netcfg: Box<dyn LocalNetConfigurator> = match platform {
        Platform::Debian => Box::new(Debian::new(Vs::new(VsCtl::new()))),
        Platform::RedHat => Box::new(RedHat::new(Vs::new(VsCtl::new()))),
    };

    match &args.role {
        RoleCommand::MasterInit(master) => {
            let cluster = master.common.cluster()?;
            MasterInit::new(&nb, netcfg.as_ref(), &cluster, master.node_subnet()).run()?;
            println!("overlay master initialization complete");
        }
        RoleCommand::MinionInit(minion) => {
            let cluster = minion.common.cluster()?;
            MinionInit::new(
                &nb,
                netcfg.as_ref(),
                &cluster,
                minion.node_subnet(),
                minion.cni_install(),
            )
            .run()?;
            println!("overlay minion initialization complete");
        }
        RoleCommand::GatewayInit(gateway) => {
            let cluster = gateway.common.cluster()?;
            let config = gateway.gateway();
            let vs = Vs::new(VsCtl::new());
            GatewayInit::new(&nb, &vs, netcfg.as_ref(), &cluster, &config).run()?;
            println!("overlay gateway initialization complete");
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    init_logging();
    let args = CmdArgs::parse();
    info!("starting overlay topology initialization");
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("initialization failed: {err}");
            let mut source = std::error::Error::source(&err);
            while let Some(cause) = source {
                error!("caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
