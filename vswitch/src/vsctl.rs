// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Production transport: renders requests to the vswitch control binary.

use crate::client::{VsRequest, VsTransport};
use crate::VswitchError;
use std::process::Command;

/// Default vswitch control program name.
pub const DEFAULT_PROGRAM: &str = "ovs-vsctl";

/// Vswitch transport spawning the control binary per request.
#[derive(Debug, Clone)]
pub struct VsCtl {
    program: String,
}

impl Default for VsCtl {
    fn default() -> Self {
        VsCtl::new()
    }
}

impl VsCtl {
    /// Transport using the default program.
    #[must_use]
    pub fn new() -> Self {
        VsCtl {
            program: DEFAULT_PROGRAM.to_string(),
        }
    }

    /// Use a different control program.
    #[must_use]
    pub fn with_program(program: &str) -> Self {
        VsCtl {
            program: program.to_string(),
        }
    }
}

impl VsTransport for VsCtl {
    fn run(&self, request: &VsRequest) -> Result<String, VswitchError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(request.to_args());
        Ok(exec::execute_stdout(&mut cmd)?)
    }
}
