// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Helpers for running external commands and capturing their outcome.
//!
//! Every external protocol this tool speaks (northbound store, local
//! vswitch, OS network configuration) is command-driven; this crate owns
//! the single place where a [`std::process::Command`] is spawned, waited
//! on, and converted into a typed error carrying the full command line
//! and captured output.

#![deny(clippy::all, clippy::pedantic)]
#![forbid(unsafe_code)]

use std::process::{Command, Output};

/// Captured details of a command that ran and exited non-zero.
#[derive(Debug)]
pub struct CommandFailure {
    /// The rendered command line, program included.
    pub command: String,
    /// The process exit status.
    pub status: std::process::ExitStatus,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl std::fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "command [{}] failed with {}: stderr: {}",
            self.command,
            self.status,
            self.stderr.trim()
        )
    }
}

/// Errors produced while executing an external command.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// The process could not be spawned at all.
    #[error("failed to start [{command}]: {err}")]
    ExecutionStart {
        /// The rendered command line.
        command: String,
        /// The underlying spawn error.
        err: std::io::Error,
    },
    /// The process ran and exited non-zero.
    #[error("{0}")]
    CommandFailure(Box<CommandFailure>),
}

/// Render a command (program plus arguments) for error messages.
#[must_use]
pub fn command_to_string(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|s| s.to_string_lossy().into_owned())
        .collect::<Vec<String>>()
        .join(" ")
}

/// Build the [`ExecutionError`] for a command that exited non-zero.
#[must_use]
pub fn output_to_exec_error(command: &Command, output: &Output) -> ExecutionError {
    ExecutionError::CommandFailure(Box::new(CommandFailure {
        command: command_to_string(command),
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }))
}

/// Run a command to completion, capturing output.
///
/// # Errors
///
/// Returns [`ExecutionError::ExecutionStart`] if the process cannot be
/// spawned and [`ExecutionError::CommandFailure`] if it exits non-zero.
pub fn execute(command: &mut Command) -> Result<Output, ExecutionError> {
    let output = command
        .output()
        .map_err(|err| ExecutionError::ExecutionStart {
            command: command_to_string(command),
            err,
        })?;
    if !output.status.success() {
        return Err(output_to_exec_error(command, &output));
    }
    Ok(output)
}

/// Run a command and return its trimmed standard output.
///
/// # Errors
///
/// Same failure modes as [`execute`].
pub fn execute_stdout(command: &mut Command) -> Result<String, ExecutionError> {
    let output = execute(command)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
