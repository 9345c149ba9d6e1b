//! Conversion of a finished child process into an [`ExecutionResult`].

use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Output};

use skiff_common::types::ExecutionResult;

/// Builds the result of a finished command, keeping output byte-exact.
#[must_use]
pub fn collect(output: Output) -> ExecutionResult {
    ExecutionResult {
        exit_code: exit_code(output.status),
        stdout: output.stdout,
        stderr: output.stderr,
    }
}

/// Returns the exit code of `status`, or `128 + signal` if it was killed.
#[must_use]
pub fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}
