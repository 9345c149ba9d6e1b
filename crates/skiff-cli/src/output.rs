//! Relaying the child's outcome to skiff's own streams and exit code.

use std::io::{self, Write};

use skiff_common::constants::EXIT_PIPELINE_FAILURE;
use skiff_common::error::SkiffError;
use skiff_common::types::ExecutionResult;

/// Writes the captured output byte for byte and flushes both streams.
///
/// # Errors
///
/// Returns the first write or flush error.
pub fn relay(
    result: &ExecutionResult,
    stdout: &mut impl Write,
    stderr: &mut impl Write,
) -> io::Result<()> {
    stdout.write_all(&result.stdout)?;
    stdout.flush()?;
    stderr.write_all(&result.stderr)?;
    stderr.flush()
}

/// Maps a child exit code onto the 0..=255 range a process can report.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub const fn exit_byte(code: i32) -> u8 {
    code.rem_euclid(256) as u8
}

/// Exit code for a run that failed before the child's outcome was known.
#[must_use]
pub fn failure_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<SkiffError>()
        .map_or(EXIT_PIPELINE_FAILURE, SkiffError::exit_code)
}
