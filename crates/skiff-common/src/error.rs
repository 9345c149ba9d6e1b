//! Unified error type for the skiff pipeline.
//!
//! Each variant names the stage that failed. Every one of them is fatal to
//! the run: nothing in the pipeline retries or recovers locally, the error
//! travels up with `?` and is reported once by the binary.

use std::path::PathBuf;

use thiserror::Error;

use crate::constants::{EXIT_NOT_EXECUTABLE, EXIT_NOT_FOUND, EXIT_PIPELINE_FAILURE};

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum SkiffError {
    /// A pull token could not be obtained.
    #[error("authentication failed for {repository}: {message}")]
    Auth {
        /// Repository the token was requested for.
        repository: String,
        /// Description of the failure.
        message: String,
    },

    /// The manifest is missing or does not have the expected shape.
    #[error("manifest error for {reference}: {message}")]
    Manifest {
        /// `repository:tag` that was requested.
        reference: String,
        /// Description of the failure.
        message: String,
    },

    /// A layer blob could not be downloaded or failed verification.
    #[error("failed to fetch blob {digest}: {message}")]
    BlobFetch {
        /// Digest of the blob.
        digest: String,
        /// Description of the failure.
        message: String,
    },

    /// A layer archive is malformed or tried to escape the target directory.
    #[error("failed to extract layer {digest}: {message}")]
    Extraction {
        /// Digest of the layer being extracted.
        digest: String,
        /// Description of the failure.
        message: String,
    },

    /// The command could not be started inside the isolated root.
    #[error("cannot start {command}: {reason}")]
    ExecStart {
        /// Command as requested by the caller.
        command: String,
        /// Why the start failed.
        reason: StartFailure,
    },

    /// The operating system could not report on the child process.
    #[error("failed to wait on {command}: {source}")]
    ExecRuntime {
        /// Command as requested by the caller.
        command: String,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// An I/O operation on local scratch storage failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value or image reference is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },
}

/// Reason a command could not be started.
#[derive(Debug, Error)]
pub enum StartFailure {
    /// No file with the command's name on the container search path.
    #[error("executable not found in root filesystem")]
    NotFound,
    /// The file exists but is not an executable regular file.
    #[error("{path} is not executable")]
    NotExecutable {
        /// In-root path of the offending file.
        path: String,
    },
    /// Namespace creation, mount setup, or the root change failed.
    #[error("isolation setup failed: {0}")]
    Isolation(#[source] std::io::Error),
}

impl SkiffError {
    /// Process exit code reported when this error aborts a run.
    ///
    /// Follows the shell convention for commands that cannot be found
    /// (127) or executed (126); everything else is 125.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::ExecStart {
                reason: StartFailure::NotFound,
                ..
            } => EXIT_NOT_FOUND,
            Self::ExecStart {
                reason: StartFailure::NotExecutable { .. },
                ..
            } => EXIT_NOT_EXECUTABLE,
            _ => EXIT_PIPELINE_FAILURE,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, SkiffError>;
