//! Linux namespace management for command isolation.
//!
//! Provides safe wrappers around `unshare(2)` and the fork needed to
//! actually enter a fresh PID namespace.

pub mod mount;
pub mod pid;

use std::io;

use nix::sched::{CloneFlags, unshare};

/// Which namespaces to create for the executed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceConfig {
    /// Isolate PID namespace.
    pub pid: bool,
    /// Isolate mount namespace.
    pub mount: bool,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            pid: true,
            mount: true,
        }
    }
}

impl NamespaceConfig {
    /// Translates the configuration into `unshare(2)` flags.
    #[must_use]
    pub fn clone_flags(&self) -> CloneFlags {
        let mut flags = CloneFlags::empty();
        if self.pid {
            flags |= CloneFlags::CLONE_NEWPID;
        }
        if self.mount {
            flags |= CloneFlags::CLONE_NEWNS;
        }
        flags
    }
}

/// Creates all configured namespaces for the calling process.
///
/// A new PID namespace only applies to children forked afterwards; see
/// [`pid::fork_into_pid_namespace`].
///
/// # Errors
///
/// Returns the `unshare(2)` error, typically `EPERM` without
/// `CAP_SYS_ADMIN`.
pub fn create_namespaces(config: &NamespaceConfig) -> io::Result<()> {
    let flags = config.clone_flags();
    if flags.is_empty() {
        return Ok(());
    }
    unshare(flags)?;
    Ok(())
}
