//! Pseudo-filesystem mounts inside the root filesystem.

use std::io;
use std::path::Path;

use nix::mount::{MsFlags, mount};

/// Mounts a fresh `proc` filesystem at `target`.
///
/// Mounted from inside a new PID namespace, it shows only that
/// namespace's processes.
///
/// # Errors
///
/// Returns the `mount(2)` error.
pub fn mount_proc(target: &Path) -> io::Result<()> {
    mount(
        Some("proc"),
        target,
        Some("proc"),
        MsFlags::MS_NOSUID | MsFlags::MS_NODEV | MsFlags::MS_NOEXEC,
        None::<&str>,
    )?;
    Ok(())
}
