//! Mount namespace isolation.
//!
//! Gives the command its own mount table so mounts made for it never
//! propagate back to the host.

use std::io;

use nix::mount::{MsFlags, mount};

/// Marks every mount in the current namespace as private, recursively.
///
/// Call right after `unshare(CLONE_NEWNS)`: on systemd hosts `/` is shared
/// and later mounts would otherwise propagate to the parent namespace.
///
/// # Errors
///
/// Returns the `mount(2)` error.
pub fn make_mounts_private() -> io::Result<()> {
    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_REC | MsFlags::MS_PRIVATE,
        None::<&str>,
    )?;
    Ok(())
}
