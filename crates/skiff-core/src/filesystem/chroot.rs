//! Root filesystem switching via `chroot(2)`.

use std::io;
use std::path::Path;

use nix::unistd::{chdir, chroot};

/// Makes `new_root` the filesystem root of the calling process.
///
/// The working directory is moved to the new `/` so no handle to the old
/// tree survives through the cwd.
///
/// # Errors
///
/// Returns the `chroot(2)` or `chdir(2)` error.
pub fn change_root(new_root: &Path) -> io::Result<()> {
    chroot(new_root)?;
    chdir("/")?;
    Ok(())
}
