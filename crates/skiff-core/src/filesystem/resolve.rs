//! Path resolution as seen from inside a root filesystem.
//!
//! Image layers routinely contain absolute symlinks (`/bin/sh ->
//! /bin/busybox`, `/bin -> /usr/bin`). Followed on the host, those point at
//! the host's files; here every link is re-anchored at the root directory.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};

use skiff_common::constants::{CONTAINER_PATH, MAX_SYMLINK_HOPS};
use skiff_common::error::{Result, SkiffError, StartFailure};

/// Resolves `path` as a process chrooted into `root` would, returning the
/// corresponding host path.
///
/// `..` never climbs above `root`, and absolute symlink targets restart
/// from `root`.
///
/// # Errors
///
/// Returns the I/O error for a missing component, or an error after
/// `MAX_SYMLINK_HOPS` symlinks.
pub fn resolve_in_root(root: &Path, path: &Path) -> io::Result<PathBuf> {
    let mut resolved: Vec<OsString> = Vec::new();
    let mut pending: VecDeque<OsString> = components(path).into();
    let mut hops = 0;

    while let Some(part) = pending.pop_front() {
        if part == ".." {
            let _ = resolved.pop();
            continue;
        }
        resolved.push(part);
        let host = host_path(root, &resolved);
        if !std::fs::symlink_metadata(&host)?.file_type().is_symlink() {
            continue;
        }

        hops += 1;
        if hops > MAX_SYMLINK_HOPS {
            return Err(io::Error::other(format!(
                "too many levels of symbolic links at {}",
                host.display()
            )));
        }
        let target = std::fs::read_link(&host)?;
        let _ = resolved.pop();
        if target.has_root() {
            resolved.clear();
        }
        for part in components(&target).into_iter().rev() {
            pending.push_front(part);
        }
    }

    Ok(host_path(root, &resolved))
}

/// Locates `command` by base name on the container search path.
///
/// Returns the in-root path (e.g. `/bin/echo`) to hand to `exec` after
/// the root change.
///
/// # Errors
///
/// Returns `SkiffError::ExecStart` with `NotFound` if no candidate exists,
/// or `NotExecutable` if the only candidates are not executable files.
pub fn locate_executable(root: &Path, command: &str) -> Result<PathBuf> {
    let not_found = || SkiffError::ExecStart {
        command: command.to_string(),
        reason: StartFailure::NotFound,
    };
    let name = Path::new(command).file_name().ok_or_else(not_found)?;

    let mut not_executable = None;
    for dir in CONTAINER_PATH.split(':') {
        let candidate = Path::new(dir).join(name);
        let Ok(host) = resolve_in_root(root, &candidate) else {
            continue;
        };
        let Ok(metadata) = std::fs::metadata(&host) else {
            continue;
        };
        if metadata.is_file() && metadata.permissions().mode() & 0o111 != 0 {
            tracing::debug!(command, path = %candidate.display(), "located executable");
            return Ok(candidate);
        }
        if not_executable.is_none() {
            not_executable = Some(candidate);
        }
    }

    match not_executable {
        Some(path) => Err(SkiffError::ExecStart {
            command: command.to_string(),
            reason: StartFailure::NotExecutable {
                path: path.display().to_string(),
            },
        }),
        None => Err(not_found()),
    }
}

fn components(path: &Path) -> Vec<OsString> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_os_string()),
            Component::ParentDir => Some(OsString::from("..")),
            Component::RootDir | Component::CurDir | Component::Prefix(_) => None,
        })
        .collect()
}

fn host_path(root: &Path, parts: &[OsString]) -> PathBuf {
    let mut path = root.to_path_buf();
    path.extend(parts);
    path
}
