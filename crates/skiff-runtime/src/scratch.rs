//! Per-run scratch directory.
//!
//! Holds the merged root filesystem and the blob download area. The whole
//! tree is removed when the [`ScratchSpace`] is dropped, on success and on
//! every error path.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use skiff_common::constants::{BLOBS_DIR_NAME, ROOTFS_DIR_NAME, SCRATCH_PREFIX};
use skiff_common::error::{Result, SkiffError};

/// Temporary directory exclusively owned by one run.
#[derive(Debug)]
pub struct ScratchSpace {
    dir: TempDir,
    rootfs: PathBuf,
    blobs: PathBuf,
}

impl ScratchSpace {
    /// Creates a fresh scratch directory under `base`, or under the system
    /// temporary directory when `base` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `SkiffError::Io` if any of the directories cannot be created.
    pub fn create(base: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        let _ = builder.prefix(SCRATCH_PREFIX);
        let dir = match base {
            Some(base) => {
                std::fs::create_dir_all(base).map_err(|e| io_error(base, e))?;
                builder.tempdir_in(base).map_err(|e| io_error(base, e))?
            }
            None => builder
                .tempdir()
                .map_err(|e| io_error(&std::env::temp_dir(), e))?,
        };

        let rootfs = dir.path().join(ROOTFS_DIR_NAME);
        let blobs = dir.path().join(BLOBS_DIR_NAME);
        for path in [&rootfs, &blobs] {
            std::fs::create_dir(path).map_err(|e| io_error(path, e))?;
        }
        // Becomes `/` for the command; tempdirs are created 0700.
        std::fs::set_permissions(&rootfs, std::fs::Permissions::from_mode(0o755))
            .map_err(|e| io_error(&rootfs, e))?;

        tracing::debug!(path = %dir.path().display(), "scratch space created");
        Ok(Self { dir, rootfs, blobs })
    }

    /// Returns the scratch directory itself.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the directory the layers are merged into.
    #[must_use]
    pub fn rootfs_dir(&self) -> &Path {
        &self.rootfs
    }

    /// Returns the directory blob downloads are staged in.
    #[must_use]
    pub fn blobs_dir(&self) -> &Path {
        &self.blobs
    }

    /// Removes the scratch directory, reporting any failure.
    ///
    /// Dropping the value also removes it, but silently.
    ///
    /// # Errors
    ///
    /// Returns `SkiffError::Io` if the tree cannot be removed completely.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|e| io_error(&path, e))?;
        tracing::debug!(path = %path.display(), "scratch space removed");
        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> SkiffError {
    SkiffError::Io {
        path: path.to_path_buf(),
        source,
    }
}
