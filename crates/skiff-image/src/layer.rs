//! Filesystem layer materialization.
//!
//! Layers are applied one at a time, in manifest order, into a single
//! target directory: a later layer overwrites whatever an earlier one wrote
//! at the same path. Whiteout markers are extracted as ordinary files.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Component, Path};

use tempfile::NamedTempFile;

use skiff_common::error::{Result, SkiffError};
use skiff_common::types::{AuthToken, LayerDigest};

use crate::hash::{BlobHasher, verify_digest};
use crate::registry::Registry;

/// Gzip magic bytes.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Download buffer size.
const CHUNK_SIZE: usize = 64 * 1024;

/// Downloads layer blobs and applies them to a root filesystem.
pub struct LayerMaterializer<'a, R: Registry + ?Sized> {
    registry: &'a R,
    scratch_dir: &'a Path,
}

impl<'a, R: Registry + ?Sized> LayerMaterializer<'a, R> {
    /// Creates a materializer that downloads through `registry` into
    /// temporary files under `scratch_dir`.
    pub const fn new(registry: &'a R, scratch_dir: &'a Path) -> Self {
        Self {
            registry,
            scratch_dir,
        }
    }

    /// Fetches and extracts every layer of `digests`, strictly in order.
    ///
    /// Each blob lands in its own scratch file, which is removed once the
    /// layer is extracted. On failure `target_dir` is left as is; the
    /// caller owns and discards it.
    ///
    /// # Errors
    ///
    /// Returns `SkiffError::BlobFetch` if a blob cannot be downloaded or
    /// fails verification, `SkiffError::Extraction` if an archive is
    /// malformed or contains an entry escaping `target_dir`, and
    /// `SkiffError::Io` on local storage failures.
    pub fn materialize(
        &self,
        repository: &str,
        digests: &[LayerDigest],
        token: &AuthToken,
        target_dir: &Path,
    ) -> Result<()> {
        for dir in [target_dir, self.scratch_dir] {
            std::fs::create_dir_all(dir).map_err(|e| SkiffError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }

        for (index, digest) in digests.iter().enumerate() {
            tracing::info!(
                layer = index + 1,
                total = digests.len(),
                digest = %digest,
                "applying layer"
            );
            let blob = self.download(repository, digest, token)?;
            let entries = extract_layer(blob.path(), digest, target_dir)?;
            tracing::debug!(digest = %digest, entries, "layer applied");
        }
        Ok(())
    }

    /// Streams one blob into a scratch file, hashing it on the way.
    fn download(
        &self,
        repository: &str,
        digest: &LayerDigest,
        token: &AuthToken,
    ) -> Result<NamedTempFile> {
        let mut stream = self.registry.fetch_blob(repository, digest, token)?;
        let mut file = NamedTempFile::new_in(self.scratch_dir).map_err(|e| SkiffError::Io {
            path: self.scratch_dir.to_path_buf(),
            source: e,
        })?;
        let io_error = |e: std::io::Error, file: &NamedTempFile| SkiffError::Io {
            path: file.path().to_path_buf(),
            source: e,
        };

        let mut hasher = BlobHasher::new();
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut size = 0u64;
        loop {
            let n = match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(SkiffError::BlobFetch {
                        digest: digest.to_string(),
                        message: format!("transfer interrupted: {e}"),
                    });
                }
            };
            hasher.update(&buf[..n]);
            file.write_all(&buf[..n]).map_err(|e| io_error(e, &file))?;
            size += n as u64;
        }
        file.flush().map_err(|e| io_error(e, &file))?;

        verify_digest(digest, &hasher.finish())?;
        tracing::debug!(digest = %digest, size, "blob downloaded");
        Ok(file)
    }
}

/// Extracts one layer archive into `target`.
///
/// Supports plain tar and gzip-compressed tar, told apart by their magic
/// bytes. Every entry is checked before it is written: absolute paths and
/// `..` components (in the entry name, or in a hard link's target) abort
/// the extraction. Returns the number of entries written.
///
/// # Errors
///
/// Returns `SkiffError::Extraction` if the archive is malformed or an entry
/// is rejected, and `SkiffError::Io` if the archive cannot be opened.
pub fn extract_layer(archive_path: &Path, digest: &LayerDigest, target: &Path) -> Result<usize> {
    tracing::debug!(
        archive = %archive_path.display(),
        target = %target.display(),
        "extracting layer"
    );
    let io_error = |e: std::io::Error| SkiffError::Io {
        path: archive_path.to_path_buf(),
        source: e,
    };

    let mut file = File::open(archive_path).map_err(io_error)?;
    let gzip = is_gzip(&mut file).map_err(io_error)?;

    if gzip {
        unpack_guarded(flate2::read::GzDecoder::new(file), digest, target)
    } else {
        unpack_guarded(file, digest, target)
    }
}

/// Reports whether the stream starts with the gzip magic, rewinding it.
fn is_gzip(file: &mut File) -> std::io::Result<bool> {
    let mut magic = [0u8; 2];
    let mut read = 0;
    while read < magic.len() {
        match file.read(&mut magic[read..])? {
            0 => break,
            n => read += n,
        }
    }
    let _ = file.seek(SeekFrom::Start(0))?;
    Ok(read == magic.len() && magic == GZIP_MAGIC)
}

fn unpack_guarded<R: Read>(reader: R, digest: &LayerDigest, target: &Path) -> Result<usize> {
    let extraction_error = |message: String| SkiffError::Extraction {
        digest: digest.to_string(),
        message,
    };

    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);
    archive.set_unpack_xattrs(false);

    let entries = archive
        .entries()
        .map_err(|e| extraction_error(format!("malformed archive: {e}")))?;

    let mut count = 0;
    for entry in entries {
        let mut entry = entry.map_err(|e| extraction_error(format!("malformed archive: {e}")))?;
        let path = entry
            .path()
            .map_err(|e| extraction_error(format!("invalid entry name: {e}")))?
            .into_owned();
        check_confined(&path).map_err(&extraction_error)?;

        if entry.header().entry_type().is_hard_link() {
            let link = entry
                .link_name()
                .map_err(|e| extraction_error(format!("invalid link target: {e}")))?;
            if let Some(link) = link {
                check_confined(&link).map_err(&extraction_error)?;
            }
        }

        let written = entry.unpack_in(target).map_err(|e| {
            extraction_error(format!("failed to unpack {}: {e}", path.display()))
        })?;
        if !written {
            return Err(extraction_error(format!(
                "entry {} escapes the target directory",
                path.display()
            )));
        }
        count += 1;
    }
    Ok(count)
}

/// Rejects paths that could resolve outside the extraction root.
fn check_confined(path: &Path) -> std::result::Result<(), String> {
    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(format!(
                    "entry {} contains a parent-directory component",
                    path.display()
                ));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(format!("entry {} has an absolute path", path.display()));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }
    Ok(())
}
