//! SHA-256 content verification.
//!
//! Validates integrity of downloaded layer blobs against their digest.

use sha2::{Digest, Sha256};

use skiff_common::error::{Result, SkiffError};
use skiff_common::types::LayerDigest;

/// Algorithm prefix of digests this module can verify.
pub const SHA256_ALGORITHM: &str = "sha256";

/// Incremental SHA-256 over a blob as it streams in.
#[derive(Default, Clone)]
pub struct BlobHasher {
    hasher: Sha256,
}

impl BlobHasher {
    /// Creates an empty hasher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the next chunk of the blob.
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
    }

    /// Returns the lowercase hex digest of everything fed so far.
    #[must_use]
    pub fn finish(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}

/// Computes the hex SHA-256 of an in-memory buffer.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Checks a computed SHA-256 against the expected digest.
///
/// Digests with another algorithm are accepted unverified.
///
/// # Errors
///
/// Returns `SkiffError::BlobFetch` if the digest is `sha256:` and the hashes
/// differ.
pub fn verify_digest(expected: &LayerDigest, actual_hex: &str) -> Result<()> {
    if expected.algorithm() != Some(SHA256_ALGORITHM) {
        tracing::debug!(digest = %expected, "skipping verification of non-sha256 digest");
        return Ok(());
    }
    if !expected.hex().eq_ignore_ascii_case(actual_hex) {
        return Err(SkiffError::BlobFetch {
            digest: expected.to_string(),
            message: format!("content hash mismatch: got sha256:{actual_hex}"),
        });
    }
    Ok(())
}
