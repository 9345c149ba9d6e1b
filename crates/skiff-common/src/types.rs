//! Domain primitive types passed between pipeline stages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_TAG, OFFICIAL_NAMESPACE};
use crate::error::{Result, SkiffError};

/// Image name and tag as supplied on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    name: String,
    tag: String,
}

impl ImageReference {
    /// Parses `name[:tag]`, defaulting the tag to `latest`.
    ///
    /// Names are repository paths on the configured registry. A leading
    /// registry host (`ghcr.io/...`, `localhost:5000/...`) is rejected
    /// rather than silently sent to another registry.
    ///
    /// # Errors
    ///
    /// Returns `SkiffError::Config` if the name or an explicit tag is empty,
    /// or if the name starts with a registry host.
    pub fn parse(reference: &str) -> Result<Self> {
        let (name, tag) = match reference.rsplit_once(':') {
            Some((name, tag)) if !tag.contains('/') => (name, tag),
            _ => (reference, DEFAULT_TAG),
        };
        if name.is_empty() {
            return Err(SkiffError::Config {
                message: format!("image reference has no name: {reference:?}"),
            });
        }
        if let Some((host, _)) = name
            .split_once('/')
            .filter(|(first, _)| is_registry_host(first))
        {
            return Err(SkiffError::Config {
                message: format!(
                    "image reference {reference:?} names registry host {host:?}; \
                     set the registry URL instead"
                ),
            });
        }
        if tag.is_empty() {
            return Err(SkiffError::Config {
                message: format!("image reference has an empty tag: {reference:?}"),
            });
        }
        Ok(Self {
            name: name.to_string(),
            tag: tag.to_string(),
        })
    }

    /// Returns the image name as given.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the resolved tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the registry repository path for this image.
    ///
    /// Single-component names are official images living under `library/`.
    #[must_use]
    pub fn repository(&self) -> String {
        if self.name.contains('/') {
            self.name.clone()
        } else {
            format!("{OFFICIAL_NAMESPACE}/{}", self.name)
        }
    }
}

/// Whether a leading name component is a registry host rather than a
/// namespace, using the same rule as the Docker reference grammar.
fn is_registry_host(component: &str) -> bool {
    component == "localhost" || component.contains('.') || component.contains(':')
}

impl FromStr for ImageReference {
    type Err = SkiffError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

/// Bearer credential for one repository's `pull` scope.
///
/// Lives only for the duration of a run. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wraps a raw token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for use in an `Authorization` header.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

/// Registry-assigned content identifier of one layer blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerDigest(String);

impl LayerDigest {
    /// Creates a digest from its `<algorithm>:<hex>` string.
    #[must_use]
    pub fn new(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    /// Returns the full digest string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the algorithm part, if the digest has one.
    #[must_use]
    pub fn algorithm(&self) -> Option<&str> {
        self.0.split_once(':').map(|(algorithm, _)| algorithm)
    }

    /// Returns the encoded hash part (the whole string if unqualified).
    #[must_use]
    pub fn hex(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(_, hex)| hex)
    }
}

impl fmt::Display for LayerDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Observable outcome of the isolated command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Captured standard output, byte for byte.
    pub stdout: Vec<u8>,
    /// Captured standard error, byte for byte.
    pub stderr: Vec<u8>,
    /// Exit code of the command. Nonzero is data, not failure.
    pub exit_code: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_without_colon_defaults_to_latest() {
        let r = ImageReference::parse("alpine").expect("parse failed");
        assert_eq!(r.name(), "alpine");
        assert_eq!(r.tag(), "latest");
    }

    #[test]
    fn reference_with_explicit_tag_keeps_it() {
        for tag in ["3.19", "edge", "latest", "1.0.0-rc1"] {
            let r = ImageReference::parse(&format!("busybox:{tag}")).expect("parse failed");
            assert_eq!(r.name(), "busybox");
            assert_eq!(r.tag(), tag);
        }
    }

    #[test]
    fn registry_host_in_name_is_rejected() {
        for reference in [
            "localhost:5000/tools/jq",
            "localhost:5000/tools/jq:1.7",
            "localhost/jq",
            "ghcr.io/owner/tool:v1",
        ] {
            let err = ImageReference::parse(reference).expect_err(reference);
            assert!(matches!(err, SkiffError::Config { .. }), "{reference}");
        }
    }

    #[test]
    fn namespaced_names_keep_their_path() {
        let r = ImageReference::parse("bitnami/redis:7.2").expect("parse failed");
        assert_eq!(r.name(), "bitnami/redis");
        assert_eq!(r.tag(), "7.2");
        assert_eq!(r.repository(), "bitnami/redis");
    }

    #[test]
    fn empty_parts_are_rejected() {
        assert!(ImageReference::parse("").is_err());
        assert!(ImageReference::parse(":3.19").is_err());
        assert!(ImageReference::parse("alpine:").is_err());
    }

    #[test]
    fn official_images_live_under_library() {
        let r: ImageReference = "ubuntu:22.04".parse().expect("parse failed");
        assert_eq!(r.repository(), "library/ubuntu");
        let r: ImageReference = "grafana/loki".parse().expect("parse failed");
        assert_eq!(r.repository(), "grafana/loki");
    }

    #[test]
    fn reference_display_includes_tag() {
        let r = ImageReference::parse("alpine").expect("parse failed");
        assert_eq!(r.to_string(), "alpine:latest");
    }

    #[test]
    fn token_debug_is_redacted() {
        let token = AuthToken::new("s3cr3t");
        assert!(!format!("{token:?}").contains("s3cr3t"));
        assert_eq!(token.as_str(), "s3cr3t");
    }

    #[test]
    fn digest_splits_algorithm_and_hex() {
        let d = LayerDigest::new("sha256:deadbeef");
        assert_eq!(d.algorithm(), Some("sha256"));
        assert_eq!(d.hex(), "deadbeef");

        let bare = LayerDigest::new("deadbeef");
        assert_eq!(bare.algorithm(), None);
        assert_eq!(bare.hex(), "deadbeef");
    }

    #[test]
    fn digest_serializes_as_plain_string() {
        let d = LayerDigest::new("sha256:abc");
        let json = serde_json::to_string(&d).expect("serialize failed");
        assert_eq!(json, "\"sha256:abc\"");
    }
}
