//! Manifest documents and their layer lists.
//!
//! The legacy schema lists layers as `fsLayers[].blobSum`; schema 2 and
//! OCI image manifests use `layers[].digest`. Either way the registry's own
//! order is kept: it decides extraction order.

use serde::Deserialize;
use serde::de::IgnoredAny;

use skiff_common::error::{Result, SkiffError};
use skiff_common::types::LayerDigest;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawManifest {
    media_type: Option<String>,
    fs_layers: Option<Vec<FsLayer>>,
    layers: Option<Vec<Descriptor>>,
    manifests: Option<IgnoredAny>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FsLayer {
    blob_sum: LayerDigest,
}

#[derive(Debug, Deserialize)]
struct Descriptor {
    digest: LayerDigest,
}

/// Extracts the ordered layer digests from a manifest body.
///
/// `reference` (`repository:tag`) is only used in error messages.
///
/// # Errors
///
/// Returns `SkiffError::Manifest` if the body is not JSON, is a manifest
/// list or image index, or has no layer list at all.
pub fn parse_layer_digests(reference: &str, body: &[u8]) -> Result<Vec<LayerDigest>> {
    let manifest_error = |message: String| SkiffError::Manifest {
        reference: reference.to_string(),
        message,
    };

    let raw: RawManifest = serde_json::from_slice(body)
        .map_err(|e| manifest_error(format!("unparseable manifest: {e}")))?;

    let is_index = raw.manifests.is_some()
        || raw
            .media_type
            .as_deref()
            .is_some_and(|t| t.contains("manifest.list") || t.contains("image.index"));
    if is_index {
        return Err(manifest_error(
            "manifest lists and image indexes are not supported".into(),
        ));
    }

    if let Some(fs_layers) = raw.fs_layers {
        return Ok(fs_layers.into_iter().map(|l| l.blob_sum).collect());
    }
    if let Some(layers) = raw.layers {
        return Ok(layers.into_iter().map(|l| l.digest).collect());
    }
    Err(manifest_error("manifest has no layer list".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_manifest_keeps_registry_order() {
        let body = br#"{
            "schemaVersion": 1,
            "name": "library/alpine",
            "tag": "latest",
            "fsLayers": [
                {"blobSum": "sha256:ffff"},
                {"blobSum": "sha256:0000"},
                {"blobSum": "sha256:8888"}
            ]
        }"#;
        let digests = parse_layer_digests("library/alpine:latest", body).expect("parse failed");
        let digests: Vec<_> = digests.iter().map(LayerDigest::as_str).collect();
        assert_eq!(digests, ["sha256:ffff", "sha256:0000", "sha256:8888"]);
    }

    #[test]
    fn schema2_manifest_layers_are_accepted() {
        let body = br#"{
            "schemaVersion": 2,
            "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
            "config": {"digest": "sha256:cfg", "size": 1},
            "layers": [
                {"digest": "sha256:base", "size": 10},
                {"digest": "sha256:top", "size": 20}
            ]
        }"#;
        let digests = parse_layer_digests("library/debian:12", body).expect("parse failed");
        assert_eq!(
            digests,
            [LayerDigest::new("sha256:base"), LayerDigest::new("sha256:top")]
        );
    }

    #[test]
    fn missing_layer_list_is_an_error_not_empty() {
        let body = br#"{"schemaVersion": 1, "name": "library/alpine"}"#;
        let err = parse_layer_digests("library/alpine:latest", body).expect_err("should fail");
        assert!(matches!(err, SkiffError::Manifest { .. }));
    }

    #[test]
    fn present_but_empty_layer_list_is_empty() {
        let body = br#"{"schemaVersion": 1, "fsLayers": []}"#;
        let digests = parse_layer_digests("library/scratch:latest", body).expect("parse failed");
        assert!(digests.is_empty());
    }

    #[test]
    fn manifest_list_is_rejected() {
        let body = br#"{
            "schemaVersion": 2,
            "mediaType": "application/vnd.docker.distribution.manifest.list.v2+json",
            "manifests": [{"digest": "sha256:amd64", "platform": {"architecture": "amd64"}}]
        }"#;
        let err = parse_layer_digests("library/alpine:latest", body).expect_err("should fail");
        assert!(err.to_string().contains("not supported"));
    }

    #[test]
    fn non_json_body_is_a_manifest_error() {
        let err = parse_layer_digests("library/alpine:latest", b"<html>").expect_err("should fail");
        assert!(matches!(err, SkiffError::Manifest { .. }));
    }

    #[test]
    fn malformed_layer_entry_is_a_manifest_error() {
        let body = br#"{"fsLayers": [{"digest": "sha256:wrong-field"}]}"#;
        assert!(parse_layer_digests("library/alpine:latest", body).is_err());
    }
}
