//! Registry v2 protocol client.
//!
//! One run makes one unauthenticated token request, then uses that bearer
//! token for the manifest and every blob. There are no retries and no
//! token refresh: any failure ends the run.

use std::io::Read;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;

use skiff_common::config::RegistryEndpoints;
use skiff_common::error::{Result, SkiffError};
use skiff_common::types::{AuthToken, LayerDigest};

/// Raw bytes of one layer blob, read as they arrive.
pub type BlobStream = Box<dyn Read + Send>;

/// Source of image metadata and layer content.
///
/// Implemented by [`RegistryClient`] for real registries; tests substitute
/// in-memory implementations.
pub trait Registry {
    /// Obtains a `pull` token for `repository`.
    ///
    /// # Errors
    ///
    /// Returns `SkiffError::Auth` if the auth service refuses or its
    /// response carries no token.
    fn resolve_token(&self, repository: &str) -> Result<AuthToken>;

    /// Resolves `repository:tag` to its layer digests, in registry order.
    ///
    /// # Errors
    ///
    /// Returns `SkiffError::Manifest` if the tag does not exist or the
    /// manifest has no layer list.
    fn fetch_layer_digests(
        &self,
        repository: &str,
        tag: &str,
        token: &AuthToken,
    ) -> Result<Vec<LayerDigest>>;

    /// Opens the raw content of one layer blob.
    ///
    /// # Errors
    ///
    /// Returns `SkiffError::BlobFetch` on transport failure or a
    /// non-success status.
    fn fetch_blob(
        &self,
        repository: &str,
        digest: &LayerDigest,
        token: &AuthToken,
    ) -> Result<BlobStream>;
}

/// Token response from the auth service.
///
/// Docker Hub sends `token`; other auth servers only send `access_token`.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

/// Blocking HTTP client for a registry v2 endpoint.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: Client,
    endpoints: RegistryEndpoints,
}

impl RegistryClient {
    /// Creates a client for the given endpoints.
    ///
    /// Requests have no overall timeout: large layers take as long as they
    /// take.
    ///
    /// # Errors
    ///
    /// Returns `SkiffError::Config` if the HTTP client cannot be built.
    pub fn new(endpoints: RegistryEndpoints) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("skiff/", env!("CARGO_PKG_VERSION")))
            .timeout(None::<std::time::Duration>)
            .build()
            .map_err(|e| SkiffError::Config {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client, endpoints })
    }

    /// Returns the endpoints this client talks to.
    #[must_use]
    pub const fn endpoints(&self) -> &RegistryEndpoints {
        &self.endpoints
    }

    fn repository_url(&self, repository: &str, kind: &str, reference: &str) -> String {
        format!(
            "{}/{repository}/{kind}/{reference}",
            self.endpoints.registry_url.trim_end_matches('/')
        )
    }

    fn get_with_token(&self, url: &str, token: &AuthToken) -> reqwest::Result<Response> {
        self.client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", token.as_str()))
            .send()
    }
}

impl Registry for RegistryClient {
    fn resolve_token(&self, repository: &str) -> Result<AuthToken> {
        let auth_error = |message: String| SkiffError::Auth {
            repository: repository.to_string(),
            message,
        };

        let scope = format!("repository:{repository}:pull");
        tracing::info!(repository, service = %self.endpoints.auth_service, "requesting pull token");
        let response = self
            .client
            .get(&self.endpoints.auth_url)
            .query(&[
                ("service", self.endpoints.auth_service.as_str()),
                ("scope", scope.as_str()),
            ])
            .send()
            .map_err(|e| auth_error(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(auth_error(format!("auth service returned HTTP {status}")));
        }

        let body = response
            .bytes()
            .map_err(|e| auth_error(format!("failed to read response body: {e}")))?;
        let parsed: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| auth_error(format!("unparseable token response: {e}")))?;

        parsed
            .token
            .or(parsed.access_token)
            .filter(|t| !t.is_empty())
            .map(AuthToken::new)
            .ok_or_else(|| auth_error("token response has no token field".into()))
    }

    fn fetch_layer_digests(
        &self,
        repository: &str,
        tag: &str,
        token: &AuthToken,
    ) -> Result<Vec<LayerDigest>> {
        let reference = format!("{repository}:{tag}");
        let manifest_error = |message: String| SkiffError::Manifest {
            reference: reference.clone(),
            message,
        };

        let url = self.repository_url(repository, "manifests", tag);
        tracing::info!(url = %url, "fetching manifest");
        let response = self
            .get_with_token(&url, token)
            .map_err(|e| manifest_error(format!("request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(manifest_error("repository or tag not found".into()));
        }
        if !status.is_success() {
            return Err(manifest_error(format!("registry returned HTTP {status}")));
        }

        let body = response
            .bytes()
            .map_err(|e| manifest_error(format!("failed to read manifest body: {e}")))?;
        let digests = crate::manifest::parse_layer_digests(&reference, &body)?;
        tracing::info!(reference = %reference, layers = digests.len(), "manifest resolved");
        Ok(digests)
    }

    fn fetch_blob(
        &self,
        repository: &str,
        digest: &LayerDigest,
        token: &AuthToken,
    ) -> Result<BlobStream> {
        let blob_error = |message: String| SkiffError::BlobFetch {
            digest: digest.to_string(),
            message,
        };

        let url = self.repository_url(repository, "blobs", digest.as_str());
        tracing::debug!(url = %url, "fetching blob");
        let response = self
            .get_with_token(&url, token)
            .map_err(|e| blob_error(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(blob_error(format!("registry returned HTTP {status}")));
        }
        Ok(Box::new(response))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn endpoints_for(server: &MockServer) -> RegistryEndpoints {
        RegistryEndpoints {
            auth_url: format!("{}/token", server.uri()),
            auth_service: "registry.test".into(),
            registry_url: format!("{}/v2", server.uri()),
        }
    }

    /// Runs blocking registry calls off the async test runtime.
    async fn blocking<T, F>(endpoints: RegistryEndpoints, f: F) -> T
    where
        T: Send + 'static,
        F: FnOnce(RegistryClient) -> T + Send + 'static,
    {
        tokio::task::spawn_blocking(move || {
            let client = RegistryClient::new(endpoints).expect("client build failed");
            f(client)
        })
        .await
        .expect("blocking task panicked")
    }

    #[tokio::test]
    async fn token_is_requested_for_pull_scope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .and(query_param("service", "registry.test"))
            .and(query_param("scope", "repository:library/alpine:pull"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "abc123"})))
            .expect(1)
            .mount(&server)
            .await;

        let token = blocking(endpoints_for(&server), |c| c.resolve_token("library/alpine"))
            .await
            .expect("token request failed");
        assert_eq!(token.as_str(), "abc123");
    }

    #[tokio::test]
    async fn access_token_field_is_accepted() {
        let server = MockServer::start().await;
        Mock::given(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "xyz"})))
            .mount(&server)
            .await;

        let token = blocking(endpoints_for(&server), |c| c.resolve_token("library/alpine"))
            .await
            .expect("token request failed");
        assert_eq!(token.as_str(), "xyz");
    }

    #[tokio::test]
    async fn missing_token_field_is_an_auth_error() {
        let server = MockServer::start().await;
        Mock::given(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"expires_in": 300})))
            .mount(&server)
            .await;

        let result = blocking(endpoints_for(&server), |c| c.resolve_token("library/alpine")).await;
        assert!(matches!(result, Err(SkiffError::Auth { .. })));
    }

    #[tokio::test]
    async fn auth_service_rejection_is_an_auth_error() {
        let server = MockServer::start().await;
        Mock::given(path("/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = blocking(endpoints_for(&server), |c| c.resolve_token("library/alpine")).await;
        let err = result.expect_err("should fail");
        assert!(err.to_string().contains("401"), "{err}");
    }

    #[tokio::test]
    async fn manifest_is_fetched_with_bearer_token_and_tag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/library/busybox/manifests/1.36"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "schemaVersion": 1,
                "fsLayers": [{"blobSum": "sha256:aaa"}, {"blobSum": "sha256:bbb"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let digests = blocking(endpoints_for(&server), |c| {
            c.fetch_layer_digests("library/busybox", "1.36", &AuthToken::new("tok"))
        })
        .await
        .expect("manifest fetch failed");
        assert_eq!(
            digests,
            [LayerDigest::new("sha256:aaa"), LayerDigest::new("sha256:bbb")]
        );
    }

    #[tokio::test]
    async fn unknown_tag_is_a_manifest_error() {
        let server = MockServer::start().await;
        Mock::given(path("/v2/library/alpine/manifests/nope"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = blocking(endpoints_for(&server), |c| {
            c.fetch_layer_digests("library/alpine", "nope", &AuthToken::new("tok"))
        })
        .await;
        let err = result.expect_err("should fail");
        assert!(matches!(err, SkiffError::Manifest { .. }));
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn manifest_without_layers_is_a_manifest_error() {
        let server = MockServer::start().await;
        Mock::given(path("/v2/library/alpine/manifests/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"schemaVersion": 1})))
            .mount(&server)
            .await;

        let result = blocking(endpoints_for(&server), |c| {
            c.fetch_layer_digests("library/alpine", "latest", &AuthToken::new("tok"))
        })
        .await;
        assert!(matches!(result, Err(SkiffError::Manifest { .. })));
    }

    #[tokio::test]
    async fn blob_bytes_are_streamed_verbatim() {
        let server = MockServer::start().await;
        Mock::given(path("/v2/library/alpine/blobs/sha256:abc"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\x1f\x8blayer".to_vec()))
            .mount(&server)
            .await;

        let bytes = blocking(endpoints_for(&server), |c| {
            let mut stream = c.fetch_blob(
                "library/alpine",
                &LayerDigest::new("sha256:abc"),
                &AuthToken::new("tok"),
            )?;
            let mut bytes = Vec::new();
            let _ = stream.read_to_end(&mut bytes).expect("read failed");
            Ok::<_, SkiffError>(bytes)
        })
        .await
        .expect("blob fetch failed");
        assert_eq!(bytes, b"\x1f\x8blayer");
    }

    #[tokio::test]
    async fn blob_error_status_is_a_blob_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(path("/v2/library/alpine/blobs/sha256:gone"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = blocking(endpoints_for(&server), |c| {
            c.fetch_blob(
                "library/alpine",
                &LayerDigest::new("sha256:gone"),
                &AuthToken::new("tok"),
            )
            .map(|_| ())
        })
        .await;
        assert!(matches!(result, Err(SkiffError::BlobFetch { .. })));
    }
}
