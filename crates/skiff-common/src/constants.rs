//! System-wide constants and default endpoints.

/// Token endpoint of the Docker Hub auth service.
pub const DEFAULT_AUTH_URL: &str = "https://auth.docker.io/token";

/// Service name presented to the auth endpoint when requesting a token.
pub const DEFAULT_AUTH_SERVICE: &str = "registry.docker.io";

/// Base URL of the Docker Hub registry v2 API.
pub const DEFAULT_REGISTRY_URL: &str = "https://registry-1.docker.io/v2";

/// Tag used when an image reference carries none.
pub const DEFAULT_TAG: &str = "latest";

/// Namespace prefix for single-component (official) image names.
pub const OFFICIAL_NAMESPACE: &str = "library";

/// Search path used to locate the command inside the root filesystem.
///
/// Also exported as `PATH` to the isolated child.
pub const CONTAINER_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Symlink hops tolerated while resolving a path inside the root filesystem.
pub const MAX_SYMLINK_HOPS: usize = 40;

/// Prefix of the per-run scratch directory.
pub const SCRATCH_PREFIX: &str = "skiff-";

/// Name of the merged root filesystem inside the scratch directory.
pub const ROOTFS_DIR_NAME: &str = "rootfs";

/// Name of the blob download area inside the scratch directory.
pub const BLOBS_DIR_NAME: &str = "blobs";

/// Exit code for a pipeline failure before the command could run.
pub const EXIT_PIPELINE_FAILURE: u8 = 125;

/// Exit code when the command exists but cannot be executed.
pub const EXIT_NOT_EXECUTABLE: u8 = 126;

/// Exit code when the command is absent from the root filesystem.
pub const EXIT_NOT_FOUND: u8 = 127;

/// Application name used in CLI output.
pub const APP_NAME: &str = "skiff";
