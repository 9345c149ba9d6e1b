//! Configuration model for a skiff run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_AUTH_SERVICE, DEFAULT_AUTH_URL, DEFAULT_REGISTRY_URL};

/// Root configuration for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkiffConfig {
    /// Where images are pulled from.
    pub registry: RegistryEndpoints,
    /// Parent directory for the per-run scratch directory.
    ///
    /// `None` uses the system temporary directory.
    pub scratch_base: Option<PathBuf>,
    /// Isolation toggles for the executed command.
    pub isolation: IsolationSettings,
}

/// Endpoints of the image-distribution service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEndpoints {
    /// Token endpoint of the auth service.
    pub auth_url: String,
    /// Service name requested from the auth endpoint.
    pub auth_service: String,
    /// Base URL of the registry v2 API (manifests and blobs live beneath it).
    pub registry_url: String,
}

impl Default for RegistryEndpoints {
    fn default() -> Self {
        Self {
            auth_url: DEFAULT_AUTH_URL.into(),
            auth_service: DEFAULT_AUTH_SERVICE.into(),
            registry_url: DEFAULT_REGISTRY_URL.into(),
        }
    }
}

/// Which isolation primitives the executor applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolationSettings {
    /// Give the command its own PID namespace.
    pub pid_namespace: bool,
    /// Give the command a private mount namespace.
    pub mount_namespace: bool,
    /// Mount a fresh `proc` inside the root (needs the mount namespace).
    pub mount_proc: bool,
}

impl Default for IsolationSettings {
    fn default() -> Self {
        Self {
            pid_namespace: true,
            mount_namespace: true,
            mount_proc: true,
        }
    }
}
