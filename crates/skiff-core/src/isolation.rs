//! Explicit description of the boundary a command runs under.
//!
//! Nothing here touches the calling process. An [`IsolationConfig`] is
//! validated into an [`IsolationPlan`] in the parent; the plan is then
//! entered from the forked child right before `exec`, e.g. from
//! `std::os::unix::process::CommandExt::pre_exec`.

use std::path::{Path, PathBuf};

use skiff_common::config::IsolationSettings;
use skiff_common::error::{Result, SkiffError};

/// Root directory plus the namespaces to create around a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolationConfig {
    /// Directory that becomes `/` for the command.
    pub root_dir: PathBuf,
    /// Create a new PID namespace; the command becomes its PID 1.
    pub pid_namespace: bool,
    /// Create a private mount namespace.
    pub mount_namespace: bool,
    /// Mount `proc` at `<root>/proc` inside the mount namespace.
    pub mount_proc: bool,
}

impl IsolationConfig {
    /// Builds a configuration for `root_dir` from the run's settings.
    #[must_use]
    pub fn new(root_dir: impl Into<PathBuf>, settings: &IsolationSettings) -> Self {
        Self {
            root_dir: root_dir.into(),
            pid_namespace: settings.pid_namespace,
            mount_namespace: settings.mount_namespace,
            mount_proc: settings.mount_proc,
        }
    }

    /// Validates the configuration and precomputes everything the child
    /// needs, so entering the plan allocates nothing after `fork`.
    ///
    /// # Errors
    ///
    /// Returns `SkiffError::Config` if `mount_proc` is requested without a
    /// mount namespace, or `SkiffError::Io` if the root is not a directory.
    pub fn prepare(&self) -> Result<IsolationPlan> {
        if self.mount_proc && !self.mount_namespace {
            return Err(SkiffError::Config {
                message: "mounting proc requires a private mount namespace".into(),
            });
        }
        let metadata = std::fs::metadata(&self.root_dir).map_err(|e| SkiffError::Io {
            path: self.root_dir.clone(),
            source: e,
        })?;
        if !metadata.is_dir() {
            return Err(SkiffError::Io {
                path: self.root_dir.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotADirectory,
                    "root filesystem is not a directory",
                ),
            });
        }

        // Only a real directory; a `proc` symlink from the image must not
        // steer the mount onto the host tree.
        let proc_dir = self.root_dir.join("proc");
        let proc_is_dir =
            std::fs::symlink_metadata(&proc_dir).is_ok_and(|m| m.file_type().is_dir());
        let proc_dir = (self.mount_proc && proc_is_dir).then_some(proc_dir);
        tracing::debug!(
            root = %self.root_dir.display(),
            pid = self.pid_namespace,
            mount = self.mount_namespace,
            proc = proc_dir.is_some(),
            "isolation plan prepared"
        );

        Ok(IsolationPlan {
            root_dir: self.root_dir.clone(),
            pid_namespace: self.pid_namespace,
            mount_namespace: self.mount_namespace,
            proc_dir,
        })
    }
}

/// A validated [`IsolationConfig`], ready to be entered from a child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolationPlan {
    root_dir: PathBuf,
    pid_namespace: bool,
    mount_namespace: bool,
    proc_dir: Option<PathBuf>,
}

impl IsolationPlan {
    /// Root directory the plan switches into.
    #[must_use]
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Host path where `proc` will be mounted, if any.
    #[must_use]
    pub fn proc_dir(&self) -> Option<&Path> {
        self.proc_dir.as_deref()
    }

    /// Enters the isolation boundary from the calling (child) process.
    ///
    /// Steps run in order and each failure aborts the rest: namespaces are
    /// created, the process forks into the PID namespace, mounts are made
    /// private, `proc` is mounted, then the root changes. The root is never
    /// changed on top of a partially established namespace setup.
    ///
    /// Only call this between `fork` and `exec`. With a PID namespace the
    /// caller forks once more and its original incarnation never returns;
    /// it relays the exit status of the process that does.
    ///
    /// # Errors
    ///
    /// Returns the OS error of the first step that fails.
    #[cfg(target_os = "linux")]
    pub fn enter(&self) -> std::io::Result<()> {
        use crate::filesystem::{chroot, mount};
        use crate::namespace::{self, NamespaceConfig};

        namespace::create_namespaces(&NamespaceConfig {
            pid: self.pid_namespace,
            mount: self.mount_namespace,
        })?;
        if self.pid_namespace {
            namespace::pid::fork_into_pid_namespace()?;
        }
        if self.mount_namespace {
            namespace::mount::make_mounts_private()?;
        }
        if let Some(proc_dir) = &self.proc_dir {
            mount::mount_proc(proc_dir)?;
        }
        chroot::change_root(&self.root_dir)
    }

    /// Stub for non-Linux platforms.
    ///
    /// # Errors
    ///
    /// Always returns an error: namespaces and `chroot` require Linux.
    #[cfg(not(target_os = "linux"))]
    pub fn enter(&self) -> std::io::Result<()> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "Linux required for isolated execution",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pid: bool, mount: bool, proc: bool) -> IsolationSettings {
        IsolationSettings {
            pid_namespace: pid,
            mount_namespace: mount,
            mount_proc: proc,
        }
    }

    #[test]
    fn prepare_plans_proc_mount_when_directory_exists() {
        let root = tempfile::tempdir().expect("failed to create tempdir");
        std::fs::create_dir(root.path().join("proc")).expect("mkdir failed");

        let plan = IsolationConfig::new(root.path(), &IsolationSettings::default())
            .prepare()
            .expect("prepare failed");
        assert_eq!(plan.root_dir(), root.path());
        assert_eq!(plan.proc_dir(), Some(root.path().join("proc").as_path()));
    }

    #[test]
    fn prepare_skips_proc_mount_without_directory() {
        let root = tempfile::tempdir().expect("failed to create tempdir");
        let plan = IsolationConfig::new(root.path(), &IsolationSettings::default())
            .prepare()
            .expect("prepare failed");
        assert!(plan.proc_dir().is_none());
    }

    #[test]
    fn prepare_skips_proc_mount_through_symlink() {
        let root = tempfile::tempdir().expect("failed to create tempdir");
        let host = tempfile::tempdir().expect("failed to create tempdir");
        std::os::unix::fs::symlink(host.path(), root.path().join("proc"))
            .expect("symlink failed");

        let plan = IsolationConfig::new(root.path(), &IsolationSettings::default())
            .prepare()
            .expect("prepare failed");
        assert!(plan.proc_dir().is_none());
    }

    #[test]
    fn proc_mount_without_mount_namespace_is_rejected() {
        let root = tempfile::tempdir().expect("failed to create tempdir");
        let result = IsolationConfig::new(root.path(), &settings(true, false, true)).prepare();
        assert!(matches!(result, Err(SkiffError::Config { .. })));
    }

    #[test]
    fn missing_root_is_rejected() {
        let root = tempfile::tempdir().expect("failed to create tempdir");
        let result =
            IsolationConfig::new(root.path().join("absent"), &settings(true, true, false)).prepare();
        assert!(matches!(result, Err(SkiffError::Io { .. })));
    }

    #[test]
    fn file_as_root_is_rejected() {
        let root = tempfile::tempdir().expect("failed to create tempdir");
        let file = root.path().join("rootfs");
        std::fs::write(&file, b"").expect("write failed");
        let result = IsolationConfig::new(&file, &settings(false, false, false)).prepare();
        assert!(matches!(result, Err(SkiffError::Io { .. })));
    }
}
