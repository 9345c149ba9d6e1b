//! Executor abstraction for running a command under isolation.

#[cfg(target_os = "linux")]
pub mod linux;

use skiff_common::error::Result;
use skiff_common::types::ExecutionResult;
use skiff_core::isolation::IsolationConfig;

/// Runs a command confined to a root filesystem.
///
/// The isolation boundary is passed in explicitly; implementors must not
/// change the calling process's root, namespaces, or working directory.
pub trait Executor {
    /// Runs `command` with `args` inside `isolation.root_dir` and waits for
    /// it, capturing its output.
    ///
    /// A nonzero exit code is a successful run.
    ///
    /// # Errors
    ///
    /// Returns `SkiffError::ExecStart` if the command is missing, not
    /// executable, or the isolation cannot be established, and
    /// `SkiffError::ExecRuntime` if the child cannot be waited on.
    fn run(
        &self,
        command: &str,
        args: &[String],
        isolation: &IsolationConfig,
    ) -> Result<ExecutionResult>;
}

impl<E: Executor + ?Sized> Executor for Box<E> {
    fn run(
        &self,
        command: &str,
        args: &[String],
        isolation: &IsolationConfig,
    ) -> Result<ExecutionResult> {
        (**self).run(command, args, isolation)
    }
}

/// Executor used on platforms without namespaces.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedExecutor;

impl Executor for UnsupportedExecutor {
    fn run(
        &self,
        command: &str,
        _args: &[String],
        _isolation: &IsolationConfig,
    ) -> Result<ExecutionResult> {
        Err(skiff_common::error::SkiffError::ExecStart {
            command: command.to_string(),
            reason: skiff_common::error::StartFailure::Isolation(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "Linux required for isolated execution",
            )),
        })
    }
}

/// Returns the executor for the current platform.
#[must_use]
pub fn detect_executor() -> Box<dyn Executor> {
    #[cfg(target_os = "linux")]
    {
        Box::new(linux::NamespaceExecutor::new())
    }
    #[cfg(not(target_os = "linux"))]
    {
        Box::new(UnsupportedExecutor)
    }
}
