//! Linux executor using PID and mount namespaces plus `chroot`.

use std::fs::File;
use std::io::{self, Read};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use nix::fcntl::OFlag;
use nix::unistd::pipe2;

use skiff_common::constants::CONTAINER_PATH;
use skiff_common::error::{Result, SkiffError, StartFailure};
use skiff_common::types::ExecutionResult;
use skiff_core::filesystem::resolve::locate_executable;
use skiff_core::isolation::IsolationConfig;

use super::Executor;

/// Executor that applies the isolation plan in the forked child.
///
/// The calling process keeps its root, namespaces, and working directory;
/// only the child between `fork` and `exec` enters the boundary.
#[derive(Debug, Default, Clone, Copy)]
pub struct NamespaceExecutor;

impl NamespaceExecutor {
    /// Creates a new Linux namespace executor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Executor for NamespaceExecutor {
    fn run(
        &self,
        command: &str,
        args: &[String],
        isolation: &IsolationConfig,
    ) -> Result<ExecutionResult> {
        let plan = isolation.prepare()?;
        let program = locate_executable(plan.root_dir(), command)?;
        tracing::info!(
            command,
            program = %program.display(),
            root = %plan.root_dir().display(),
            "starting isolated command"
        );

        let mut cmd = Command::new(&program);
        let _ = cmd
            .args(args)
            .env("PATH", CONTAINER_PATH)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let child = spawn_isolated(&mut cmd, command, &program, move || plan.enter())?;
        tracing::debug!(pid = child.id(), "child spawned");

        let output = child
            .wait_with_output()
            .map_err(|e| SkiffError::ExecRuntime {
                command: command.to_string(),
                source: e,
            })?;
        let result = crate::exec::collect(output);
        tracing::info!(command, exit_code = result.exit_code, "isolated command finished");
        Ok(result)
    }
}

/// Spawns `cmd`, running `enter` in the child right before `exec`.
///
/// A spawn error is attributed to `enter` when the child reported one
/// through the failure flag, and to `execve` otherwise.
fn spawn_isolated<F>(
    cmd: &mut Command,
    command: &str,
    program: &Path,
    mut enter: F,
) -> Result<Child>
where
    F: FnMut() -> io::Result<()> + Send + Sync + 'static,
{
    let start_error = |reason| SkiffError::ExecStart {
        command: command.to_string(),
        reason,
    };
    let flag = FailureFlag::new().map_err(|e| start_error(StartFailure::Isolation(e)))?;
    let flag_fd = flag.raw_writer();

    // SAFETY: the hook only issues async-signal-safe syscalls (unshare,
    // fork, waitpid, mount, chroot, chdir, write, _exit) on data prepared
    // before the fork; it allocates nothing and takes no locks.
    let _ = unsafe {
        cmd.pre_exec(move || {
            let entered = enter();
            if entered.is_err() {
                FailureFlag::raise(flag_fd);
            }
            entered
        })
    };

    cmd.spawn().map_err(|e| {
        let isolation_failed = flag.is_raised();
        let reason = classify_spawn_error(e, isolation_failed, program);
        tracing::debug!(isolation_failed, reason = %reason, "spawn failed");
        start_error(reason)
    })
}

/// Maps a failed spawn onto a start failure.
///
/// `execve` reports a missing binary or interpreter as `ENOENT`/`ENOTDIR`
/// and a file it may not run as `EACCES`/`ENOEXEC`; everything else, and
/// any error raised while entering isolation, is an isolation failure.
fn classify_spawn_error(
    error: io::Error,
    isolation_failed: bool,
    program: &Path,
) -> StartFailure {
    if isolation_failed {
        return StartFailure::Isolation(error);
    }
    match error.raw_os_error() {
        Some(libc::ENOENT | libc::ENOTDIR) => StartFailure::NotFound,
        Some(libc::EACCES | libc::ENOEXEC) => StartFailure::NotExecutable {
            path: program.display().to_string(),
        },
        _ => StartFailure::Isolation(error),
    }
}

/// Close-on-exec pipe a forked child writes one byte to when its
/// pre-exec hook fails.
struct FailureFlag {
    reader: File,
    writer: OwnedFd,
}

impl FailureFlag {
    fn new() -> io::Result<Self> {
        let (reader, writer) = pipe2(OFlag::O_CLOEXEC)?;
        Ok(Self {
            reader: File::from(reader),
            writer,
        })
    }

    fn raw_writer(&self) -> RawFd {
        self.writer.as_raw_fd()
    }

    /// Raises the flag. Async-signal-safe, for use between fork and exec.
    fn raise(writer: RawFd) {
        let byte = [1_u8];
        // SAFETY: `writer` is the flag's write end inherited across fork,
        // and `byte` outlives the call.
        let _ = unsafe { libc::write(writer, byte.as_ptr().cast(), 1) };
    }

    /// Reports whether any child raised the flag.
    ///
    /// Only call once every child holding the write end has exited or
    /// exec'd, as is the case when `spawn` returns an error.
    fn is_raised(self) -> bool {
        let Self { mut reader, writer } = self;
        drop(writer);
        let mut byte = [0_u8; 1];
        matches!(reader.read(&mut byte), Ok(1))
    }
}
