//! PID namespace entry.
//!
//! `unshare(CLONE_NEWPID)` does not move the caller; only its next child
//! becomes PID 1 of the new namespace. [`fork_into_pid_namespace`] performs
//! that fork and turns the caller into a relay for the child's exit status.

use std::io;

use nix::errno::Errno;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, fork};

use skiff_common::constants::EXIT_PIPELINE_FAILURE;

/// Forks so that execution continues as PID 1 of the pending PID namespace.
///
/// Returns only in the child. The parent waits for the child and exits
/// with the same status (`128 + signal` if the child was killed), so
/// whoever waits on the parent observes the child's outcome.
///
/// Must only be called in a single-threaded process, such as between
/// `fork` and `exec`.
///
/// # Errors
///
/// Returns the `fork(2)` error, e.g. `ENOMEM` when the namespace's
/// init could not be created.
#[allow(unsafe_code)]
pub fn fork_into_pid_namespace() -> io::Result<()> {
    // SAFETY: the caller guarantees a single-threaded process; neither
    // branch below allocates or touches locks before exec or _exit.
    match unsafe { fork() }? {
        ForkResult::Child => Ok(()),
        ForkResult::Parent { child } => {
            close_inherited_descriptors();
            let code = wait_for_exit_code(child);
            // SAFETY: _exit is async-signal-safe and skips the atexit
            // handlers inherited from the original process image.
            unsafe { libc::_exit(code) }
        }
    }
}

/// Closes every descriptor above stderr.
///
/// The relay never execs, so it would otherwise keep close-on-exec
/// descriptors open for the child's whole lifetime. One of those is the
/// pipe `std::process::Command::spawn` reads to learn whether exec
/// succeeded; holding it open would stall `spawn` until the child exits.
#[allow(unsafe_code)]
fn close_inherited_descriptors() {
    // SAFETY: close_range only edits this process's descriptor table.
    let rc = unsafe { libc::syscall(libc::SYS_close_range, 3_u32, u32::MAX, 0_u32) };
    if rc != 0 {
        // Kernels before 5.9 lack close_range.
        for fd in 3..1024 {
            // SAFETY: closing a descriptor that is not open is harmless.
            let _ = unsafe { libc::close(fd) };
        }
    }
}

/// Waits for `child` and converts its termination into a shell exit code.
fn wait_for_exit_code(child: Pid) -> i32 {
    loop {
        match waitpid(child, None) {
            Ok(WaitStatus::Exited(_, code)) => return code,
            Ok(WaitStatus::Signaled(_, signal, _)) => return 128 + signal as i32,
            Ok(_) | Err(Errno::EINTR) => {}
            Err(_) => return i32::from(EXIT_PIPELINE_FAILURE),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::process::Command;

    use super::*;

    fn pid_of(child: &std::process::Child) -> Pid {
        Pid::from_raw(i32::try_from(child.id()).expect("pid out of range"))
    }

    #[test]
    fn exit_code_is_relayed() {
        let child = Command::new("sh")
            .args(["-c", "exit 3"])
            .spawn()
            .expect("spawn failed");
        assert_eq!(wait_for_exit_code(pid_of(&child)), 3);
    }

    #[test]
    fn killed_child_reports_128_plus_signal() {
        let mut child = Command::new("sleep").arg("30").spawn().expect("spawn failed");
        child.kill().expect("kill failed");
        assert_eq!(wait_for_exit_code(pid_of(&child)), 137);
    }

    #[test]
    fn unknown_child_reports_pipeline_failure() {
        assert_eq!(
            wait_for_exit_code(Pid::from_raw(i32::MAX)),
            i32::from(EXIT_PIPELINE_FAILURE)
        );
    }
}
