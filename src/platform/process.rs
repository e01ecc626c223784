//! Process fork + wait, grounded on `C-kern/os/Linux/process.c`. Consumed
//! directly by [`crate::perftest`], which forks one child per worker
//! process and reaps them after the run completes.

use super::{PlatformError, Result};
use std::process::ExitStatus;

/// A forked child process.
pub struct ProcessHandle {
    pid: libc::pid_t,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitState {
    Exited(i32),
    Signaled(i32),
}

/// Forks the calling process. The child runs `f` to completion and then
/// exits with the returned code via `_exit` (skipping destructors and
/// `atexit` handlers, matching the teacher's `File::from_raw_fd`-style
/// "own everything past this point" posture after a raw syscall).
///
/// # Safety-relevant caveat
///
/// As with any `fork` in a multi-threaded process, only async-signal-safe
/// operations are guaranteed sound between the fork and the child's exit.
/// `f` must not take locks held by other threads of the parent (this is
/// exactly the contract [`crate::perftest`] relies on: each forked child
/// immediately spawns fresh threads of its own rather than touching parent
/// thread state).
pub fn fork_exec<F>(f: F) -> Result<ProcessHandle>
where
    F: FnOnce() -> i32,
{
    // SAFETY: `fork` itself is always safe to call; the caveat above bounds
    // what `f` may safely do in the child.
    let pid = unsafe { libc::fork() };
    match pid {
        -1 => Err(PlatformError::Spawn(std::io::Error::last_os_error())),
        0 => {
            let code = f();
            // SAFETY: `_exit` terminates the child without running parent
            // destructors a second time.
            unsafe { libc::_exit(code) };
        }
        child => Ok(ProcessHandle { pid: child }),
    }
}

/// Blocks until `handle`'s process exits, returning its exit state.
pub fn wait(handle: ProcessHandle) -> Result<ExitState> {
    let mut status = 0i32;
    // SAFETY: `status` is a valid out-pointer for `waitpid`.
    let rc = unsafe { libc::waitpid(handle.pid, &mut status, 0) };
    if rc < 0 {
        return Err(PlatformError::Io(std::io::Error::last_os_error()));
    }
    if libc::WIFEXITED(status) {
        Ok(ExitState::Exited(libc::WEXITSTATUS(status)))
    } else {
        Ok(ExitState::Signaled(libc::WTERMSIG(status)))
    }
}

impl From<ExitState> for ExitStatus {
    fn from(state: ExitState) -> Self {
        use std::os::unix::process::ExitStatusExt;
        match state {
            ExitState::Exited(code) => ExitStatus::from_raw(code << 8),
            ExitState::Signaled(sig) => ExitStatus::from_raw(sig),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fork_runs_child_and_reports_exit_code() {
        let handle = fork_exec(|| 7).unwrap();
        assert_eq!(wait(handle).unwrap(), ExitState::Exited(7));
    }
}
