//! Starting the root tracee.
//!
//! The child asks to be traced, stops itself so the parent can configure
//! tracing options, then executes the target. Everything the target does
//! from its `execve` onwards is observed.

use std::ffi::CString;
use std::path::PathBuf;

use nix::sys::ptrace::{self, Options};
use nix::sys::signal::{Signal, raise};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, execv, fork};
use watchtrace_common::error::{Result, TraceError};

/// Exit status of the child when `execv` itself fails.
const EXEC_FAILED: i32 = 127;

/// Options every tracee gets: follow all process creation and tag
/// call-boundary stops distinctly from plain `SIGTRAP`.
#[must_use]
pub fn trace_options() -> Options {
    Options::PTRACE_O_TRACESYSGOOD
        | Options::PTRACE_O_TRACEFORK
        | Options::PTRACE_O_TRACEVFORK
        | Options::PTRACE_O_TRACECLONE
}

/// Looks up `command[0]` on `PATH` and prepares the `execv` arguments.
///
/// # Errors
///
/// Returns an error if the command is empty, cannot be found, or contains
/// an interior NUL byte.
pub fn prepare(command: &[String]) -> Result<(CString, Vec<CString>)> {
    let Some(program) = command.first() else {
        return Err(TraceError::Launch {
            command: String::new(),
            message: "no command given".into(),
        });
    };
    let path: PathBuf = which::which(program).map_err(|_| TraceError::CommandNotFound {
        command: program.clone(),
    })?;
    let to_cstring = |s: &str| {
        CString::new(s).map_err(|_| TraceError::Launch {
            command: program.clone(),
            message: format!("argument contains a NUL byte: {s:?}"),
        })
    };
    let exe = to_cstring(&path.to_string_lossy())?;
    let argv = command
        .iter()
        .map(|arg| to_cstring(arg.as_str()))
        .collect::<Result<Vec<_>>>()?;
    Ok((exe, argv))
}

/// Launches `command` under tracing and returns the root pid.
///
/// On return the root is stopped-then-resumed with call-boundary tracing
/// enabled, so the next [`crate::backend::TraceBackend::wait`] will report
/// its `execve`.
///
/// # Errors
///
/// Returns an error if the command cannot be prepared, fork fails, or the
/// attach handshake does not complete.
pub fn launch(command: &[String]) -> Result<Pid> {
    let (exe, argv) = prepare(command)?;
    let name = command.first().cloned().unwrap_or_default();
    let launch_err = |message: String| TraceError::Launch {
        command: name.clone(),
        message,
    };

    // SAFETY: the process is single-threaded at this point, so the child
    // inherits no locks held by other threads. That makes the allocation
    // `execv` does for its pointer array sound before exec or _exit.
    match unsafe { fork() }.map_err(|e| launch_err(format!("fork failed: {e}")))? {
        ForkResult::Child => exec_child(&exe, &argv),
        ForkResult::Parent { child } => {
            attach(child).map_err(|e| launch_err(e.to_string()))?;
            tracing::info!(pid = child.as_raw(), exe = ?exe, "launched tracee");
            Ok(child)
        }
    }
}

fn exec_child(exe: &CString, argv: &[CString]) -> ! {
    if ptrace::traceme().is_ok() && raise(Signal::SIGSTOP).is_ok() {
        let _ = execv(exe, argv);
    }
    // SAFETY: _exit is async-signal-safe and skips the parent's atexit state.
    unsafe { libc::_exit(EXEC_FAILED) }
}

/// Completes the handshake with a freshly forked child.
fn attach(child: Pid) -> Result<()> {
    match waitpid(child, None).map_err(|e| TraceError::ptrace("wait", child.as_raw(), e))? {
        WaitStatus::Stopped(_, Signal::SIGSTOP) => {}
        WaitStatus::Exited(_, status) => {
            return Err(TraceError::Launch {
                command: child.to_string(),
                message: format!("child exited with status {status} before tracing started"),
            });
        }
        other => {
            return Err(TraceError::Launch {
                command: child.to_string(),
                message: format!("unexpected initial stop: {other:?}"),
            });
        }
    }
    ptrace::setoptions(child, trace_options())
        .map_err(|e| TraceError::ptrace("setoptions", child.as_raw(), e))?;
    ptrace::syscall(child, None).map_err(|e| TraceError::ptrace("syscall", child.as_raw(), e))
}
