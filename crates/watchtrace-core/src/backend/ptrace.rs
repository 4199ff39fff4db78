//! `ptrace(2)` implementation of [`TraceBackend`].

use std::path::PathBuf;

use nix::sys::ptrace::{self, AddressType, Event};
use nix::sys::signal::Signal;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use watchtrace_common::error::{Result, TraceError};

use super::{TraceBackend, TraceStop};
use crate::context::snapshot_cwd;
use crate::memory::TraceeMemory;
use crate::registers::SyscallRegs;

const WORD: usize = std::mem::size_of::<libc::c_long>();

/// Backend that drives tracees through `ptrace(2)` and `waitpid(2)`.
///
/// The root tracee must have been started by [`crate::launch::launch`],
/// which configures fork/vfork/clone following and marks call-boundary
/// stops with `PTRACE_O_TRACESYSGOOD`.
#[derive(Debug, Default)]
pub struct PtraceBackend;

impl PtraceBackend {
    /// Creates a new ptrace backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TraceeMemory for PtraceBackend {
    #[allow(clippy::cast_possible_truncation)]
    fn peek(&self, pid: Pid, addr: u64, buf: &mut [u8]) -> usize {
        let mut copied = 0;
        while copied < buf.len() {
            let Some(at) = addr.checked_add(copied as u64) else {
                break;
            };
            let word = match ptrace::read(pid, at as usize as AddressType) {
                Ok(word) => word,
                Err(e) => {
                    tracing::trace!(pid = pid.as_raw(), addr = at, error = %e, "peek stopped");
                    break;
                }
            };
            let bytes = word.to_ne_bytes();
            let n = WORD.min(buf.len() - copied);
            buf[copied..copied + n].copy_from_slice(&bytes[..n]);
            copied += n;
            if bytes[..n].contains(&0) {
                break;
            }
        }
        copied
    }
}

impl TraceBackend for PtraceBackend {
    fn wait(&mut self) -> Result<TraceStop> {
        loop {
            let status = waitpid(Pid::from_raw(-1), Some(WaitPidFlag::__WALL))
                .map_err(|e| TraceError::ptrace("wait", -1, e))?;
            if let Some(stop) = classify(status)? {
                return Ok(stop);
            }
        }
    }

    fn registers(&mut self, pid: Pid) -> Result<SyscallRegs> {
        read_registers(pid)
    }

    fn cwd(&self, pid: Pid) -> Option<PathBuf> {
        snapshot_cwd(pid)
    }

    fn resume(&mut self, pid: Pid, signal: Option<Signal>) -> Result<()> {
        ptrace::syscall(pid, signal).map_err(|e| TraceError::ptrace("syscall", pid.as_raw(), e))
    }
}

/// Maps a raw wait status to a [`TraceStop`]. Statuses that need no
/// handling (`StillAlive`, `Continued`) map to `None`.
fn classify(status: WaitStatus) -> Result<Option<TraceStop>> {
    let stop = match status {
        WaitStatus::Exited(pid, status) => TraceStop::Exited { pid, status },
        WaitStatus::Signaled(pid, signal, _) => TraceStop::Signaled { pid, signal },
        WaitStatus::PtraceSyscall(pid) => TraceStop::SyscallBoundary { pid },
        WaitStatus::PtraceEvent(pid, _, event) if is_child_event(event) => {
            let raw = ptrace::getevent(pid)
                .map_err(|e| TraceError::ptrace("getevent", pid.as_raw(), e))?;
            #[allow(clippy::cast_possible_truncation)]
            let child = Pid::from_raw(raw as libc::pid_t);
            TraceStop::NewChild { pid, child }
        }
        WaitStatus::PtraceEvent(pid, _, _) => TraceStop::Event { pid },
        WaitStatus::Stopped(pid, signal) => TraceStop::Signal { pid, signal },
        _ => return Ok(None),
    };
    Ok(Some(stop))
}

fn is_child_event(event: libc::c_int) -> bool {
    event == Event::PTRACE_EVENT_FORK as libc::c_int
        || event == Event::PTRACE_EVENT_VFORK as libc::c_int
        || event == Event::PTRACE_EVENT_CLONE as libc::c_int
}

#[cfg(target_arch = "x86_64")]
fn read_registers(pid: Pid) -> Result<SyscallRegs> {
    let raw =
        ptrace::getregs(pid).map_err(|e| TraceError::ptrace("getregs", pid.as_raw(), e))?;
    SyscallRegs::from_x86_64(pid.as_raw(), &raw)
}

#[cfg(not(target_arch = "x86_64"))]
fn read_registers(_pid: Pid) -> Result<SyscallRegs> {
    Err(TraceError::UnsupportedArch {
        arch: std::env::consts::ARCH,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_statuses_classify() {
        let pid = Pid::from_raw(7);
        assert_eq!(
            classify(WaitStatus::Exited(pid, 3)).expect("classify"),
            Some(TraceStop::Exited { pid, status: 3 })
        );
        assert_eq!(
            classify(WaitStatus::Signaled(pid, Signal::SIGKILL, false)).expect("classify"),
            Some(TraceStop::Signaled {
                pid,
                signal: Signal::SIGKILL
            })
        );
    }

    #[test]
    fn syscall_and_signal_stops_classify() {
        let pid = Pid::from_raw(8);
        assert_eq!(
            classify(WaitStatus::PtraceSyscall(pid)).expect("classify"),
            Some(TraceStop::SyscallBoundary { pid })
        );
        assert_eq!(
            classify(WaitStatus::Stopped(pid, Signal::SIGUSR1)).expect("classify"),
            Some(TraceStop::Signal {
                pid,
                signal: Signal::SIGUSR1
            })
        );
        assert_eq!(
            classify(WaitStatus::PtraceEvent(
                pid,
                Signal::SIGTRAP,
                Event::PTRACE_EVENT_EXEC as libc::c_int
            ))
            .expect("classify"),
            Some(TraceStop::Event { pid })
        );
    }

    #[test]
    fn still_alive_is_skipped() {
        assert_eq!(classify(WaitStatus::StillAlive).expect("classify"), None);
    }

    #[test]
    fn child_events() {
        assert!(is_child_event(Event::PTRACE_EVENT_FORK as libc::c_int));
        assert!(is_child_event(Event::PTRACE_EVENT_VFORK as libc::c_int));
        assert!(is_child_event(Event::PTRACE_EVENT_CLONE as libc::c_int));
        assert!(!is_child_event(Event::PTRACE_EVENT_EXEC as libc::c_int));
    }

    #[test]
    fn peek_on_untraced_pid_reads_nothing() {
        let backend = PtraceBackend::new();
        let mut buf = [0_u8; 16];
        let n = backend.peek(nix::unistd::getpid(), 0x1000, &mut buf);
        assert_eq!(n, 0);
    }
}
