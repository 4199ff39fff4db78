//! Tracing-facility abstraction.
//!
//! The event loop only speaks to the operating system through
//! [`TraceBackend`], which keeps the loop independent of `ptrace(2)` itself.

pub mod ptrace;

use std::path::PathBuf;

use nix::sys::signal::Signal;
use nix::unistd::Pid;
use watchtrace_common::error::Result;

use crate::memory::TraceeMemory;
use crate::registers::SyscallRegs;

/// A state change reported by the tracing facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceStop {
    /// The process exited normally. Not to be resumed.
    Exited {
        /// Process that exited.
        pid: Pid,
        /// Exit status it passed to `exit(2)`.
        status: i32,
    },
    /// The process was killed by a signal. Not to be resumed.
    Signaled {
        /// Process that was killed.
        pid: Pid,
        /// Terminating signal.
        signal: Signal,
    },
    /// A system-call entry or exit stop.
    SyscallBoundary {
        /// Stopped process.
        pid: Pid,
    },
    /// The process created a child through fork, vfork or clone.
    NewChild {
        /// Stopped parent.
        pid: Pid,
        /// Newly traced child.
        child: Pid,
    },
    /// Any other tracing event stop (exec, exit notification, ...).
    Event {
        /// Stopped process.
        pid: Pid,
    },
    /// A signal-delivery stop.
    Signal {
        /// Stopped process.
        pid: Pid,
        /// Signal about to be delivered.
        signal: Signal,
    },
}

/// Platform tracing facility used by the event loop.
///
/// Implementors block in [`TraceBackend::wait`] and must report stops of
/// every process in the traced tree.
pub trait TraceBackend: TraceeMemory {
    /// Blocks until any traced process changes state.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails, including when no tracee is left.
    fn wait(&mut self) -> Result<TraceStop>;

    /// Fetches the system-call registers of a stopped process.
    ///
    /// # Errors
    ///
    /// Returns an error if the registers cannot be read.
    fn registers(&mut self, pid: Pid) -> Result<SyscallRegs>;

    /// Snapshots the working directory of a process. Best effort.
    fn cwd(&self, pid: Pid) -> Option<PathBuf>;

    /// Resumes a stopped process until its next call boundary, optionally
    /// delivering `signal`.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be resumed.
    fn resume(&mut self, pid: Pid, signal: Option<Signal>) -> Result<()>;
}
