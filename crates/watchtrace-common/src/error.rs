//! Unified error type for the watchtrace workspace.
//!
//! Only conditions that invalidate the tracer's model of the traced program
//! surface here. Per-event conditions such as an unresolvable path are not
//! errors; the interpreter skips those events silently.

use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum TraceError {
    /// The target command could not be found on `PATH`.
    #[error("command not found: {command}")]
    CommandNotFound {
        /// Command name as given on the command line.
        command: String,
    },

    /// Starting the target program or the attach handshake failed.
    #[error("failed to launch {command}: {message}")]
    Launch {
        /// Command being launched.
        command: String,
        /// Description of the failed step.
        message: String,
    },

    /// The traced program issued a call form the tracer does not model.
    #[error("unsupported syscall {name} (nr {nr}); rerun with --resolve-legacy to treat it as cwd-relative")]
    UnsupportedSyscall {
        /// Raw system call number.
        nr: u64,
        /// Symbolic name of the call.
        name: &'static str,
    },

    /// A tracing-control request failed.
    #[error("ptrace {op} failed for pid {pid}: {source}")]
    Ptrace {
        /// Operation that failed (`wait`, `getregs`, `syscall`, ...).
        op: &'static str,
        /// Process the request targeted, or -1 for "any child".
        pid: i32,
        /// Underlying errno.
        source: Errno,
    },

    /// Register decoding is not implemented for this architecture.
    #[error("syscall register decoding is not supported on {arch}")]
    UnsupportedArch {
        /// Target architecture name.
        arch: &'static str,
    },

    /// A tracee executes 32-bit code, whose call numbers the tracer does
    /// not decode.
    #[error("pid {pid} runs in 32-bit compatibility mode, which is not supported")]
    CompatMode {
        /// Process caught in compatibility mode.
        pid: i32,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Serialization of an output record failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl TraceError {
    /// Builds a [`TraceError::Ptrace`] for the given operation and raw pid.
    #[must_use]
    pub const fn ptrace(op: &'static str, pid: i32, source: Errno) -> Self {
        Self::Ptrace { op, pid, source }
    }

    /// Returns true when the error means the tracee no longer exists.
    ///
    /// A tracee can die between being reported stopped and being resumed;
    /// the kernel then answers `ESRCH` and the exit shows up on the next wait.
    #[must_use]
    pub const fn is_vanished_tracee(&self) -> bool {
        matches!(
            self,
            Self::Ptrace {
                source: Errno::ESRCH,
                ..
            }
        )
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, TraceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn esrch_is_a_vanished_tracee() {
        let err = TraceError::ptrace("syscall", 42, Errno::ESRCH);
        assert!(err.is_vanished_tracee());
    }

    #[test]
    fn other_errno_is_not_a_vanished_tracee() {
        let err = TraceError::ptrace("getregs", 42, Errno::EPERM);
        assert!(!err.is_vanished_tracee());
    }

    #[test]
    fn unsupported_syscall_names_the_call() {
        let err = TraceError::UnsupportedSyscall {
            nr: 2,
            name: "open",
        };
        let msg = err.to_string();
        assert!(msg.contains("open"), "{msg}");
        assert!(msg.contains("nr 2"), "{msg}");
    }
}
