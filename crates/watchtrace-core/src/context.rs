//! Per-process tracing state.
//!
//! The table maps every traced pid to what the tracer believes about it:
//! its working directory at first sight, the paths behind the descriptors
//! it has opened, and whether the next call-boundary stop is an entry or
//! an exit. It is owned by the event loop and only ever touched from that
//! single thread.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use nix::unistd::Pid;
use watchtrace_common::constants::STD_STREAM_COUNT;

/// What the tracer knows about one descriptor slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FdEntry {
    /// Never observed, or padding created when the table grew.
    Unknown,
    /// One of the inherited standard streams. Never a usable directory base.
    StdStream,
    /// Absolute path recorded by the last successful open into this slot.
    Path(PathBuf),
}

/// Which half of a system call a boundary stop belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    /// The tracee is entering the call; arguments only, no result yet.
    Entry,
    /// The tracee is leaving the call; the return value is available.
    Exit,
}

/// Tracing state for a single process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessContext {
    cwd: Option<PathBuf>,
    fds: Vec<FdEntry>,
    in_call: bool,
}

impl ProcessContext {
    /// Creates a context with the standard streams pre-seeded.
    ///
    /// `cwd` is `None` when the working directory could not be read; every
    /// resolution relying on it is then skipped.
    #[must_use]
    pub fn new(cwd: Option<PathBuf>) -> Self {
        Self {
            cwd: cwd.filter(|p| !p.as_os_str().is_empty()),
            fds: vec![FdEntry::StdStream; STD_STREAM_COUNT],
            in_call: false,
        }
    }

    /// Working directory snapshotted when the process was first observed.
    #[must_use]
    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Returns the entry for `fd`, or `None` if it lies beyond the table.
    #[must_use]
    pub fn descriptor(&self, fd: u32) -> Option<&FdEntry> {
        usize::try_from(fd).ok().and_then(|i| self.fds.get(i))
    }

    /// Current length of the descriptor table.
    #[must_use]
    pub fn descriptor_count(&self) -> usize {
        self.fds.len()
    }

    /// Records `path` as the target of `fd`, growing the table as needed.
    pub fn set_descriptor(&mut self, fd: u32, path: PathBuf) {
        let Ok(slot) = usize::try_from(fd) else {
            return;
        };
        if self.fds.len() <= slot {
            self.fds.resize(slot + 1, FdEntry::Unknown);
        }
        self.fds[slot] = FdEntry::Path(path);
    }

    /// Forgets whatever `fd` referred to. Slots beyond the table already
    /// read as unknown and are left alone.
    pub fn clear_descriptor(&mut self, fd: u32) {
        if let Some(entry) = usize::try_from(fd).ok().and_then(|i| self.fds.get_mut(i)) {
            *entry = FdEntry::Unknown;
        }
    }

    /// Whether the process is currently between a call entry and its exit.
    #[must_use]
    pub const fn in_call(&self) -> bool {
        self.in_call
    }

    /// Flips the call phase for a new boundary stop and reports which half
    /// that stop is.
    pub fn toggle_call_phase(&mut self) -> CallPhase {
        self.in_call = !self.in_call;
        if self.in_call {
            CallPhase::Entry
        } else {
            CallPhase::Exit
        }
    }
}

/// Mapping from pid to [`ProcessContext`].
#[derive(Debug, Default)]
pub struct ContextTable {
    procs: HashMap<Pid, ProcessContext>,
}

impl ContextTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the context for `pid`, creating it if absent.
    ///
    /// `cwd` is only invoked when a new context is materialised, so the
    /// working directory is snapshotted exactly once per process.
    pub fn get_or_create(
        &mut self,
        pid: Pid,
        cwd: impl FnOnce() -> Option<PathBuf>,
    ) -> &mut ProcessContext {
        self.procs.entry(pid).or_insert_with(|| {
            let cwd = cwd();
            tracing::debug!(pid = pid.as_raw(), cwd = ?cwd, "tracking new process");
            ProcessContext::new(cwd)
        })
    }

    /// Returns the context for `pid`, if tracked.
    #[must_use]
    pub fn get(&self, pid: Pid) -> Option<&ProcessContext> {
        self.procs.get(&pid)
    }

    /// Records a descriptor for a tracked process. Returns false if `pid`
    /// is unknown.
    pub fn set_descriptor(&mut self, pid: Pid, fd: u32, path: PathBuf) -> bool {
        self.procs.get_mut(&pid).is_some_and(|ctx| {
            ctx.set_descriptor(fd, path);
            true
        })
    }

    /// Drops the context of an exited process.
    pub fn remove(&mut self, pid: Pid) -> Option<ProcessContext> {
        let removed = self.procs.remove(&pid);
        if removed.is_some() {
            tracing::debug!(pid = pid.as_raw(), "process context dropped");
        }
        removed
    }

    /// Whether `pid` is tracked.
    #[must_use]
    pub fn contains(&self, pid: Pid) -> bool {
        self.procs.contains_key(&pid)
    }

    /// Number of tracked processes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.procs.len()
    }

    /// Whether no process is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.procs.is_empty()
    }
}

/// Reads the working directory of `pid` from procfs.
///
/// Best effort: a process that already exited or a denied read yields `None`.
#[must_use]
pub fn snapshot_cwd(pid: Pid) -> Option<PathBuf> {
    let link = format!("/proc/{pid}/cwd");
    match std::fs::read_link(&link) {
        Ok(cwd) => Some(cwd),
        Err(e) => {
            tracing::debug!(pid = pid.as_raw(), error = %e, "cwd snapshot failed");
            None
        }
    }
}
