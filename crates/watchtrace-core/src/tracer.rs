//! The tracing event loop.
//!
//! One blocking wait per iteration; every stop except an exit is followed
//! by exactly one resume. Stops of different processes interleave freely,
//! so all per-process state lives in the [`ContextTable`].

use nix::sys::signal::Signal;
use nix::unistd::Pid;
use watchtrace_common::config::TracerConfig;
use watchtrace_common::constants::SIGNAL_EXIT_BASE;
use watchtrace_common::error::Result;

use crate::backend::{TraceBackend, TraceStop};
use crate::context::{CallPhase, ContextTable};
use crate::sink::EventSink;
use crate::syscall::interpret;

/// Drives a traced process tree until its root exits.
#[derive(Debug)]
pub struct Tracer<B> {
    backend: B,
    root: Pid,
    table: ContextTable,
    config: TracerConfig,
}

impl<B: TraceBackend> Tracer<B> {
    /// Creates a tracer for the tree rooted at `root`.
    ///
    /// `root` must already be attached and resumed with call-boundary
    /// stops enabled.
    #[must_use]
    pub fn new(backend: B, root: Pid, config: TracerConfig) -> Self {
        Self {
            backend,
            root,
            table: ContextTable::new(),
            config,
        }
    }

    /// Per-process state gathered so far.
    #[must_use]
    pub const fn table(&self) -> &ContextTable {
        &self.table
    }

    /// The backend driving this tracer.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Runs until the root process exits and returns its exit status.
    ///
    /// A root killed by a signal yields `128 + signal`.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting or register access fails, if the sink
    /// rejects an event, or if a traced process uses a call form the
    /// tracer refuses to model.
    pub fn run(&mut self, sink: &mut dyn EventSink) -> Result<i32> {
        tracing::info!(root = self.root.as_raw(), "tracing started");
        loop {
            if let Some(status) = self.step(sink)? {
                tracing::info!(root = self.root.as_raw(), status, "root process exited");
                return Ok(status);
            }
        }
    }

    /// Handles a single state change. Returns the exit status once the
    /// root process is gone.
    ///
    /// # Errors
    ///
    /// See [`Tracer::run`].
    pub fn step(&mut self, sink: &mut dyn EventSink) -> Result<Option<i32>> {
        match self.backend.wait()? {
            TraceStop::Exited { pid, status } => Ok(self.on_exit(pid, status)),
            TraceStop::Signaled { pid, signal } => {
                Ok(self.on_exit(pid, SIGNAL_EXIT_BASE + signal as i32))
            }
            TraceStop::SyscallBoundary { pid } => {
                self.on_call_boundary(pid, sink)?;
                self.resume(pid, None)?;
                Ok(None)
            }
            TraceStop::NewChild { pid, child } => {
                let backend = &self.backend;
                let _ = self.table.get_or_create(child, || backend.cwd(child));
                tracing::debug!(parent = pid.as_raw(), child = child.as_raw(), "new tracee");
                self.resume(pid, None)?;
                Ok(None)
            }
            TraceStop::Event { pid } => {
                self.resume(pid, None)?;
                Ok(None)
            }
            TraceStop::Signal { pid, signal } => {
                let forward = self.forwarded(signal);
                tracing::trace!(pid = pid.as_raw(), signal = %signal, forward = forward.is_some(), "signal stop");
                self.resume(pid, forward)?;
                Ok(None)
            }
        }
    }

    fn on_exit(&mut self, pid: Pid, status: i32) -> Option<i32> {
        if pid == self.root {
            return Some(status);
        }
        tracing::debug!(pid = pid.as_raw(), status, "tracee exited");
        let _ = self.table.remove(pid);
        None
    }

    fn on_call_boundary(&mut self, pid: Pid, sink: &mut dyn EventSink) -> Result<()> {
        let backend = &mut self.backend;
        let ctx = self.table.get_or_create(pid, || backend.cwd(pid));
        if ctx.toggle_call_phase() == CallPhase::Entry {
            return Ok(());
        }

        let regs = match backend.registers(pid) {
            Ok(regs) => regs,
            Err(e) if e.is_vanished_tracee() => {
                tracing::debug!(pid = pid.as_raw(), "tracee vanished before register read");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if let Some(event) = interpret(pid, &regs, ctx, &*backend, &self.config)? {
            sink.record(&event)?;
        }
        Ok(())
    }

    fn forwarded(&self, signal: Signal) -> Option<Signal> {
        let artefact = matches!(signal, Signal::SIGSTOP | Signal::SIGTRAP);
        (self.config.forward_signals && !artefact).then_some(signal)
    }

    fn resume(&mut self, pid: Pid, signal: Option<Signal>) -> Result<()> {
        match self.backend.resume(pid, signal) {
            Err(e) if e.is_vanished_tracee() => {
                tracing::debug!(pid = pid.as_raw(), "tracee vanished before resume");
                Ok(())
            }
            other => other,
        }
    }
}
