//! # watchtrace-core
//!
//! The tracing engine behind `watchtrace`.
//!
//! It launches a program under `ptrace(2)`, follows every process the
//! program forks, and reports each file path the tree opens or probes:
//! - **Context table**: per-process working directory, descriptor paths,
//!   and call phase.
//! - **Resolver**: turns relative path arguments into absolute paths.
//! - **Interpreter**: decodes `openat`/`faccessat` style calls at their
//!   exit stop.
//! - **Tracer**: the wait/resume event loop over a [`backend::TraceBackend`].
//!
//! The engine is single-threaded. All unsafe code is confined to the
//! launcher's `fork`.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod backend;
pub mod context;
pub mod launch;
pub mod memory;
pub mod registers;
pub mod resolve;
pub mod sink;
pub mod syscall;
pub mod tracer;
