//! Decoding of path-producing system calls at their exit stop.
//!
//! Only the open family and the access-check family are interpreted. Every
//! other call number is ignored without looking at its registers.

use std::path::{Path, PathBuf};

use nix::unistd::Pid;
use watchtrace_common::config::{LegacyPolicy, TracerConfig};
use watchtrace_common::constants::{SYS_FACCESSAT2, SYS_OPENAT2};
use watchtrace_common::error::{Result, TraceError};
use watchtrace_common::types::{AccessEvent, AccessMode, BaseDir};

use crate::context::ProcessContext;
use crate::memory::{TraceeMemory, read_path, read_u64};
use crate::registers::SyscallRegs;
use crate::resolve::resolve;

#[allow(clippy::cast_sign_loss)]
const SYS_OPENAT: u64 = libc::SYS_openat as u64;
#[allow(clippy::cast_sign_loss)]
const SYS_FACCESSAT: u64 = libc::SYS_faccessat as u64;
#[cfg(target_arch = "x86_64")]
#[allow(clippy::cast_sign_loss)]
const SYS_OPEN: u64 = libc::SYS_open as u64;
#[cfg(target_arch = "x86_64")]
#[allow(clippy::cast_sign_loss)]
const SYS_CREAT: u64 = libc::SYS_creat as u64;
#[cfg(target_arch = "x86_64")]
#[allow(clippy::cast_sign_loss)]
const SYS_ACCESS: u64 = libc::SYS_access as u64;

/// A system call the interpreter understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathCall {
    /// `openat(dirfd, path, flags, mode)`.
    OpenAt,
    /// `openat2(dirfd, path, how, size)`.
    OpenAt2,
    /// `faccessat(dirfd, path, mode)`.
    AccessAt,
    /// `faccessat2(dirfd, path, mode, flags)`.
    AccessAt2,
    /// Legacy `open(path, flags, mode)`.
    Open,
    /// Legacy `creat(path, mode)`.
    Creat,
    /// Legacy `access(path, mode)`.
    Access,
}

impl PathCall {
    /// Classifies a raw system call number.
    #[must_use]
    pub fn from_nr(nr: u64) -> Option<Self> {
        match nr {
            SYS_OPENAT => Some(Self::OpenAt),
            SYS_OPENAT2 => Some(Self::OpenAt2),
            SYS_FACCESSAT => Some(Self::AccessAt),
            SYS_FACCESSAT2 => Some(Self::AccessAt2),
            #[cfg(target_arch = "x86_64")]
            SYS_OPEN => Some(Self::Open),
            #[cfg(target_arch = "x86_64")]
            SYS_CREAT => Some(Self::Creat),
            #[cfg(target_arch = "x86_64")]
            SYS_ACCESS => Some(Self::Access),
            _ => None,
        }
    }

    /// Symbolic name, for diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::OpenAt => "openat",
            Self::OpenAt2 => "openat2",
            Self::AccessAt => "faccessat",
            Self::AccessAt2 => "faccessat2",
            Self::Open => "open",
            Self::Creat => "creat",
            Self::Access => "access",
        }
    }

    /// Whether the call takes a path without a directory descriptor.
    #[must_use]
    pub const fn is_legacy(self) -> bool {
        matches!(self, Self::Open | Self::Creat | Self::Access)
    }

    /// Whether a successful call returns a new descriptor.
    #[must_use]
    pub const fn opens(self) -> bool {
        !matches!(self, Self::AccessAt | Self::AccessAt2 | Self::Access)
    }
}

/// Where the path lives and what it was opened or probed for.
struct PathRequest {
    base: Option<BaseDir>,
    path_addr: u64,
    mode: AccessMode,
}

fn decode(call: PathCall, pid: Pid, regs: &SyscallRegs, mem: &dyn TraceeMemory) -> PathRequest {
    let (base, path_addr, mode) = match call {
        PathCall::OpenAt => (
            BaseDir::from_dirfd(regs.arg(0)),
            regs.arg(1),
            AccessMode::from_open_flags(regs.arg(2)),
        ),
        PathCall::OpenAt2 => {
            // `struct open_how` starts with the u64 flags field.
            let flags = read_u64(mem, pid, regs.arg(2)).unwrap_or(0);
            (
                BaseDir::from_dirfd(regs.arg(0)),
                regs.arg(1),
                AccessMode::from_open_flags(flags),
            )
        }
        PathCall::AccessAt | PathCall::AccessAt2 => (
            BaseDir::from_dirfd(regs.arg(0)),
            regs.arg(1),
            AccessMode::from_access_bits(regs.arg(2)),
        ),
        PathCall::Open => (
            Some(BaseDir::WorkingDirectory),
            regs.arg(0),
            AccessMode::from_open_flags(regs.arg(1)),
        ),
        PathCall::Creat => (Some(BaseDir::WorkingDirectory), regs.arg(0), AccessMode::Write),
        PathCall::Access => (
            Some(BaseDir::WorkingDirectory),
            regs.arg(0),
            AccessMode::from_access_bits(regs.arg(1)),
        ),
    };
    PathRequest {
        base,
        path_addr,
        mode,
    }
}

/// Interprets one call-exit stop of `pid`.
///
/// Returns the access to report, if the call named a path that resolves.
/// A successful open also records the resolved path under the returned
/// descriptor in `ctx`. A failed open leaves `ctx` untouched.
///
/// # Errors
///
/// Returns [`TraceError::UnsupportedSyscall`] for a legacy call while
/// `config.legacy_calls` is [`LegacyPolicy::Reject`].
pub fn interpret(
    pid: Pid,
    regs: &SyscallRegs,
    ctx: &mut ProcessContext,
    mem: &dyn TraceeMemory,
    config: &TracerConfig,
) -> Result<Option<AccessEvent>> {
    let Some(call) = PathCall::from_nr(regs.nr) else {
        return Ok(None);
    };
    if call.is_legacy() && config.legacy_calls == LegacyPolicy::Reject {
        return Err(TraceError::UnsupportedSyscall {
            nr: regs.nr,
            name: call.name(),
        });
    }
    if call.opens() && regs.failed() {
        tracing::trace!(pid = pid.as_raw(), call = call.name(), ret = regs.ret, "open failed");
        return Ok(None);
    }

    let request = decode(call, pid, regs, mem);
    let opened = if call.opens() { regs.returned_fd() } else { None };
    let Some(path) = resolve_request(call, pid, regs, &request, ctx, mem, config) else {
        // The descriptor is live but its target is unknown; a stale entry
        // from a reused number must not survive.
        if let Some(fd) = opened {
            ctx.clear_descriptor(fd);
        }
        return Ok(None);
    };

    if let Some(fd) = opened {
        ctx.set_descriptor(fd, path.clone());
    }
    tracing::trace!(pid = pid.as_raw(), call = call.name(), path = %path.display(), "access");
    Ok(Some(AccessEvent::new(pid.as_raw(), request.mode, path)))
}

fn resolve_request(
    call: PathCall,
    pid: Pid,
    regs: &SyscallRegs,
    request: &PathRequest,
    ctx: &ProcessContext,
    mem: &dyn TraceeMemory,
    config: &TracerConfig,
) -> Option<PathBuf> {
    let raw = read_path(mem, pid, request.path_addr, config.path_limit)?;
    let resolved = match request.base {
        Some(base) => resolve(&raw, base, ctx),
        None if Path::new(&raw).is_absolute() => Some(PathBuf::from(&raw)),
        None => None,
    };
    if resolved.is_none() {
        tracing::debug!(
            pid = pid.as_raw(),
            call = call.name(),
            raw = %raw,
            dirfd = regs.arg(0),
            "path unresolved"
        );
    }
    resolved
}
