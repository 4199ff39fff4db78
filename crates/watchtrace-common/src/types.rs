//! Domain primitive types used across the watchtrace workspace.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Access mode requested by an open or access-check call.
///
/// Exactly one mode is produced for every decoded call; `Read` is the
/// default when no write bit is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessMode {
    /// Read-only access.
    Read,
    /// Write-only access.
    Write,
    /// Read and write access.
    ReadWrite,
}

impl AccessMode {
    /// Decodes the access mode from `open(2)`-style flags.
    ///
    /// `O_WRONLY` wins over `O_RDWR` when a caller sets both bits.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_open_flags(flags: u64) -> Self {
        let flags = flags as libc::c_int;
        if flags & libc::O_WRONLY != 0 {
            Self::Write
        } else if flags & libc::O_RDWR != 0 {
            Self::ReadWrite
        } else {
            Self::Read
        }
    }

    /// Decodes the access mode from `access(2)`-style check bits.
    ///
    /// `F_OK` and `X_OK` probes carry no read or write bit and map to `Read`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_access_bits(mode: u64) -> Self {
        let mode = mode as libc::c_int;
        let read = mode & libc::R_OK != 0;
        let write = mode & libc::W_OK != 0;
        match (read, write) {
            (true, true) => Self::ReadWrite,
            (false, true) => Self::Write,
            _ => Self::Read,
        }
    }

    /// Short tag used by the plain output format.
    #[must_use]
    pub const fn as_short(self) -> &'static str {
        match self {
            Self::Read => "r",
            Self::Write => "w",
            Self::ReadWrite => "rw",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::ReadWrite => write!(f, "read-write"),
        }
    }
}

/// Base against which a relative path argument is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseDir {
    /// The calling process's working directory (`AT_FDCWD`).
    WorkingDirectory,
    /// An open directory descriptor.
    Descriptor(u32),
}

impl BaseDir {
    /// Decodes a raw `dirfd` register value.
    ///
    /// Only the low 32 bits are meaningful. Returns `None` for negative
    /// values other than `AT_FDCWD`, which the kernel rejects anyway.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_dirfd(raw: u64) -> Option<Self> {
        let fd = raw as libc::c_int;
        if fd == libc::AT_FDCWD {
            return Some(Self::WorkingDirectory);
        }
        u32::try_from(fd).ok().map(Self::Descriptor)
    }
}

impl fmt::Display for BaseDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkingDirectory => write!(f, "AT_FDCWD"),
            Self::Descriptor(fd) => write!(f, "{fd}"),
        }
    }
}

/// A resolved file access reported by a traced process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    /// Process that made the call.
    pub pid: i32,
    /// Requested access mode.
    pub mode: AccessMode,
    /// Absolute path the call referred to.
    pub path: PathBuf,
}

impl AccessEvent {
    /// Creates a new access event.
    #[must_use]
    pub fn new(pid: i32, mode: AccessMode, path: impl Into<PathBuf>) -> Self {
        Self {
            pid,
            mode,
            path: path.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_flags_default_to_read() {
        assert_eq!(AccessMode::from_open_flags(0), AccessMode::Read);
        let cloexec = u64::try_from(libc::O_CLOEXEC | libc::O_DIRECTORY).unwrap();
        assert_eq!(AccessMode::from_open_flags(cloexec), AccessMode::Read);
    }

    #[test]
    fn open_flags_write_only() {
        let flags = u64::try_from(libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC).unwrap();
        assert_eq!(AccessMode::from_open_flags(flags), AccessMode::Write);
    }

    #[test]
    fn open_flags_read_write() {
        let flags = u64::try_from(libc::O_RDWR | libc::O_APPEND).unwrap();
        assert_eq!(AccessMode::from_open_flags(flags), AccessMode::ReadWrite);
    }

    #[test]
    fn open_flags_both_bits_prefer_write() {
        let flags = u64::try_from(libc::O_WRONLY | libc::O_RDWR).unwrap();
        assert_eq!(AccessMode::from_open_flags(flags), AccessMode::Write);
    }

    #[test]
    fn access_bits_decode() {
        let r = u64::try_from(libc::R_OK).unwrap();
        let w = u64::try_from(libc::W_OK).unwrap();
        let x = u64::try_from(libc::X_OK).unwrap();
        assert_eq!(AccessMode::from_access_bits(0), AccessMode::Read);
        assert_eq!(AccessMode::from_access_bits(x), AccessMode::Read);
        assert_eq!(AccessMode::from_access_bits(r), AccessMode::Read);
        assert_eq!(AccessMode::from_access_bits(w), AccessMode::Write);
        assert_eq!(AccessMode::from_access_bits(r | w), AccessMode::ReadWrite);
    }

    #[test]
    fn dirfd_sentinel_is_working_directory() {
        #[allow(clippy::cast_sign_loss)]
        let raw = i64::from(libc::AT_FDCWD) as u64;
        assert_eq!(BaseDir::from_dirfd(raw), Some(BaseDir::WorkingDirectory));
    }

    #[test]
    fn dirfd_sentinel_in_low_word_only() {
        #[allow(clippy::cast_sign_loss)]
        let raw = u64::from(libc::AT_FDCWD as u32);
        assert_eq!(BaseDir::from_dirfd(raw), Some(BaseDir::WorkingDirectory));
    }

    #[test]
    fn dirfd_descriptor_and_invalid() {
        assert_eq!(BaseDir::from_dirfd(3), Some(BaseDir::Descriptor(3)));
        #[allow(clippy::cast_sign_loss)]
        let bogus = (-7_i64) as u64;
        assert_eq!(BaseDir::from_dirfd(bogus), None);
    }

    #[test]
    fn event_serializes_mode_in_kebab_case() {
        let event = AccessEvent::new(10, AccessMode::ReadWrite, "/tmp/x");
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"pid":10,"mode":"read-write","path":"/tmp/x"}"#);
    }

    #[test]
    fn mode_short_tags() {
        assert_eq!(AccessMode::Read.as_short(), "r");
        assert_eq!(AccessMode::Write.as_short(), "w");
        assert_eq!(AccessMode::ReadWrite.as_short(), "rw");
    }
}
