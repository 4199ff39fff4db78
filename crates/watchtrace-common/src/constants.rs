//! System-wide constants.

/// Binary name for the CLI.
pub const BIN_NAME: &str = "watchtrace";

/// Maximum number of bytes peeked from a tracee for a single path,
/// including the terminating NUL.
#[allow(clippy::cast_sign_loss)]
pub const PATH_MAX: usize = libc::PATH_MAX as usize;

/// Number of descriptors pre-seeded as standard streams in every
/// process context (stdin, stdout, stderr).
pub const STD_STREAM_COUNT: usize = 3;

/// Base added to a terminating signal number to form an exit status,
/// following the shell convention.
pub const SIGNAL_EXIT_BASE: i32 = 128;

/// `openat2(2)` system call number. New syscalls share one number on
/// every architecture.
pub const SYS_OPENAT2: u64 = 437;

/// `faccessat2(2)` system call number.
pub const SYS_FACCESSAT2: u64 = 439;
