//! Architecture-neutral view of a tracee's registers at a call boundary.

#[cfg(target_arch = "x86_64")]
use watchtrace_common::error::{Result, TraceError};

/// Code segment selector of 32-bit user code on x86_64 Linux.
#[cfg(target_arch = "x86_64")]
const COMPAT_CS: u64 = 0x23;

/// System call number, arguments and return value captured at a stop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyscallRegs {
    /// Original system call number.
    pub nr: u64,
    /// Raw argument registers in calling-convention order.
    pub args: [u64; 6],
    /// Return value. Only meaningful at a call-exit stop.
    pub ret: i64,
}

impl SyscallRegs {
    /// Creates a snapshot from its parts.
    #[must_use]
    pub const fn new(nr: u64, args: [u64; 6], ret: i64) -> Self {
        Self { nr, args, ret }
    }

    /// Returns argument `index`, or 0 past the sixth.
    #[must_use]
    pub const fn arg(&self, index: usize) -> u64 {
        if index < self.args.len() {
            self.args[index]
        } else {
            0
        }
    }

    /// Whether the call returned an error (`-errno`).
    #[must_use]
    pub const fn failed(&self) -> bool {
        self.ret < 0
    }

    /// The return value as a new descriptor number, if it is one.
    #[must_use]
    pub fn returned_fd(&self) -> Option<u32> {
        u32::try_from(self.ret).ok()
    }
}

#[cfg(target_arch = "x86_64")]
impl SyscallRegs {
    /// Converts an x86_64 register dump taken from `pid`.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::CompatMode`] when `pid` executes 32-bit code.
    /// Its call numbers follow the i386 table and would be misread.
    #[allow(clippy::cast_possible_wrap)]
    pub fn from_x86_64(pid: i32, regs: &libc::user_regs_struct) -> Result<Self> {
        if regs.cs == COMPAT_CS {
            return Err(TraceError::CompatMode { pid });
        }
        Ok(Self {
            nr: regs.orig_rax,
            args: [regs.rdi, regs.rsi, regs.rdx, regs.r10, regs.r8, regs.r9],
            ret: regs.rax as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_return_is_failure() {
        let regs = SyscallRegs::new(257, [0; 6], -2);
        assert!(regs.failed());
        assert_eq!(regs.returned_fd(), None);
    }

    #[test]
    fn returned_fd_on_success() {
        let regs = SyscallRegs::new(257, [0; 6], 5);
        assert!(!regs.failed());
        assert_eq!(regs.returned_fd(), Some(5));
    }

    #[test]
    fn arg_past_sixth_is_zero() {
        let regs = SyscallRegs::new(0, [1, 2, 3, 4, 5, 6], 0);
        assert_eq!(regs.arg(2), 3);
        assert_eq!(regs.arg(6), 0);
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn x86_64_register_mapping() {
        // SAFETY: user_regs_struct is plain integers; all-zero is valid.
        #[allow(unsafe_code)]
        let mut raw: libc::user_regs_struct = unsafe { std::mem::zeroed() };
        raw.orig_rax = 257;
        raw.rdi = 1;
        raw.rsi = 2;
        raw.rdx = 3;
        raw.r10 = 4;
        raw.r8 = 5;
        raw.r9 = 6;
        raw.rax = u64::MAX;
        raw.cs = 0x33;
        let regs = SyscallRegs::from_x86_64(1, &raw).expect("64-bit tracee");
        assert_eq!(regs.nr, 257);
        assert_eq!(regs.args, [1, 2, 3, 4, 5, 6]);
        assert_eq!(regs.ret, -1);
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn compat_mode_tracee_is_refused() {
        // SAFETY: user_regs_struct is plain integers; all-zero is valid.
        #[allow(unsafe_code)]
        let mut raw: libc::user_regs_struct = unsafe { std::mem::zeroed() };
        // i386 fork, which the 64-bit table would read as open.
        raw.orig_rax = 2;
        raw.cs = COMPAT_CS;
        let err = SyscallRegs::from_x86_64(77, &raw).expect_err("compat mode");
        assert!(matches!(err, TraceError::CompatMode { pid: 77 }), "{err}");
    }
}
