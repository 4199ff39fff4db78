//! Bounded reads from a tracee's address space.
//!
//! A tracee can unmap or rewrite memory between its stop and our peek, so
//! every read here is best effort. Short reads are treated as a buffer that
//! ends in zeros, and only the bytes before the first NUL are used.

use nix::unistd::Pid;

/// Read access to a traced process's memory.
pub trait TraceeMemory {
    /// Copies bytes starting at `addr` into `buf`.
    ///
    /// Implementations may stop early once a NUL byte has been copied, and
    /// must stop at the first fault. Returns the number of bytes copied.
    fn peek(&self, pid: Pid, addr: u64, buf: &mut [u8]) -> usize;
}

/// Reads a NUL-terminated path of at most `limit` bytes from a tracee.
///
/// Returns `None` for a null pointer, an empty string, a string with no
/// terminator inside `limit`, or bytes that are not valid UTF-8.
pub fn read_path(mem: &dyn TraceeMemory, pid: Pid, addr: u64, limit: usize) -> Option<String> {
    if addr == 0 || limit == 0 {
        return None;
    }
    let mut buf = vec![0_u8; limit];
    let copied = mem.peek(pid, addr, &mut buf).min(limit);
    let end = buf[..copied]
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(copied);
    if end == limit {
        tracing::debug!(pid = pid.as_raw(), addr, "path exceeds peek limit");
        return None;
    }
    buf.truncate(end);
    match String::from_utf8(buf) {
        Ok(path) if !path.is_empty() => Some(path),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(pid = pid.as_raw(), addr, error = %e, "path is not valid UTF-8");
            None
        }
    }
}

/// Reads a native-endian `u64` from a tracee, or `None` on a short read.
pub fn read_u64(mem: &dyn TraceeMemory, pid: Pid, addr: u64) -> Option<u64> {
    if addr == 0 {
        return None;
    }
    let mut buf = [0_u8; 8];
    (mem.peek(pid, addr, &mut buf) >= buf.len()).then(|| u64::from_ne_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One readable region; everything else faults.
    struct Region {
        base: u64,
        bytes: Vec<u8>,
    }

    impl TraceeMemory for Region {
        fn peek(&self, _pid: Pid, addr: u64, buf: &mut [u8]) -> usize {
            let Some(offset) = addr.checked_sub(self.base) else {
                return 0;
            };
            let Ok(offset) = usize::try_from(offset) else {
                return 0;
            };
            let available = self.bytes.get(offset..).unwrap_or_default();
            let n = available.len().min(buf.len());
            buf[..n].copy_from_slice(&available[..n]);
            n
        }
    }

    fn pid() -> Pid {
        Pid::from_raw(100)
    }

    #[test]
    fn reads_up_to_first_nul() {
        let mem = Region {
            base: 0x1000,
            bytes: b"data.txt\0garbage".to_vec(),
        };
        assert_eq!(
            read_path(&mem, pid(), 0x1000, 4096).as_deref(),
            Some("data.txt")
        );
    }

    #[test]
    fn null_pointer_and_empty_string_are_none() {
        let mem = Region {
            base: 0x1000,
            bytes: b"\0".to_vec(),
        };
        assert_eq!(read_path(&mem, pid(), 0, 4096), None);
        assert_eq!(read_path(&mem, pid(), 0x1000, 4096), None);
    }

    #[test]
    fn short_read_is_zero_terminated() {
        let mem = Region {
            base: 0x1000,
            bytes: b"partial".to_vec(),
        };
        assert_eq!(
            read_path(&mem, pid(), 0x1000, 4096).as_deref(),
            Some("partial")
        );
    }

    #[test]
    fn unreadable_address_is_none() {
        let mem = Region {
            base: 0x1000,
            bytes: b"x\0".to_vec(),
        };
        assert_eq!(read_path(&mem, pid(), 0x9000, 4096), None);
    }

    #[test]
    fn unterminated_within_limit_is_none() {
        let mem = Region {
            base: 0x1000,
            bytes: vec![b'a'; 64],
        };
        assert_eq!(read_path(&mem, pid(), 0x1000, 16), None);
    }

    #[test]
    fn invalid_utf8_is_none() {
        let mem = Region {
            base: 0x1000,
            bytes: vec![0xff, 0xfe, 0],
        };
        assert_eq!(read_path(&mem, pid(), 0x1000, 4096), None);
    }

    #[test]
    fn reads_u64_native_endian() {
        let mem = Region {
            base: 0x2000,
            bytes: 0x0241_u64.to_ne_bytes().to_vec(),
        };
        assert_eq!(read_u64(&mem, pid(), 0x2000), Some(0x0241));
        assert_eq!(read_u64(&mem, pid(), 0x2004), None);
    }
}
