//! Path resolution against a process's modelled state.
//!
//! Resolution mirrors what the traced process would compute from its own
//! arguments. Symbolic links are not followed and `..` is not collapsed.

use std::path::{Path, PathBuf};

use watchtrace_common::types::BaseDir;

use crate::context::{FdEntry, ProcessContext};

/// Resolves a raw path argument to an absolute path.
///
/// Absolute input is returned unchanged whatever `base` says. A relative
/// path needs a known base: the snapshotted working directory, or a
/// descriptor slot holding a recorded path. Empty input, a slot beyond the
/// table, a standard stream or an unknown entry all yield `None`.
#[must_use]
pub fn resolve(raw: &str, base: BaseDir, ctx: &ProcessContext) -> Option<PathBuf> {
    if raw.is_empty() {
        return None;
    }
    let tail = Path::new(raw);
    if tail.is_absolute() {
        return Some(PathBuf::from(raw));
    }

    let dir = match base {
        BaseDir::WorkingDirectory => ctx.cwd()?,
        BaseDir::Descriptor(fd) => match ctx.descriptor(fd)? {
            FdEntry::Path(dir) => dir.as_path(),
            FdEntry::StdStream | FdEntry::Unknown => return None,
        },
    };
    Some(join(dir, tail))
}

/// Joins `tail` onto `dir`, dropping `.` segments and repeated separators.
fn join(dir: &Path, tail: &Path) -> PathBuf {
    dir.join(tail).components().collect()
}
