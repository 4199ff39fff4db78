//! Configuration model for the tracing engine.

use serde::{Deserialize, Serialize};

use crate::constants::PATH_MAX;

/// What to do when a traced process uses a non-directory-relative
/// `open`/`creat`/`access` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LegacyPolicy {
    /// Abort the trace with [`crate::error::TraceError::UnsupportedSyscall`].
    #[default]
    Reject,
    /// Resolve the path against the process working directory.
    Resolve,
}

/// Root configuration for a tracing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracerConfig {
    /// Handling of legacy non-directory-relative calls.
    pub legacy_calls: LegacyPolicy,
    /// Upper bound on bytes peeked from a tracee for one path.
    pub path_limit: usize,
    /// Re-inject signals delivered to tracees when resuming them.
    pub forward_signals: bool,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            legacy_calls: LegacyPolicy::Reject,
            path_limit: PATH_MAX,
            forward_signals: true,
        }
    }
}
