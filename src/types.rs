use std::str::FromStr;

use serde::Deserialize;

/// Canonical script identifier type used throughout the crate.
///
/// Script ids are the keys of the `[script.<id>]` catalog sections.
pub type ScriptId = String;

/// Identifier of one spawned-process execution instance.
///
/// Session ids are allocated by the job manager from a monotonically
/// increasing counter and are unique within a process lifetime.
pub type SessionId = u64;

/// Policy for starting a script that already has a live session.
///
/// - `Deny`: reject the new start with `AlreadyRunning` (default). Prevents
///   resource contention and ambiguous output attribution.
/// - `Allow`: run any number of sessions of the same script concurrently;
///   each gets its own session id and its own event sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrentRunPolicy {
    Deny,
    Allow,
}

impl Default for ConcurrentRunPolicy {
    fn default() -> Self {
        ConcurrentRunPolicy::Deny
    }
}

impl FromStr for ConcurrentRunPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "deny" => Ok(ConcurrentRunPolicy::Deny),
            "allow" => Ok(ConcurrentRunPolicy::Allow),
            other => Err(format!(
                "invalid concurrent_runs policy: {other} (expected \"deny\" or \"allow\")"
            )),
        }
    }
}
