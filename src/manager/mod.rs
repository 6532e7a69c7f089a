// src/manager/mod.rs

//! Session lifecycle orchestration.
//!
//! The job manager is the only mutator of the active-session map. It ties
//! together:
//!
//! - spawning via `exec::supervisor` (spawn failures surface synchronously,
//!   no session is registered),
//! - the per-session stream readers from `exec::stream`,
//! - a monitor task per session that observes exit, handles terminate
//!   requests and publishes the terminal event exactly once.
//!
//! Subscribers consume a per-session event stream: `Started`, then zero or
//! more `Log`s in sequence order, then `Closed` once both streams have
//! flushed, then exactly one of `Exited` / `Killed`. The stream is finite and
//! non-restartable.

pub mod jobs;
pub mod session;

use crate::exec::LogEvent;
use crate::types::SessionId;

pub use jobs::{JobManager, JobManagerConfig};
pub use session::RunSession;

/// Lifecycle state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepted, process being created.
    Starting,
    /// Process alive, streams flowing.
    Running,
    /// Stop requested, waiting for the process to go away.
    Exiting,
    /// Process ended on its own.
    Exited,
    /// Process ended because `stop` was called.
    Killed,
    /// Process creation failed after the session was provisionally accepted.
    FailedToStart,
}

impl SessionState {
    /// Terminal states see no further lifecycle transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Exited | SessionState::Killed | SessionState::FailedToStart
        )
    }
}

/// Events flowing from a session to its subscriber.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The process was created; echoes the resolved command line once.
    Started {
        session_id: SessionId,
        pid: Option<u32>,
        command_line: String,
    },
    /// One decoded output line.
    Log(LogEvent),
    /// Both stream readers have flushed; no further `Log` events follow.
    Closed { session_id: SessionId },
    /// The process ended on its own. `error` carries a mid-run stream
    /// failure annotation, if any; buffered output was still delivered.
    Exited {
        session_id: SessionId,
        exit_code: Option<i32>,
        error: Option<String>,
    },
    /// The process ended because `stop` was called.
    Killed { session_id: SessionId },
}
