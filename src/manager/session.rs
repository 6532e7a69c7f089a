// src/manager/session.rs

//! Session records and the internal per-session handle.

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};

use crate::exec::{RunConfig, TerminateRequest};
use crate::manager::{SessionEvent, SessionState};
use crate::types::{ScriptId, SessionId};

/// One spawned-process execution instance as seen by callers.
///
/// Snapshots of this record are returned by `status`; the authoritative copy
/// lives in the job manager's session map and is updated by the session's
/// monitor task.
#[derive(Debug, Clone)]
pub struct RunSession {
    pub session_id: SessionId,
    pub script_id: ScriptId,
    pub config: RunConfig,
    pub state: SessionState,
    pub pid: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub exit_code: Option<i32>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Mid-run stream failure annotation, if any.
    pub error: Option<String>,
}

/// Internal handle for a registered session.
///
/// - `terminate_tx` delivers stop requests to the monitor task, which owns
///   the `Child`.
/// - `events` holds the subscriber end of the event channel until someone
///   claims it via `subscribe` (first subscriber wins).
/// - `state_rx` lets `wait` suspend until a terminal state without polling.
pub(crate) struct ActiveSession {
    pub record: RunSession,
    pub terminate_tx: mpsc::Sender<TerminateRequest>,
    pub events: Option<mpsc::Receiver<SessionEvent>>,
    pub state_rx: watch::Receiver<SessionState>,
}
