// src/manager/jobs.rs

//! The job manager: start/stop/status/subscribe over concurrent sessions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::process::Child;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ConfigSection;
use crate::errors::{Result, ScriptdeckError};
use crate::exec::stream::spawn_stream_reader;
use crate::exec::{supervisor, RunConfig, StreamKind, TerminateRequest};
use crate::manager::session::ActiveSession;
use crate::manager::{RunSession, SessionEvent, SessionState};
use crate::types::{ConcurrentRunPolicy, ScriptId, SessionId};

/// Engine-level knobs for the job manager.
#[derive(Debug, Clone, Copy)]
pub struct JobManagerConfig {
    /// Whether one script may have several live sessions at once.
    pub concurrent_runs: ConcurrentRunPolicy,
    /// Default grace period between the polite stop signal and the forced
    /// kill.
    pub terminate_grace: Duration,
    /// Capacity of each session's event channel.
    pub event_capacity: usize,
}

impl Default for JobManagerConfig {
    fn default() -> Self {
        Self {
            concurrent_runs: ConcurrentRunPolicy::default(),
            terminate_grace: Duration::from_secs(3),
            event_capacity: 256,
        }
    }
}

impl JobManagerConfig {
    pub fn from_catalog(section: &ConfigSection) -> Self {
        Self {
            concurrent_runs: section.concurrent_runs,
            terminate_grace: section.terminate_grace(),
            event_capacity: section.event_capacity,
        }
    }
}

/// Orchestrates zero or more concurrent run sessions.
///
/// The active-session map is the only shared mutable state; all mutation
/// goes through this struct and the per-session monitor tasks it spawns.
/// `status`/`session`/`sessions` return snapshots and never suspend.
pub struct JobManager {
    config: JobManagerConfig,
    next_session_id: AtomicU64,
    sessions: Arc<Mutex<HashMap<SessionId, ActiveSession>>>,
}

impl JobManager {
    pub fn new(config: JobManagerConfig) -> Self {
        Self {
            config,
            next_session_id: AtomicU64::new(0),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Launch a script.
    ///
    /// Fails with [`ScriptdeckError::AlreadyRunning`] if the script has a
    /// live session and concurrent runs are denied, and with
    /// [`ScriptdeckError::Spawn`] when process creation fails; in both cases
    /// no session is registered. On success the session is registered before
    /// this returns and its events can be claimed with [`subscribe`].
    ///
    /// [`subscribe`]: Self::subscribe
    pub fn start(&self, script_id: &str, config: RunConfig) -> Result<SessionId> {
        let mut sessions = self.lock_sessions();

        if self.config.concurrent_runs == ConcurrentRunPolicy::Deny {
            let live = sessions
                .values()
                .any(|s| s.record.script_id == script_id && !s.record.state.is_terminal());
            if live {
                debug!(script = %script_id, "start rejected: session already live");
                return Err(ScriptdeckError::AlreadyRunning(script_id.to_string()));
            }
        }

        let spawned = supervisor::spawn(&config)?;
        let session_id = self.next_session_id.fetch_add(1, Ordering::SeqCst) + 1;

        let (events_tx, events_rx) = mpsc::channel::<SessionEvent>(self.config.event_capacity);
        let (terminate_tx, terminate_rx) = mpsc::channel::<TerminateRequest>(4);
        let (state_tx, state_rx) = watch::channel(SessionState::Starting);
        let sequence = Arc::new(AtomicU64::new(0));

        // First event on the channel; capacity is validated >= 1.
        let _ = events_tx.try_send(SessionEvent::Started {
            session_id,
            pid: spawned.pid,
            command_line: config.command_line(),
        });

        let stdout_reader = spawn_stream_reader(
            session_id,
            StreamKind::Stdout,
            spawned.stdout,
            Arc::clone(&sequence),
            events_tx.clone(),
        );
        let stderr_reader = spawn_stream_reader(
            session_id,
            StreamKind::Stderr,
            spawned.stderr,
            Arc::clone(&sequence),
            events_tx.clone(),
        );

        let record = RunSession {
            session_id,
            script_id: script_id.to_string(),
            config,
            state: SessionState::Starting,
            pid: spawned.pid,
            started_at: Utc::now(),
            exit_code: None,
            ended_at: None,
            error: None,
        };

        sessions.insert(
            session_id,
            ActiveSession {
                record,
                terminate_tx,
                events: Some(events_rx),
                state_rx,
            },
        );
        drop(sessions);

        info!(session_id, script = %script_id, pid = spawned.pid, "session started");

        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(monitor_session(
            session_id,
            script_id.to_string(),
            spawned.child,
            spawned.pid,
            (stdout_reader, stderr_reader),
            terminate_rx,
            events_tx,
            state_tx,
            sessions,
        ));

        Ok(session_id)
    }

    /// Claim the event stream of a session.
    ///
    /// The stream is single-consumer: the first subscriber takes the
    /// receiver and later calls return `None`. Subscribers must keep
    /// consuming; a stalled subscriber eventually stalls the child (lossless
    /// backpressure), and a dropped receiver makes the readers drain and
    /// discard the rest.
    pub fn subscribe(&self, session_id: SessionId) -> Option<mpsc::Receiver<SessionEvent>> {
        let mut sessions = self.lock_sessions();
        sessions.get_mut(&session_id).and_then(|s| s.events.take())
    }

    /// Request termination of a session with the default grace period.
    ///
    /// Idempotent: stopping an already-terminal session (or stopping twice)
    /// is a no-op, not an error.
    pub async fn stop(&self, session_id: SessionId) -> Result<()> {
        self.stop_with_grace(session_id, self.config.terminate_grace)
            .await
    }

    /// Request termination with an explicit grace period.
    pub async fn stop_with_grace(&self, session_id: SessionId, grace: Duration) -> Result<()> {
        let terminate_tx = {
            let sessions = self.lock_sessions();
            let session = sessions
                .get(&session_id)
                .ok_or(ScriptdeckError::UnknownSession(session_id))?;
            if session.record.state.is_terminal() {
                debug!(session_id, "stop on terminal session; nothing to do");
                return Ok(());
            }
            session.terminate_tx.clone()
        };

        // If the monitor finished between the check and this send, the
        // request lands in a closed or never-read channel; either way the
        // stop degrades to the documented no-op.
        let _ = terminate_tx.send(TerminateRequest { grace }).await;
        Ok(())
    }

    /// Latest session for a script, if any. Never suspends.
    pub fn status(&self, script_id: &str) -> Option<RunSession> {
        let sessions = self.lock_sessions();
        sessions
            .values()
            .filter(|s| s.record.script_id == script_id)
            .max_by_key(|s| s.record.session_id)
            .map(|s| s.record.clone())
    }

    /// Snapshot of one session by id.
    pub fn session(&self, session_id: SessionId) -> Option<RunSession> {
        let sessions = self.lock_sessions();
        sessions.get(&session_id).map(|s| s.record.clone())
    }

    /// Snapshot of all registered sessions, ordered by session id.
    pub fn sessions(&self) -> Vec<RunSession> {
        let sessions = self.lock_sessions();
        let mut all: Vec<_> = sessions.values().map(|s| s.record.clone()).collect();
        all.sort_by_key(|s| s.session_id);
        all
    }

    /// Suspend until the session reaches a terminal state; returns its exit
    /// code. Unblocked early by `stop` (the terminal state is then `Killed`).
    pub async fn wait(&self, session_id: SessionId) -> Result<Option<i32>> {
        let mut state_rx = {
            let sessions = self.lock_sessions();
            sessions
                .get(&session_id)
                .ok_or(ScriptdeckError::UnknownSession(session_id))?
                .state_rx
                .clone()
        };

        // The watch retains its last value even after the monitor is gone,
        // so a session that is already terminal resolves immediately.
        let _ = state_rx.wait_for(|s| s.is_terminal()).await;

        let sessions = self.lock_sessions();
        Ok(sessions
            .get(&session_id)
            .and_then(|s| s.record.exit_code))
    }

    /// Drop terminal sessions from the active set; returns how many were
    /// removed.
    pub fn clear_finished(&self) -> usize {
        let mut sessions = self.lock_sessions();
        let before = sessions.len();
        sessions.retain(|_, s| !s.record.state.is_terminal());
        before - sessions.len()
    }

    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<SessionId, ActiveSession>> {
        // A poisoned map only means another task panicked mid-update; the
        // map itself is still usable.
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// How a monitored session ended.
enum SessionEnd {
    Exited { exit_code: Option<i32> },
    Killed,
}

/// Per-session monitor task.
///
/// Owns the `Child` for the whole session: waits for natural exit or a
/// terminate request, joins the stream readers so every buffered line is
/// delivered, then records the terminal state and publishes `Closed` plus
/// exactly one terminal event.
#[allow(clippy::too_many_arguments)]
async fn monitor_session(
    session_id: SessionId,
    script_id: ScriptId,
    mut child: Child,
    pid: Option<u32>,
    readers: (JoinHandle<Option<String>>, JoinHandle<Option<String>>),
    mut terminate_rx: mpsc::Receiver<TerminateRequest>,
    events_tx: mpsc::Sender<SessionEvent>,
    state_tx: watch::Sender<SessionState>,
    sessions: Arc<Mutex<HashMap<SessionId, ActiveSession>>>,
) {
    set_state(&sessions, &state_tx, session_id, SessionState::Running);

    let mut wait_error: Option<String> = None;

    let end = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => {
                info!(
                    session_id,
                    script = %script_id,
                    exit_code = ?status.code(),
                    success = status.success(),
                    "script process exited"
                );
                SessionEnd::Exited { exit_code: status.code() }
            }
            Err(err) => {
                warn!(session_id, error = %err, "waiting for script process failed");
                wait_error = Some(format!("wait failed: {err}"));
                SessionEnd::Exited { exit_code: None }
            }
        },
        Some(request) = terminate_rx.recv() => {
            info!(
                session_id,
                script = %script_id,
                grace_ms = request.grace.as_millis() as u64,
                "termination requested"
            );
            set_state(&sessions, &state_tx, session_id, SessionState::Exiting);

            match supervisor::terminate_with_grace(&mut child, pid, request.grace).await {
                Ok(_code) => SessionEnd::Killed,
                Err(err) => {
                    warn!(session_id, error = %err, "terminating script process failed");
                    wait_error = Some(format!("terminate failed: {err}"));
                    SessionEnd::Killed
                }
            }
        }
    };

    // The pipes are closed now, so both readers run dry on their own; join
    // them before the closed marker so no Log event can trail it.
    let (stdout_res, stderr_res) = tokio::join!(readers.0, readers.1);
    let mut stream_errors: Vec<String> = Vec::new();
    for res in [stdout_res, stderr_res] {
        match res {
            Ok(Some(message)) => stream_errors.push(message),
            Ok(None) => {}
            Err(err) => stream_errors.push(format!("stream reader panicked: {err}")),
        }
    }

    let _ = events_tx.send(SessionEvent::Closed { session_id }).await;

    let error = match (wait_error, stream_errors.is_empty()) {
        (Some(w), true) => Some(w),
        (Some(w), false) => Some(format!("{w}; {}", stream_errors.join("; "))),
        (None, false) => Some(stream_errors.join("; ")),
        (None, true) => None,
    };

    let (final_state, exit_code) = match end {
        SessionEnd::Exited { exit_code } => (SessionState::Exited, exit_code),
        SessionEnd::Killed => (SessionState::Killed, None),
    };

    {
        let mut sessions = sessions.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(session) = sessions.get_mut(&session_id) {
            session.record.state = final_state;
            session.record.exit_code = exit_code;
            session.record.ended_at = Some(Utc::now());
            session.record.error = error.clone();
        }
    }
    let _ = state_tx.send(final_state);

    let terminal = match final_state {
        SessionState::Killed => SessionEvent::Killed { session_id },
        _ => SessionEvent::Exited {
            session_id,
            exit_code,
            error,
        },
    };
    let _ = events_tx.send(terminal).await;

    debug!(session_id, state = ?final_state, "session monitor finished");
}

fn set_state(
    sessions: &Arc<Mutex<HashMap<SessionId, ActiveSession>>>,
    state_tx: &watch::Sender<SessionState>,
    session_id: SessionId,
    state: SessionState,
) {
    {
        let mut sessions = sessions.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(session) = sessions.get_mut(&session_id) {
            session.record.state = state;
        }
    }
    let _ = state_tx.send(state);
}
