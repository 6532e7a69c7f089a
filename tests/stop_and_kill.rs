// tests/stop_and_kill.rs

mod common;
use crate::common::{drain_events, init_tracing, with_timeout};

use std::time::Duration;

use scriptdeck::manager::{JobManager, JobManagerConfig, SessionEvent, SessionState};
use scriptdeck_test_utils::builders::{write_script, RunConfigBuilder};
use tempfile::TempDir;
use tokio::time::sleep;

fn manager_with_grace(grace: Duration) -> JobManager {
    JobManager::new(JobManagerConfig {
        terminate_grace: grace,
        ..JobManagerConfig::default()
    })
}

#[tokio::test]
async fn stopping_a_long_run_yields_killed() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "long.sh", "echo started\nsleep 30\n");

    let manager = manager_with_grace(Duration::from_secs(2));
    let session_id = manager
        .start("long", RunConfigBuilder::shell(&script).build())
        .unwrap();
    let rx = manager.subscribe(session_id).unwrap();

    // Give the script a moment to produce its first line.
    sleep(Duration::from_millis(300)).await;
    manager.stop(session_id).await.unwrap_or_else(|e| panic!("stop failed: {e}"));

    let events = with_timeout(drain_events(rx)).await;
    assert!(
        matches!(events.last(), Some(SessionEvent::Killed { .. })),
        "terminal event should be Killed, transcript: {events:?}"
    );

    let record = manager.session(session_id).unwrap();
    assert_eq!(record.state, SessionState::Killed);
    assert_eq!(record.exit_code, None);
    assert!(record.ended_at.is_some());
}

#[tokio::test]
async fn stop_is_idempotent_and_delivers_one_terminal_event() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "long.sh", "sleep 30\n");

    let manager = manager_with_grace(Duration::from_secs(2));
    let session_id = manager
        .start("long", RunConfigBuilder::shell(&script).build())
        .unwrap();
    let rx = manager.subscribe(session_id).unwrap();

    sleep(Duration::from_millis(100)).await;
    manager.stop(session_id).await.unwrap();
    manager.stop(session_id).await.unwrap();

    let events = with_timeout(drain_events(rx)).await;
    let terminal_count = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::Killed { .. } | SessionEvent::Exited { .. }))
        .count();
    assert_eq!(terminal_count, 1);

    // And a stop after the terminal state is still a quiet no-op.
    manager.stop(session_id).await.unwrap();
    assert_eq!(
        manager.session(session_id).unwrap().state,
        SessionState::Killed
    );
}

#[tokio::test]
async fn stop_after_natural_exit_keeps_exited_state() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "quick.sh", "true\n");

    let manager = manager_with_grace(Duration::from_secs(2));
    let session_id = manager
        .start("quick", RunConfigBuilder::shell(&script).build())
        .unwrap();

    with_timeout(manager.wait(session_id)).await.unwrap();
    manager.stop(session_id).await.unwrap();

    let record = manager.session(session_id).unwrap();
    assert_eq!(record.state, SessionState::Exited, "stop must not relabel a finished run");
    assert_eq!(record.exit_code, Some(0));
}

#[tokio::test]
async fn grace_period_escalates_to_forced_kill() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    // Ignores the polite signal; only the forced kill can end it.
    let script = write_script(
        dir.path(),
        "stubborn.sh",
        "trap '' TERM\nwhile :; do sleep 0.2; done\n",
    );

    let manager = manager_with_grace(Duration::from_millis(300));
    let session_id = manager
        .start("stubborn", RunConfigBuilder::shell(&script).build())
        .unwrap();
    let rx = manager.subscribe(session_id).unwrap();

    sleep(Duration::from_millis(200)).await;
    manager.stop(session_id).await.unwrap();

    let events = with_timeout(drain_events(rx)).await;
    assert!(matches!(events.last(), Some(SessionEvent::Killed { .. })));
    assert_eq!(
        manager.session(session_id).unwrap().state,
        SessionState::Killed
    );
}

#[tokio::test]
async fn wait_is_unblocked_by_stop() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "long.sh", "sleep 30\n");

    let manager = std::sync::Arc::new(manager_with_grace(Duration::from_secs(2)));
    let session_id = manager
        .start("long", RunConfigBuilder::shell(&script).build())
        .unwrap();

    {
        let manager = std::sync::Arc::clone(&manager);
        tokio::spawn(async move {
            sleep(Duration::from_millis(200)).await;
            let _ = manager.stop(session_id).await;
        });
    }

    let code = with_timeout(manager.wait(session_id)).await.unwrap();
    assert_eq!(code, None);
    assert_eq!(
        manager.session(session_id).unwrap().state,
        SessionState::Killed
    );
}

#[tokio::test]
async fn stopping_an_unknown_session_is_an_error() {
    init_tracing();
    let manager = manager_with_grace(Duration::from_secs(2));
    let err = manager.stop(424242).await.unwrap_err();
    assert!(matches!(
        err,
        scriptdeck::errors::ScriptdeckError::UnknownSession(424242)
    ));
}
