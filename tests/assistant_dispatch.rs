// tests/assistant_dispatch.rs

mod common;
use crate::common::{drain_events, init_tracing, logs, with_timeout};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use scriptdeck::assistant::{AssistantError, QueryDispatcher};
use scriptdeck::manager::{JobManager, JobManagerConfig, SessionEvent};
use scriptdeck::registry::ScriptEntry;
use scriptdeck_test_utils::builders::{write_script, RunConfigBuilder};
use scriptdeck_test_utils::fake_assistant::FakeAssistantClient;
use tempfile::TempDir;
use tokio::time::timeout;

fn entry(path: impl Into<PathBuf>) -> ScriptEntry {
    ScriptEntry {
        id: "demo".to_string(),
        display_name: "Demo script".to_string(),
        path: path.into(),
        description: None,
        tags: vec![],
    }
}

#[tokio::test]
async fn answer_is_delivered_with_matching_query_id() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "demo.sh", "echo demo\n");

    let client = FakeAssistantClient::replying("use --verbose");
    let prompts = client.prompts_handle();
    let (dispatcher, mut results) =
        QueryDispatcher::new(Arc::new(client), Duration::from_secs(5), 8);

    let handle = dispatcher.dispatch(&entry(&script), "how do I debug this?");
    let result = with_timeout(async { results.recv().await })
        .await
        .expect("one result per query");

    assert_eq!(result.query_id, handle.query_id);
    assert_eq!(result.script_id, "demo");
    assert_eq!(result.outcome.unwrap(), "use --verbose");

    // The prompt carries the script identity, its source and the question.
    let seen = prompts.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].contains("Demo script"));
    assert!(seen[0].contains("echo demo"));
    assert!(seen[0].contains("how do I debug this?"));
}

#[tokio::test]
async fn timeout_produces_a_failure_and_leaves_running_sessions_alone() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let script = write_script(
        dir.path(),
        "steady.sh",
        "i=1\n\
         while [ $i -le 6 ]; do\n\
         \techo \"tick $i\"\n\
         \tsleep 0.1\n\
         \ti=$((i + 1))\n\
         done\n",
    );

    let manager = JobManager::new(JobManagerConfig::default());
    let session_id = manager
        .start("steady", RunConfigBuilder::shell(&script).build())
        .unwrap();
    let rx = manager.subscribe(session_id).unwrap();

    let (dispatcher, mut results) = QueryDispatcher::new(
        Arc::new(FakeAssistantClient::hanging()),
        Duration::from_millis(100),
        8,
    );
    dispatcher.dispatch(&entry(&script), "is this stuck?");

    let result = with_timeout(async { results.recv().await })
        .await
        .expect("timeout still yields exactly one result");
    assert!(matches!(result.outcome, Err(AssistantError::Timeout)));

    // The session never noticed; it keeps streaming and exits cleanly.
    let events = with_timeout(drain_events(rx)).await;
    assert_eq!(logs(&events).len(), 6);
    assert!(matches!(
        events.last(),
        Some(SessionEvent::Exited { exit_code: Some(0), .. })
    ));
}

#[tokio::test]
async fn cancel_before_completion_drops_the_result() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "demo.sh", "true\n");

    let (dispatcher, mut results) = QueryDispatcher::new(
        Arc::new(FakeAssistantClient::replying("late").with_delay(Duration::from_secs(5))),
        Duration::from_secs(30),
        8,
    );

    let handle = dispatcher.dispatch(&entry(&script), "never mind");
    handle.cancel();

    let nothing = timeout(Duration::from_millis(300), results.recv()).await;
    assert!(nothing.is_err(), "cancelled query must not deliver a result");
}

#[tokio::test]
async fn cancel_after_completion_is_a_noop() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "demo.sh", "true\n");

    let (dispatcher, mut results) = QueryDispatcher::new(
        Arc::new(FakeAssistantClient::replying("done")),
        Duration::from_secs(5),
        8,
    );

    let handle = dispatcher.dispatch(&entry(&script), "quick one");
    let result = with_timeout(async { results.recv().await }).await.unwrap();
    assert_eq!(result.outcome.unwrap(), "done");

    // The query already finished; cancelling now must not panic or hang.
    handle.cancel();
}

#[tokio::test]
async fn client_failures_are_contained_in_the_result() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "demo.sh", "true\n");

    let (dispatcher, mut results) = QueryDispatcher::new(
        Arc::new(FakeAssistantClient::failing("no choices in body")),
        Duration::from_secs(5),
        8,
    );
    dispatcher.dispatch(&entry(&script), "anything?");

    let result = with_timeout(async { results.recv().await }).await.unwrap();
    match result.outcome {
        Err(AssistantError::MalformedResponse(msg)) => {
            assert_eq!(msg, "no choices in body")
        }
        other => panic!("expected MalformedResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn multiple_queries_run_in_flight_concurrently() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "demo.sh", "true\n");

    let (dispatcher, mut results) = QueryDispatcher::new(
        Arc::new(FakeAssistantClient::replying("same answer")),
        Duration::from_secs(5),
        8,
    );

    let a = dispatcher.dispatch(&entry(&script), "first");
    let b = dispatcher.dispatch(&entry(&script), "second");
    assert_ne!(a.query_id, b.query_id);

    let first = with_timeout(async { results.recv().await }).await.unwrap();
    let second = with_timeout(async { results.recv().await }).await.unwrap();

    let mut ids = [first.query_id, second.query_id];
    ids.sort_unstable();
    assert_eq!(ids, [a.query_id.min(b.query_id), a.query_id.max(b.query_id)]);
}
