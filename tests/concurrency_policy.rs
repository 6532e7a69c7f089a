// tests/concurrency_policy.rs

mod common;
use crate::common::{drain_events, init_tracing, logs, with_timeout};

use scriptdeck::errors::ScriptdeckError;
use scriptdeck::manager::{JobManager, JobManagerConfig};
use scriptdeck::types::ConcurrentRunPolicy;
use scriptdeck_test_utils::builders::{write_script, RunConfigBuilder};
use tempfile::TempDir;

fn manager_with_policy(policy: ConcurrentRunPolicy) -> JobManager {
    JobManager::new(JobManagerConfig {
        concurrent_runs: policy,
        ..JobManagerConfig::default()
    })
}

#[tokio::test]
async fn deny_rejects_second_start_of_live_script() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "long.sh", "sleep 30\n");

    let manager = manager_with_policy(ConcurrentRunPolicy::Deny);
    let first = manager
        .start("long", RunConfigBuilder::shell(&script).build())
        .unwrap();

    let err = manager
        .start("long", RunConfigBuilder::shell(&script).build())
        .unwrap_err();
    assert!(matches!(err, ScriptdeckError::AlreadyRunning(ref id) if id == "long"));

    // Only the original session exists.
    assert_eq!(manager.sessions().len(), 1);

    // A different script is unaffected by the policy.
    let other = write_script(dir.path(), "other.sh", "true\n");
    let second = manager
        .start("other", RunConfigBuilder::shell(&other).build())
        .unwrap();
    assert_ne!(first, second);

    manager.stop(first).await.unwrap();
    with_timeout(manager.wait(first)).await.unwrap();
    with_timeout(manager.wait(second)).await.unwrap();
}

#[tokio::test]
async fn deny_allows_restart_after_terminal_state() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "quick.sh", "true\n");

    let manager = manager_with_policy(ConcurrentRunPolicy::Deny);
    let first = manager
        .start("quick", RunConfigBuilder::shell(&script).build())
        .unwrap();
    with_timeout(manager.wait(first)).await.unwrap();

    // No clear_finished needed; a terminal session does not block restarts.
    let second = manager
        .start("quick", RunConfigBuilder::shell(&script).build())
        .unwrap();
    assert_ne!(first, second);
    with_timeout(manager.wait(second)).await.unwrap();
}

#[tokio::test]
async fn allow_runs_the_same_script_concurrently_with_disjoint_sequences() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let script = write_script(
        dir.path(),
        "chatty.sh",
        "echo one\nsleep 0.2\necho two\necho three\n",
    );

    let manager = manager_with_policy(ConcurrentRunPolicy::Allow);
    let config = RunConfigBuilder::shell(&script).build();

    let first = manager.start("chatty", config.clone()).unwrap();
    let second = manager.start("chatty", config).unwrap();
    assert_ne!(first, second);

    let first_rx = manager.subscribe(first).unwrap();
    let second_rx = manager.subscribe(second).unwrap();

    let (first_events, second_events) = with_timeout(async {
        tokio::join!(drain_events(first_rx), drain_events(second_rx))
    })
    .await;

    for (session_id, events) in [(first, &first_events), (second, &second_events)] {
        let logs = logs(events);
        assert_eq!(logs.len(), 3);
        // Every session has its own sequence space starting at zero.
        let sequences: Vec<u64> = logs.iter().map(|l| l.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
        assert!(logs.iter().all(|l| l.session_id == session_id));
    }
}
