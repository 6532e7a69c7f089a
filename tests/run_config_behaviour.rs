// tests/run_config_behaviour.rs

//! Behavioural checks of the spawn contract: argv order, environment
//! merging, working directory and the unbuffered-output plumbing, observed
//! through real child processes.

mod common;
use crate::common::{drain_events, init_tracing, stream_texts, with_timeout};

use scriptdeck::exec::StreamKind;
use scriptdeck::manager::{JobManager, JobManagerConfig};
use scriptdeck_test_utils::builders::{write_script, RunConfigBuilder};
use tempfile::TempDir;

fn manager() -> JobManager {
    JobManager::new(JobManagerConfig::default())
}

async fn stdout_of(config: scriptdeck::exec::RunConfig) -> Vec<String> {
    let manager = manager();
    let session_id = manager.start("probe", config).unwrap();
    let rx = manager.subscribe(session_id).unwrap();
    let events = with_timeout(drain_events(rx)).await;
    stream_texts(&events, StreamKind::Stdout)
}

#[tokio::test]
async fn arguments_follow_the_script_path_in_order() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "args.sh", "echo \"$1:$2\"\n");

    let lines = stdout_of(
        RunConfigBuilder::shell(&script)
            .arg("first")
            .arg("second")
            .build(),
    )
    .await;
    assert_eq!(lines, vec!["first:second".to_string()]);
}

#[tokio::test]
async fn environment_overrides_win_over_inherited_values() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "env.sh", "echo \"$SCRIPTDECK_PROBE\"\n");

    // SAFETY: test-local variable name; nothing else reads it concurrently.
    unsafe { std::env::set_var("SCRIPTDECK_PROBE", "inherited") };

    let inherited = stdout_of(RunConfigBuilder::shell(&script).build()).await;
    assert_eq!(inherited, vec!["inherited".to_string()]);

    let overridden = stdout_of(
        RunConfigBuilder::shell(&script)
            .env("SCRIPTDECK_PROBE", "override")
            .build(),
    )
    .await;
    assert_eq!(overridden, vec!["override".to_string()]);
}

#[tokio::test]
async fn working_directory_is_applied() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let workdir = dir.path().join("inner");
    std::fs::create_dir(&workdir).unwrap();
    let script = write_script(dir.path(), "pwd.sh", "pwd\n");

    let lines = stdout_of(
        RunConfigBuilder::shell(&script)
            .working_dir(&workdir)
            .build(),
    )
    .await;

    assert_eq!(lines.len(), 1);
    assert_eq!(
        std::fs::canonicalize(&lines[0]).unwrap(),
        std::fs::canonicalize(&workdir).unwrap()
    );
}

#[tokio::test]
async fn unbuffered_flag_reaches_the_child_environment() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let script = write_script(
        dir.path(),
        "unbuf.sh",
        "echo \"PYTHONUNBUFFERED=${PYTHONUNBUFFERED:-unset}\"\n",
    );

    let on = stdout_of(RunConfigBuilder::shell(&script).unbuffered(true).build()).await;
    assert_eq!(on, vec!["PYTHONUNBUFFERED=1".to_string()]);
}

#[test]
fn command_line_shows_the_full_launch() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("job.py");
    let config = RunConfigBuilder::shell(&script)
        .interpreter("/usr/bin/python3")
        .arg("--fast")
        .working_dir("/tmp")
        .build();

    let line = config.command_line();
    assert!(line.starts_with("/usr/bin/python3 "));
    assert!(line.contains("job.py"));
    assert!(line.contains("--fast"));
    assert!(line.ends_with("(cwd=/tmp)"));
}
