// src/exec/config.rs

//! Immutable launch configuration for one script run.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

/// Everything needed to launch one script instance.
///
/// Created per launch request from script defaults plus user input, and
/// immutable once a run starts. The spawn contract:
///
/// - executable: `interpreter_path`
/// - argv: `[script_path] + arguments`
/// - working directory: `working_directory`
/// - environment: inherited environment with `environment_overrides` applied
///   (overrides win on key collision)
/// - `unbuffered` additionally sets `PYTHONUNBUFFERED=1` so the child flushes
///   writes immediately; without it, output can arrive in large delayed
///   chunks instead of near-real-time lines.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub interpreter_path: PathBuf,
    pub script_path: PathBuf,
    pub working_directory: PathBuf,
    pub arguments: Vec<String>,
    pub environment_overrides: BTreeMap<String, String>,
    pub unbuffered: bool,
}

impl RunConfig {
    /// Human-readable command line for display, mirroring what the launch
    /// will execute: `interpreter script args… (cwd=…)`.
    pub fn command_line(&self) -> String {
        let mut parts = vec![
            self.interpreter_path.display().to_string(),
            self.script_path.display().to_string(),
        ];
        parts.extend(self.arguments.iter().cloned());
        format!(
            "{} (cwd={})",
            parts.join(" "),
            self.working_directory.display()
        )
    }

    /// Translate into a ready-to-spawn `Command` with piped streams.
    pub(crate) fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.interpreter_path);
        cmd.arg(&self.script_path);
        cmd.args(&self.arguments);
        cmd.current_dir(&self.working_directory);

        for (key, value) in self.environment_overrides.iter() {
            cmd.env(key, value);
        }
        if self.unbuffered {
            cmd.env("PYTHONUNBUFFERED", "1");
        }

        // Own process group, so termination can signal the script and any
        // children it spawned; otherwise grandchildren keep the output pipes
        // open past the kill.
        #[cfg(unix)]
        cmd.process_group(0);

        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd
    }
}
