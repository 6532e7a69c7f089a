// src/exec/supervisor.rs

//! Process spawning and termination.
//!
//! Spawning validates what can be validated up front (interpreter exists,
//! working directory is a directory) so obvious misconfiguration surfaces as
//! a typed [`SpawnError`] before any OS process is created; everything else
//! is left to the OS and mapped into [`SpawnError::Os`].
//!
//! Termination is two-phase: a polite stop signal first (SIGTERM on Unix),
//! then a forced kill once the grace period elapses. Callers request it by
//! sending a [`TerminateRequest`] to the session's monitor task, which keeps
//! the `Child` exclusively owned in one place and makes repeated terminate
//! calls naturally idempotent.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::exec::RunConfig;

/// Why a launch was refused.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("interpreter not found: {0}")]
    InterpreterNotFound(String),

    #[error("working directory is not a directory: {0}")]
    BadWorkingDirectory(String),

    #[error("failed to spawn `{command}`: {source}")]
    Os {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// A freshly spawned child with its stream endpoints split out.
#[derive(Debug)]
pub struct SpawnedProcess {
    pub pid: Option<u32>,
    pub child: Child,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// Request to stop a running session.
///
/// `grace` is how long to wait between the polite stop signal and the forced
/// kill.
#[derive(Debug, Clone, Copy)]
pub struct TerminateRequest {
    pub grace: Duration,
}

/// Spawn the configured interpreter + script with piped streams.
///
/// Fails with a typed [`SpawnError`] when the interpreter path does not
/// exist, the working directory is invalid, or the OS refuses to create the
/// process. No session state exists yet at this point; the caller registers
/// the session only on success.
pub fn spawn(config: &RunConfig) -> Result<SpawnedProcess, SpawnError> {
    // Only paths with a directory component can be checked up front; bare
    // names like `python3` go through PATH lookup inside spawn.
    if has_directory_component(&config.interpreter_path)
        && !config.interpreter_path.is_file()
    {
        return Err(SpawnError::InterpreterNotFound(
            config.interpreter_path.display().to_string(),
        ));
    }

    if !config.working_directory.is_dir() {
        return Err(SpawnError::BadWorkingDirectory(
            config.working_directory.display().to_string(),
        ));
    }

    let mut cmd = config.build_command();
    let mut child = cmd.spawn().map_err(|source| SpawnError::Os {
        command: config.command_line(),
        source,
    })?;

    // Both pipes were requested in build_command, so take() cannot miss.
    let stdout = child.stdout.take().ok_or_else(|| SpawnError::Os {
        command: config.command_line(),
        source: std::io::Error::other("child stdout pipe missing"),
    })?;
    let stderr = child.stderr.take().ok_or_else(|| SpawnError::Os {
        command: config.command_line(),
        source: std::io::Error::other("child stderr pipe missing"),
    })?;

    let pid = child.id();
    info!(pid, command = %config.command_line(), "spawned script process");

    Ok(SpawnedProcess {
        pid,
        child,
        stdout,
        stderr,
    })
}

/// Stop a running child: polite signal, then forced kill after `grace`.
///
/// Signals go to the child's process group (the launch puts every script
/// into its own group), so children the script spawned die with it and
/// release the output pipes. Returns the exit code if the child reported one
/// (signal deaths on Unix report `None`). Safe to call on a child that exits
/// concurrently; a signal to an already-gone process is simply ignored.
pub async fn terminate_with_grace(
    child: &mut Child,
    pid: Option<u32>,
    grace: Duration,
) -> std::io::Result<Option<i32>> {
    send_graceful_stop(child, pid);

    match timeout(grace, child.wait()).await {
        Ok(status) => {
            let status = status?;
            debug!(pid, code = ?status.code(), "child exited within grace period");
            Ok(status.code())
        }
        Err(_elapsed) => {
            warn!(pid, grace_ms = grace.as_millis() as u64, "grace period elapsed; killing child");
            force_kill(child, pid).await?;
            let status = child.wait().await?;
            Ok(status.code())
        }
    }
}

#[cfg(unix)]
fn send_graceful_stop(_child: &mut Child, pid: Option<u32>) {
    match pid {
        Some(pid) => {
            debug!(pid, "sending SIGTERM to process group");
            // Negative pid addresses the whole group; pgid == pid because the
            // launch used process_group(0).
            unsafe {
                libc::kill(-(pid as libc::pid_t), libc::SIGTERM);
            }
        }
        None => {
            // Already reaped; nothing to signal.
            debug!("no pid for graceful stop; child already gone");
        }
    }
}

#[cfg(not(unix))]
fn send_graceful_stop(child: &mut Child, pid: Option<u32>) {
    // No portable polite signal; fall through to the forced kill path
    // immediately by starting the kill now.
    debug!(pid, "no graceful stop on this platform; killing directly");
    let _ = child.start_kill();
}

#[cfg(unix)]
async fn force_kill(child: &mut Child, pid: Option<u32>) -> std::io::Result<()> {
    if let Some(pid) = pid {
        unsafe {
            libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
        }
    }
    // Also kill the direct child through the handle in case the group signal
    // had nothing to hit.
    match child.kill().await {
        Ok(()) => Ok(()),
        // Already dead from the group signal.
        Err(err) if err.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
        Err(err) => Err(err),
    }
}

#[cfg(not(unix))]
async fn force_kill(child: &mut Child, _pid: Option<u32>) -> std::io::Result<()> {
    child.kill().await
}

fn has_directory_component(path: &Path) -> bool {
    path.parent()
        .map(|p| !p.as_os_str().is_empty())
        .unwrap_or(false)
}
