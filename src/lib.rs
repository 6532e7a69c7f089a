// src/lib.rs

pub mod assistant;
pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod manager;
pub mod registry;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::assistant::{AssistantResult, HttpAssistantClient, QueryDispatcher};
use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::exec::StreamKind;
use crate::manager::{JobManager, JobManagerConfig, SessionEvent};
use crate::registry::ScriptRegistry;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - catalog loading
/// - the script registry
/// - the job manager and one run session (when `--script` is given)
/// - an optional assistant query running alongside the session
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let catalog = load_and_validate(&args.catalog)?;
    let registry = ScriptRegistry::from_catalog(&catalog);

    let Some(script_id) = args.script.clone() else {
        if args.ask.is_some() {
            anyhow::bail!("--ask requires --script to select which script to ask about");
        }
        print_catalog(&registry);
        return Ok(());
    };

    let entry = registry
        .get(&script_id)
        .ok_or_else(|| anyhow::anyhow!("unknown script '{script_id}'"))?
        .clone();
    let run_config = registry.run_config(&script_id, &args.args)?;

    if args.dry_run {
        println!("{}", run_config.command_line());
        return Ok(());
    }

    // Optional assistant query, dispatched alongside the run.
    let mut results_rx: Option<mpsc::Receiver<AssistantResult>> = None;
    let mut dispatcher_keepalive = None;
    if let Some(question) = &args.ask {
        let client = HttpAssistantClient::from_config(&catalog.assistant)
            .context("assistant is not configured")?;
        let (dispatcher, rx) =
            QueryDispatcher::new(Arc::new(client), catalog.assistant.timeout(), 8);
        dispatcher.dispatch(&entry, question);
        results_rx = Some(rx);
        // The dispatcher owns the results sender; keep it alive until the
        // answer has arrived.
        dispatcher_keepalive = Some(dispatcher);
    }

    let manager = Arc::new(JobManager::new(JobManagerConfig::from_catalog(
        &catalog.config,
    )));
    let session_id = manager.start(&script_id, run_config)?;
    let mut events = manager
        .subscribe(session_id)
        .ok_or_else(|| anyhow::anyhow!("session event stream already claimed"))?;

    // Ctrl-C → graceful stop of the running session.
    {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!(session_id, "Ctrl-C received; stopping session");
            let _ = manager.stop(session_id).await;
        });
    }

    let mut exit_code: Option<i32> = None;
    let mut killed = false;
    let mut answered = results_rx.is_none();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    SessionEvent::Started { pid, command_line, .. } => {
                        info!(session_id, pid, %command_line, "session running");
                    }
                    SessionEvent::Log(log) => match log.stream {
                        StreamKind::Stdout => println!("{}", log.text),
                        StreamKind::Stderr => eprintln!("{}", log.text),
                    },
                    SessionEvent::Closed { .. } => {}
                    SessionEvent::Exited { exit_code: code, error, .. } => {
                        registry.record_run(&script_id, Utc::now());
                        if let Some(error) = error {
                            warn!(session_id, %error, "session ended with stream errors");
                        }
                        exit_code = code;
                        break;
                    }
                    SessionEvent::Killed { .. } => {
                        registry.record_run(&script_id, Utc::now());
                        info!(session_id, "session killed");
                        killed = true;
                        break;
                    }
                }
            }
            Some(result) = recv_result(&mut results_rx) => {
                print_assistant_result(&result);
                answered = true;
            }
        }
    }

    // The session is done; if the question is still out, wait for its
    // answer (the dispatcher's own timeout bounds this).
    if !answered {
        if let Some(rx) = results_rx.as_mut() {
            if let Some(result) = rx.recv().await {
                print_assistant_result(&result);
            }
        }
    }
    drop(dispatcher_keepalive);

    match exit_code {
        Some(code) if code != 0 && !killed => {
            anyhow::bail!("script '{script_id}' exited with code {code}")
        }
        _ => Ok(()),
    }
}

/// Receive from an optional results channel; pends forever when absent so
/// it can sit in a `select!` arm.
async fn recv_result(
    rx: &mut Option<mpsc::Receiver<AssistantResult>>,
) -> Option<AssistantResult> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn print_assistant_result(result: &AssistantResult) {
    match &result.outcome {
        Ok(answer) => {
            println!("--- assistant ({}) ---", result.script_id);
            println!("{answer}");
            println!("----------------------");
        }
        Err(err) => {
            eprintln!("assistant query failed: {err}");
        }
    }
}

/// Plain catalog listing for `--list` (and the default action).
fn print_catalog(registry: &ScriptRegistry) {
    if registry.is_empty() {
        println!("catalog is empty; add [script.<id>] sections to the catalog file");
        return;
    }

    let entries: Vec<_> = registry.entries().collect();
    println!("scripts ({}):", entries.len());
    for entry in entries {
        println!("  - {}  {}", entry.id, entry.display_name);
        println!("      path: {}", entry.path.display());
        if !entry.tags.is_empty() {
            println!("      tags: {}", entry.tags.join(", "));
        }
        if let Some(description) = &entry.description {
            println!("      description: {description}");
        }
        let stats = registry.stats(&entry.id);
        if stats.run_count > 0 {
            let last = stats
                .last_run
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string());
            println!("      runs: {} (last {last})", stats.run_count);
        }
    }
}
