// src/assistant/dispatcher.rs

//! Per-query dispatch, timeout and cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::assistant::{AssistantClient, AssistantError};
use crate::registry::ScriptEntry;
use crate::types::ScriptId;

/// Identifier of one in-flight query, unique within a process lifetime.
pub type QueryId = u64;

/// Upper bound on how much script source is embedded into a prompt.
const SOURCE_EXCERPT_LIMIT: usize = 8 * 1024;

/// One accepted query.
#[derive(Debug, Clone)]
pub struct AssistantQuery {
    pub query_id: QueryId,
    pub script_id: ScriptId,
    pub question: String,
    pub submitted_at: DateTime<Utc>,
}

/// The single result a query produces.
#[derive(Debug)]
pub struct AssistantResult {
    pub query_id: QueryId,
    pub script_id: ScriptId,
    pub outcome: Result<String, AssistantError>,
}

/// Caller-side handle for one dispatched query.
///
/// Dropping the handle does NOT cancel the query; call
/// [`cancel`](Self::cancel) to abandon it before a result arrives.
/// Cancelling after the remote call returned is a no-op.
#[derive(Debug)]
pub struct QueryHandle {
    pub query_id: QueryId,
    cancel_tx: Option<oneshot::Sender<()>>,
}

impl QueryHandle {
    /// Abandon the query; no result will be delivered for it.
    pub fn cancel(mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            // A send error means the query already finished.
            let _ = tx.send(());
        }
    }
}

/// Accepts `(script, question)` pairs and runs each as an independent task.
///
/// Results arrive on the receiver returned by [`new`](Self::new), in
/// completion order, one per dispatched (and not cancelled) query. Failures
/// of any kind are folded into [`AssistantResult::outcome`]; nothing on this
/// path can affect running sessions.
pub struct QueryDispatcher {
    client: Arc<dyn AssistantClient>,
    timeout: Duration,
    results_tx: mpsc::Sender<AssistantResult>,
    next_query_id: AtomicU64,
}

impl QueryDispatcher {
    /// Create a dispatcher and the channel its results arrive on.
    pub fn new(
        client: Arc<dyn AssistantClient>,
        timeout: Duration,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<AssistantResult>) {
        let (results_tx, results_rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                client,
                timeout,
                results_tx,
                next_query_id: AtomicU64::new(0),
            },
            results_rx,
        )
    }

    /// Dispatch one query about a catalogued script.
    ///
    /// Returns immediately; the query runs in its own task and reports via
    /// the results channel.
    pub fn dispatch(&self, script: &ScriptEntry, question: &str) -> QueryHandle {
        let query_id = self.next_query_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

        let query = AssistantQuery {
            query_id,
            script_id: script.id.clone(),
            question: question.to_string(),
            submitted_at: Utc::now(),
        };
        info!(query_id, script = %query.script_id, "assistant query dispatched");

        let client = Arc::clone(&self.client);
        let results_tx = self.results_tx.clone();
        let query_timeout = self.timeout;
        let script = script.clone();

        tokio::spawn(async move {
            run_query(client, query, script, query_timeout, cancel_rx, results_tx).await;
        });

        QueryHandle {
            query_id,
            cancel_tx: Some(cancel_tx),
        }
    }
}

async fn run_query(
    client: Arc<dyn AssistantClient>,
    query: AssistantQuery,
    script: ScriptEntry,
    query_timeout: Duration,
    mut cancel_rx: oneshot::Receiver<()>,
    results_tx: mpsc::Sender<AssistantResult>,
) {
    let prompt = build_prompt(&script, &query.question).await;

    let work = async {
        match timeout(query_timeout, client.complete(prompt)).await {
            Ok(outcome) => outcome,
            Err(_elapsed) => Err(AssistantError::Timeout),
        }
    };

    tokio::select! {
        outcome = work => {
            match &outcome {
                Ok(answer) => {
                    debug!(query_id = query.query_id, answer_len = answer.len(), "assistant answered");
                }
                Err(err) => {
                    warn!(query_id = query.query_id, error = %err, "assistant query failed");
                }
            }
            let _ = results_tx
                .send(AssistantResult {
                    query_id: query.query_id,
                    script_id: query.script_id,
                    outcome,
                })
                .await;
        }
        _ = &mut cancel_rx => {
            debug!(query_id = query.query_id, "assistant query cancelled");
            // No result for a cancelled query.
        }
    }
}

/// Compose the prompt from the script's identity, a bounded source excerpt
/// and the question.
///
/// An unreadable script is not an error at this level; the prompt simply
/// says so and the assistant answers from the metadata alone.
async fn build_prompt(script: &ScriptEntry, question: &str) -> String {
    let source = match tokio::fs::read_to_string(&script.path).await {
        Ok(mut text) => {
            if text.len() > SOURCE_EXCERPT_LIMIT {
                let mut cut = SOURCE_EXCERPT_LIMIT;
                while !text.is_char_boundary(cut) {
                    cut -= 1;
                }
                text.truncate(cut);
                text.push_str("\n… (truncated)");
            }
            text
        }
        Err(err) => format!("(source unavailable: {err})"),
    };

    format!(
        "You are helping with the script \"{name}\" located at {path}.\n\
         \n\
         Script source:\n\
         ```\n\
         {source}\n\
         ```\n\
         \n\
         Question: {question}\n",
        name = script.display_name,
        path = script.path.display(),
    )
}
