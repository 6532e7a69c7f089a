// src/exec/stream.rs

//! Output stream multiplexing.
//!
//! Each standard stream of a child process is drained by its own Tokio task;
//! draining them sequentially on one task risks deadlock when the child
//! fills one pipe while waiting for the other to be read. The readers share
//! an atomic counter that assigns per-session sequence numbers across both
//! streams, so a consumer can merge them back into arrival order.
//!
//! Lines are decoded incrementally and lossily (invalid UTF-8 becomes
//! replacement characters, matching how a terminal would cope); a trailing
//! partial line at stream end is flushed as a final event rather than
//! discarded.
//!
//! Delivery is lossless: events go into the session's bounded channel with a
//! blocking `send`, so a slow subscriber stalls the reader (and eventually
//! the child) instead of losing lines. If the subscriber goes away entirely,
//! the readers keep draining the pipes and discard the rest so the child can
//! still exit.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::manager::SessionEvent;
use crate::types::SessionId;

/// Which standard stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}

/// One decoded, newline-delimited unit of output from a process stream.
///
/// `sequence` is monotonically increasing per session across both streams
/// merged; no two events of the same session share a value. Never mutated
/// after creation.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub session_id: SessionId,
    pub stream: StreamKind,
    pub text: String,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
}

/// Incremental, lossy line decoder.
///
/// Feed raw chunks with [`push`](Self::push); complete lines come back with
/// the trailing `\n` (and `\r` for CRLF input) stripped. Call
/// [`finish`](Self::finish) at end of stream to flush a trailing partial
/// line.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return all lines completed by it, in order.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop(); // the newline itself
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Flush the trailing partial line, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let mut line = std::mem::take(&mut self.buf);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

/// Spawn the reader task for one standard stream.
///
/// The task reads until end of stream, emitting one `SessionEvent::Log` per
/// decoded line with a sequence number drawn from `sequence`. It resolves to
/// `Some(message)` if the stream failed mid-read, `None` on a clean drain;
/// a read failure is additionally surfaced to subscribers as a synthetic log
/// line so the session transcript shows where output stopped.
pub fn spawn_stream_reader<R>(
    session_id: SessionId,
    stream: StreamKind,
    mut reader: R,
    sequence: Arc<AtomicU64>,
    events_tx: mpsc::Sender<SessionEvent>,
) -> JoinHandle<Option<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut decoder = LineDecoder::new();
        let mut chunk = [0u8; 4096];
        // Set once the subscriber is gone; we still drain the pipe.
        let mut discard = false;
        let mut read_error: Option<String> = None;

        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    for text in decoder.push(&chunk[..n]) {
                        if discard {
                            continue;
                        }
                        let event = log_event(session_id, stream, text, &sequence);
                        if events_tx.send(event).await.is_err() {
                            debug!(
                                session_id,
                                %stream,
                                "subscriber gone; draining remaining output"
                            );
                            discard = true;
                        }
                    }
                }
                Err(err) => {
                    let message = format!("{stream} read error: {err}");
                    warn!(session_id, %stream, error = %err, "stream read failed");
                    if !discard {
                        let event =
                            log_event(session_id, stream, message.clone(), &sequence);
                        let _ = events_tx.send(event).await;
                    }
                    read_error = Some(message);
                    break;
                }
            }
        }

        if let Some(text) = decoder.finish() {
            if !discard {
                let event = log_event(session_id, stream, text, &sequence);
                let _ = events_tx.send(event).await;
            }
        }

        debug!(session_id, %stream, "stream reader finished");
        read_error
    })
}

fn log_event(
    session_id: SessionId,
    stream: StreamKind,
    text: String,
    sequence: &AtomicU64,
) -> SessionEvent {
    SessionEvent::Log(LogEvent {
        session_id,
        stream,
        text,
        sequence: sequence.fetch_add(1, Ordering::SeqCst),
        timestamp: Utc::now(),
    })
}
