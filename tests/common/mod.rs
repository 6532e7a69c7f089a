#![allow(dead_code)]

pub use scriptdeck_test_utils::{init_tracing, with_timeout};

use scriptdeck::exec::LogEvent;
use scriptdeck::manager::SessionEvent;
use tokio::sync::mpsc;

/// Consume a session's event stream to the end.
///
/// The channel closes once the monitor task has published the terminal
/// event, so this returns the complete, ordered transcript of the session.
pub async fn drain_events(mut rx: mpsc::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

/// The log events of a transcript, in delivery order.
pub fn logs(events: &[SessionEvent]) -> Vec<&LogEvent> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Log(log) => Some(log),
            _ => None,
        })
        .collect()
}

/// Texts of the log events on one stream, in delivery order.
pub fn stream_texts(
    events: &[SessionEvent],
    stream: scriptdeck::exec::StreamKind,
) -> Vec<String> {
    logs(events)
        .into_iter()
        .filter(|l| l.stream == stream)
        .map(|l| l.text.clone())
        .collect()
}
