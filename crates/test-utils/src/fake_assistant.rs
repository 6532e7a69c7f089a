use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use scriptdeck::assistant::{AssistantClient, AssistantError};

/// What the fake should do with each prompt.
#[derive(Debug, Clone)]
enum Mode {
    /// Answer with this text.
    Reply(String),
    /// Fail with `MalformedResponse(msg)`.
    Fail(String),
    /// Never resolve; lets tests exercise the dispatcher timeout and
    /// cancellation paths.
    Hang,
}

/// A fake assistant that:
/// - records every prompt it was given
/// - replies, fails or hangs according to its configured mode, after an
///   optional delay.
pub struct FakeAssistantClient {
    mode: Mode,
    delay: Duration,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl FakeAssistantClient {
    pub fn replying(text: &str) -> Self {
        Self::new(Mode::Reply(text.to_string()))
    }

    pub fn failing(message: &str) -> Self {
        Self::new(Mode::Fail(message.to_string()))
    }

    pub fn hanging() -> Self {
        Self::new(Mode::Hang)
    }

    fn new(mode: Mode) -> Self {
        Self {
            mode,
            delay: Duration::ZERO,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn seen_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Shared handle to the recorded prompts, for asserting after the
    /// client has been moved into a dispatcher.
    pub fn prompts_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.prompts)
    }
}

impl AssistantClient for FakeAssistantClient {
    fn complete(
        &self,
        prompt: String,
    ) -> Pin<Box<dyn Future<Output = Result<String, AssistantError>> + Send + '_>> {
        let mode = self.mode.clone();
        let delay = self.delay;
        let prompts = Arc::clone(&self.prompts);

        Box::pin(async move {
            {
                let mut guard = prompts.lock().unwrap();
                guard.push(prompt);
            }

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match mode {
                Mode::Reply(text) => Ok(text),
                Mode::Fail(message) => Err(AssistantError::MalformedResponse(message)),
                Mode::Hang => std::future::pending().await,
            }
        })
    }
}
