//! A scriptable [`LlmBackend`] for testing the scheduler, client, and
//! orchestrator without a live vendor (grounded on the teacher's
//! `MockBackend`, generalized from the old `Backend` trait to this crate's
//! `LlmBackend`).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{CoreError, Result};

use super::LlmBackend;

/// One scripted outcome for a call to [`MockLlmBackend`].
#[derive(Debug, Clone)]
enum Script {
    Ok(String),
    Err(String),
}

/// A backend that replays a fixed script of outcomes in order, holding at
/// the last entry once exhausted. Useful for exercising the dispatch loop's
/// retry-then-succeed and retry-then-fail paths deterministically.
pub struct MockLlmBackend {
    script: Vec<Script>,
    index: AtomicUsize,
    needs_cleaning: bool,
    calls: Mutex<Vec<String>>,
}

impl MockLlmBackend {
    /// Always returns the same response.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self {
            script: vec![Script::Ok(response.into())],
            index: AtomicUsize::new(0),
            needs_cleaning: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fails `failures` times with `message`, then returns `response` on
    /// every call after that.
    pub fn failing_then_succeeding(failures: usize, response: impl Into<String>) -> Self {
        let mut script: Vec<Script> = (0..failures).map(|_| Script::Err("transient failure".into())).collect();
        script.push(Script::Ok(response.into()));
        Self {
            script,
            index: AtomicUsize::new(0),
            needs_cleaning: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always fails with `message`.
    pub fn always_failing(message: impl Into<String>) -> Self {
        Self {
            script: vec![Script::Err(message.into())],
            index: AtomicUsize::new(0),
            needs_cleaning: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// An arbitrary ordered script of outcomes, held at the final entry once
    /// exhausted.
    pub fn scripted(outcomes: Vec<std::result::Result<String, String>>) -> Self {
        let script = outcomes
            .into_iter()
            .map(|o| match o {
                Ok(s) => Script::Ok(s),
                Err(e) => Script::Err(e),
            })
            .collect();
        Self {
            script,
            index: AtomicUsize::new(0),
            needs_cleaning: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_cleaning(mut self, needs_cleaning: bool) -> Self {
        self.needs_cleaning = needs_cleaning;
        self
    }

    /// The most recent prompt this mock was invoked with, if any.
    pub fn last_prompt(&self) -> Option<String> {
        self.calls.lock().unwrap().last().cloned()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The full ordered history of prompts this mock was invoked with, in
    /// dispatch order. Used by tests that need to assert *when* a task ran
    /// relative to others, not just whether it ran.
    pub fn call_history(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn next(&self) -> Script {
        let idx = self.index.fetch_add(1, Ordering::SeqCst);
        let bounded = idx.min(self.script.len() - 1);
        self.script[bounded].clone()
    }
}

#[async_trait]
impl LlmBackend for MockLlmBackend {
    async fn invoke(&self, prompt: &str, _max_output_tokens: u32) -> Result<String> {
        self.calls.lock().unwrap().push(prompt.to_string());
        match self.next() {
            Script::Ok(text) => Ok(text),
            Script::Err(message) => Err(CoreError::Other(message)),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }

    fn needs_output_cleaning(&self) -> bool {
        self.needs_cleaning
    }
}
