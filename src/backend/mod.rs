//! The rate-limited backend client (C1, §4.1).
//!
//! One [`RateLimitedClient`] instance per logical backend. It sits between
//! the scheduler and the external vendor, and owns everything needed to be
//! a polite API citizen on that vendor's behalf: prompt truncation, a
//! token-bucket budget, and bounded dispatch-loop retry. Callers only ever
//! see `Invoke(prompt, max_output_tokens) -> Result<String>` — truncation,
//! back-pressure, and retry are invisible except through elapsed time
//! (§4.1, §9 "Global mutable state": the bucket is owned here, not a
//! process-wide static).

pub mod bucket;
pub mod mock;

pub use bucket::TokenBucket;
pub use mock::MockLlmBackend;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{CoreError, Result};
use crate::types::BackendId;

/// Abstraction over one external LLM vendor endpoint. Implementors perform
/// the actual wire call; [`RateLimitedClient`] wraps an implementor with
/// truncation, budget enforcement, retry, and (for vendors that need it)
/// output normalization.
///
/// Object-safe so the registry (C2) can hold `Arc<dyn LlmBackend>` per
/// configured backend (§6 "LLMBackend.Invoke(prompt, maxTokens) -> string").
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Issue one call to the vendor. Implementors should return `Err` for
    /// any failure (including vendor-signalled rate limiting) rather than
    /// returning an error description as if it were a successful body
    /// (§9 "Exceptions for control flow").
    async fn invoke(&self, prompt: &str, max_output_tokens: u32) -> Result<String>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;

    /// Whether this backend's raw output needs the HTML/navigation-noise
    /// cleaner applied before it is handed back to the caller (§4.1 "Output
    /// normalization"). Most vendors return clean text; one does not.
    fn needs_output_cleaning(&self) -> bool {
        false
    }
}

/// Pre-dispatch and budget tuning for one backend, supplied by
/// [`crate::config::BackendTuning`].
#[derive(Debug, Clone)]
pub struct ClientLimits {
    pub max_input_tokens: u32,
    pub max_tokens_per_minute: u32,
    pub max_requests_per_minute: u32,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl From<&crate::config::BackendTuning> for ClientLimits {
    fn from(tuning: &crate::config::BackendTuning) -> Self {
        Self {
            max_input_tokens: tuning.max_input_tokens,
            max_tokens_per_minute: tuning.max_tokens_per_minute,
            max_requests_per_minute: tuning.max_requests_per_minute,
            retry_attempts: tuning.retry_attempts,
            retry_delay: tuning.retry_delay,
        }
    }
}

/// Estimate a prompt's token count at four characters per token, matching
/// the source's rough approximation (§4.1).
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

const TRUNCATION_MARKER: &str = "\n\n[Content truncated due to length]\n\n";

/// Truncate `prompt` to at most `4 * max_input_tokens` characters by keeping
/// the first 70% and the last 30%, joined by the fixed marker (§4.1).
pub fn truncate_prompt(prompt: &str, max_input_tokens: u32) -> String {
    if estimate_tokens(prompt) <= max_input_tokens as usize {
        return prompt.to_string();
    }

    let char_limit = max_input_tokens as usize * 4;
    let first_len = (char_limit as f64 * 0.7) as usize;
    let last_len = char_limit.saturating_sub(first_len);

    let chars: Vec<char> = prompt.chars().collect();
    let first: String = chars.iter().take(first_len).collect();
    let skip = chars.len().saturating_sub(last_len);
    let last: String = chars.iter().skip(skip).collect();

    format!("{first}{TRUNCATION_MARKER}{last}")
}

/// Identify a transient, vendor-signalled rate-limit error by its message
/// shape — HTTP 429, or a message containing one of the documented phrases
/// (§4.1 "Dispatch loop").
pub fn is_rate_limit_signal(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("429")
        || lower.contains("rate limit")
        || lower.contains("too many requests")
        || lower.contains("tokens per min")
}

/// Navigation-noise terms dropped wholesale when cleaning HTML-polluted
/// output (§4.1 "Output normalization").
const NAV_BLOCKLIST: &[&str] = &[
    "home",
    "about",
    "contact",
    "privacy policy",
    "terms of service",
    "sign in",
    "sign up",
    "subscribe",
    "cookie policy",
    "advertisement",
];

/// Strip HTML tags, drop navigation noise and prompt echoes, then prefer
/// the most informative remaining lines (§4.1 "Output normalization").
///
/// Order of preference: lines matching both `" is "` and `"source:"`; else
/// any line containing `" is "`; else every remaining line. All preserved
/// lines are joined with `\n`.
pub fn clean_output(raw: &str, prompt: &str) -> String {
    let tag_stripped = strip_html_tags(raw);
    let prompt_trimmed = prompt.trim();

    let kept: Vec<&str> = tag_stripped
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| {
            let lower = line.to_lowercase();
            !NAV_BLOCKLIST.iter().any(|term| lower == *term || lower.contains(term))
        })
        .filter(|line| *line != prompt_trimmed && !prompt_trimmed.contains(line))
        .collect();

    let with_source: Vec<&str> = kept
        .iter()
        .copied()
        .filter(|line| line.contains(" is ") && line.to_lowercase().contains("source:"))
        .collect();
    if !with_source.is_empty() {
        return with_source.join("\n");
    }

    let with_is: Vec<&str> = kept.iter().copied().filter(|line| line.contains(" is ")).collect();
    if !with_is.is_empty() {
        return with_is.join("\n");
    }

    kept.join("\n")
}

fn strip_html_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

/// The rate-limited client for one backend (C1). Owns the token bucket and
/// the inner [`LlmBackend`] it truncates, throttles, and retries calls
/// through.
pub struct RateLimitedClient {
    id: BackendId,
    inner: Arc<dyn LlmBackend>,
    limits: ClientLimits,
    bucket: TokenBucket,
}

impl RateLimitedClient {
    pub fn new(id: BackendId, inner: Arc<dyn LlmBackend>, limits: ClientLimits) -> Self {
        let bucket = TokenBucket::new(limits.max_tokens_per_minute, limits.max_requests_per_minute);
        Self {
            id,
            inner,
            limits,
            bucket,
        }
    }

    /// `Invoke(prompt, maxOutputTokens) -> string | error` (§4.1).
    ///
    /// Pre-dispatch: estimate and truncate if needed. Budget: draw from the
    /// token bucket before every attempt, including retries, since each
    /// attempt is itself a vendor call the budget must account for.
    /// Dispatch: up to `retry_attempts + 1` tries, with rate-limit errors
    /// backing off proportionally to attempt number and other errors
    /// backing off by a flat `retry_delay`.
    pub async fn invoke(&self, prompt: &str, max_output_tokens: u32) -> Result<String> {
        let estimated = estimate_tokens(prompt);
        let dispatched_prompt = if estimated > self.limits.max_input_tokens as usize {
            warn!(
                backend = self.id.as_str(),
                estimated_tokens = estimated,
                max_input_tokens = self.limits.max_input_tokens,
                "truncating oversized prompt before dispatch"
            );
            truncate_prompt(prompt, self.limits.max_input_tokens)
        } else {
            prompt.to_string()
        };

        let requested_tokens = estimate_tokens(&dispatched_prompt) as f64 + max_output_tokens as f64;

        let mut last_message = String::new();
        for attempt in 0..=self.limits.retry_attempts {
            self.bucket.consume(requested_tokens).await;

            match self.inner.invoke(&dispatched_prompt, max_output_tokens).await {
                Ok(body) => {
                    let output = if self.inner.needs_output_cleaning() {
                        clean_output(&body, &dispatched_prompt)
                    } else {
                        body
                    };
                    return Ok(output);
                }
                Err(err) => {
                    last_message = err.reason();
                    if attempt == self.limits.retry_attempts {
                        break;
                    }
                    let rate_limited = is_rate_limit_signal(&last_message);
                    let delay = if rate_limited {
                        self.limits.retry_delay * (attempt + 1)
                    } else {
                        self.limits.retry_delay
                    };
                    debug!(
                        backend = self.id.as_str(),
                        attempt,
                        rate_limited,
                        delay_ms = delay.as_millis() as u64,
                        "retrying backend call after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(CoreError::Backend {
            backend: self.id.as_str().to_string(),
            attempts: self.limits.retry_attempts + 1,
            message: last_message,
        })
    }

    pub fn id(&self) -> BackendId {
        self.id
    }
}
