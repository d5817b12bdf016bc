//! The crate-wide error taxonomy.
//!
//! Every fallible boundary in this crate returns `Result<T, CoreError>`.
//! There is no second error type and no convention of returning an error
//! description as if it were a successful value — a failed backend call is
//! always `Err(CoreError::Backend { .. })`, never an `Ok(String)` that merely
//! looks like one.

use std::time::Duration;
use thiserror::Error;

/// Errors produced by the reasoning core and its components.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A task's deadline was exceeded before its backend call returned.
    #[error("task '{task}' timed out after {elapsed:?}")]
    Timeout { task: String, elapsed: Duration },

    /// The vendor signalled throttling (HTTP 429 or a rate-limit-shaped message).
    /// Carries the wait already applied before this error was surfaced — C1
    /// retries internally, so this variant only escapes once retries are
    /// exhausted.
    #[error("backend '{backend}' rate limited: {message}")]
    RateLimited { backend: String, message: String },

    /// Any other vendor or transport failure, surfaced after `retryAttempts`
    /// tries have been exhausted.
    #[error("Error calling {backend} after {attempts} attempts: {message}")]
    Backend {
        backend: String,
        attempts: u32,
        message: String,
    },

    /// An upstream dependency failed or was unresolvable; this task was
    /// never dispatched.
    #[error("task '{task}' not executed: dependency '{dependency}' failed")]
    DependencyFailed { task: String, dependency: String },

    /// The scheduler made no progress in a round with non-terminal tasks
    /// remaining (a cycle, or a permanently missing dependency).
    #[error("scheduler made no progress with {remaining} task(s) remaining")]
    Unresolvable { remaining: usize },

    /// Malformed input at an API boundary: missing prompt, unknown task
    /// type, or an unparsable configuration value.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Low-level HTTP transport failure (connection refused, DNS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON parsing failed at the serde level.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for errors that don't fit the taxonomy above.
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        CoreError::Other(err.to_string())
    }
}

impl CoreError {
    /// Human-facing reason string, independent of the `Display` impl, used
    /// where only the cause (not the structured context) belongs in a
    /// `TaskResult.errorMessage`.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_formats_like_the_source_convention() {
        let err = CoreError::Backend {
            backend: "grok".into(),
            attempts: 3,
            message: "connection reset".into(),
        };
        assert_eq!(
            err.to_string(),
            "Error calling grok after 3 attempts: connection reset"
        );
    }

    #[test]
    fn anyhow_conversion_preserves_message() {
        let anyhow_err = anyhow::anyhow!("boom");
        let err: CoreError = anyhow_err.into();
        assert!(matches!(err, CoreError::Other(ref m) if m == "boom"));
    }

    #[test]
    fn variants_are_distinguishable_by_match_not_string() {
        let errs = vec![
            CoreError::Timeout {
                task: "t".into(),
                elapsed: Duration::from_secs(1),
            },
            CoreError::RateLimited {
                backend: "b".into(),
                message: "m".into(),
            },
            CoreError::Unresolvable { remaining: 2 },
            CoreError::Validation("bad".into()),
        ];
        let mut kinds = Vec::new();
        for e in &errs {
            kinds.push(match e {
                CoreError::Timeout { .. } => "timeout",
                CoreError::RateLimited { .. } => "rate_limited",
                CoreError::Unresolvable { .. } => "unresolvable",
                CoreError::Validation(_) => "validation",
                _ => "other",
            });
        }
        assert_eq!(kinds, vec!["timeout", "rate_limited", "unresolvable", "validation"]);
    }
}
