//! Environment-driven configuration (A1).
//!
//! [`Config::load`] reads an optional `.env` file for local development, then
//! the process environment — the process environment always wins when a key
//! is set in both — applies the documented defaults, and validates numeric
//! and boolean fields eagerly. A malformed value is a [`CoreError::Validation`]
//! at load time, never a silent fallback discovered three calls deep in the
//! scheduler.

use std::env;
use std::time::Duration;

use crate::error::{CoreError, Result};

/// Per-backend tuning the original system hardcodes per vendor (rate limits,
/// timeouts, retry policy). Overridable per backend via the same
/// environment-driven layer; the defaults below mirror the source's agent
/// table.
#[derive(Debug, Clone)]
pub struct BackendTuning {
    pub max_tokens_per_minute: u32,
    pub max_requests_per_minute: u32,
    pub max_input_tokens: u32,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl BackendTuning {
    fn gpt() -> Self {
        Self {
            max_tokens_per_minute: 60_000,
            max_requests_per_minute: 60,
            max_input_tokens: 6000,
            retry_attempts: 2,
            retry_delay: Duration::from_millis(1000),
        }
    }

    fn claude() -> Self {
        Self {
            max_tokens_per_minute: 50_000,
            max_requests_per_minute: 50,
            max_input_tokens: 8000,
            retry_attempts: 2,
            retry_delay: Duration::from_millis(1500),
        }
    }

    fn grok() -> Self {
        Self {
            max_tokens_per_minute: 20_000,
            max_requests_per_minute: 10,
            max_input_tokens: 4000,
            retry_attempts: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Centralized configuration for the reasoning core, loaded once at process
/// (or test) start.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub xai_grok_api_key: Option<String>,
    pub database_url: Option<String>,

    pub max_concurrent_tasks: usize,
    pub default_task_timeout: Duration,
    pub confidence_threshold: f64,

    pub enable_contradiction_detection: bool,
    pub enable_hallucination_detection: bool,
    pub enable_response_verification: bool,

    pub gpt: BackendTuning,
    pub claude: BackendTuning,
    pub grok: BackendTuning,
}

impl Config {
    /// Load configuration from an optional `.env` file plus the process
    /// environment. `.env` values never override a variable already set in
    /// the environment.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_env()
    }

    /// Load configuration from the process environment only (used in tests
    /// that don't want to read a `.env` file off disk).
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok(),
            xai_grok_api_key: env::var("XAI_GROK_API_KEY").ok(),
            database_url: env::var("DATABASE_URL").ok(),

            max_concurrent_tasks: parse_env("MAX_CONCURRENT_TASKS", 5)?,
            default_task_timeout: Duration::from_secs(parse_env("DEFAULT_TASK_TIMEOUT", 30)?),
            confidence_threshold: parse_env("CONFIDENCE_THRESHOLD", 0.6)?,

            enable_contradiction_detection: parse_bool_env(
                "ENABLE_CONTRADICTION_DETECTION",
                true,
            )?,
            enable_hallucination_detection: parse_bool_env(
                "ENABLE_HALLUCINATION_DETECTION",
                true,
            )?,
            enable_response_verification: parse_bool_env("ENABLE_RESPONSE_VERIFICATION", false)?,

            gpt: BackendTuning::gpt(),
            claude: BackendTuning::claude(),
            grok: BackendTuning::grok(),
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    match env::var(key) {
        Ok(raw) => raw.parse::<T>().map_err(|_| {
            CoreError::Validation(format!("{key}: could not parse '{raw}'"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_bool_env(key: &str, default: bool) -> Result<bool> {
    match env::var(key) {
        Ok(raw) => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(CoreError::Validation(format!(
                "{key}: could not parse '{raw}' as a boolean"
            ))),
        },
        Err(_) => Ok(default),
    }
}
