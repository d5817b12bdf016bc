//! The run-scoped data model shared by the scheduler, scorer, and
//! contradiction engine (§3).
//!
//! Every type here lives only for the duration of one [`crate::orchestrator::Orchestrator::reason`]
//! call — nothing here is persisted across runs (§3 "Lifecycle").

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Ordinal scheduling priority. `Critical > High > Medium > Low`; the
/// derived `Ord` impl orders variants in declaration order, which is why
/// `Critical` is declared first (§3 "Priority").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

/// The logical backend a task is routed to. A closed enum rather than a
/// free-form string — unknown agent names become a startup-validation
/// error instead of a silent no-op (§9 "Dynamic function lookup").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendId {
    Gpt,
    Claude,
    Grok,
}

impl BackendId {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::Gpt => "gpt",
            BackendId::Claude => "claude",
            BackendId::Grok => "grok",
        }
    }
}

impl std::fmt::Display for BackendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work scheduled against a backend; a node in the task DAG
/// (§3 "Task").
#[derive(Debug, Clone)]
pub struct Task {
    pub name: String,
    pub backend: BackendId,
    pub prompt: String,
    pub priority: Priority,
    pub weight: f64,
    pub timeout: Duration,
    pub task_type: String,
    pub dependencies: Vec<String>,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub created_at: Instant,
}

impl Task {
    /// Construct a task with the documented scheduler defaults
    /// (`max_retries = 2`, `retry_delay = 1s`) — callers override via the
    /// builder methods below when the canonical task plan needs something
    /// else (§4.6).
    pub fn new(
        name: impl Into<String>,
        backend: BackendId,
        prompt: impl Into<String>,
        priority: Priority,
        task_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            backend,
            prompt: prompt.into(),
            priority,
            weight: 0.5,
            timeout: Duration::from_secs(30),
            task_type: task_type.into(),
            dependencies: Vec::new(),
            max_retries: 2,
            retry_delay: Duration::from_millis(500),
            created_at: Instant::now(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Replace occurrences of the literal pattern `{depName}` in the prompt
    /// with the trimmed output of each completed dependency. Unknown
    /// placeholders — names with no matching entry in `results` — are left
    /// verbatim (§3 "Placeholder substitution", tested by S8/property 8).
    pub fn render_prompt(&self, results: &HashMap<String, TaskResult>) -> String {
        let mut rendered = self.prompt.clone();
        for dep in &self.dependencies {
            if let Some(result) = results.get(dep) {
                let placeholder = format!("{{{dep}}}");
                rendered = rendered.replace(&placeholder, result.output.trim());
            }
        }
        rendered
    }
}

/// The terminal record of one task's execution, produced exactly once per
/// task (§3 "TaskResult").
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub name: String,
    pub output: String,
    pub success: bool,
    pub execution_time: Duration,
    pub retry_count: u32,
    pub error_message: Option<String>,
}

impl TaskResult {
    pub fn success(name: impl Into<String>, output: impl Into<String>, execution_time: Duration, retry_count: u32) -> Self {
        Self {
            name: name.into(),
            output: output.into(),
            success: true,
            execution_time,
            retry_count,
            error_message: None,
        }
    }

    pub fn failure(
        name: impl Into<String>,
        execution_time: Duration,
        retry_count: u32,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            output: String::new(),
            success: false,
            execution_time,
            retry_count,
            error_message: Some(error_message.into()),
        }
    }
}

/// A content-quality flag attached to a response (§4.4 "Content flags").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentFlag {
    ExcessiveRepetition,
    PlaceholderContent,
    TooShort,
    TooLong,
}

impl ContentFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentFlag::ExcessiveRepetition => "excessive_repetition",
            ContentFlag::PlaceholderContent => "placeholder_content",
            ContentFlag::TooShort => "too_short",
            ContentFlag::TooLong => "too_long",
        }
    }
}

/// The three deterministic accuracy sub-scores (§4.4 "Accuracy indicators").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AccuracyIndicators {
    pub internal_consistency: f64,
    pub citation_quality: f64,
    pub specificity: f64,
}

/// The full per-response quality assessment produced by the scorer (§4.4,
/// §3 "QualityMetrics").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub confidence: f64,
    pub coherence: f64,
    pub completeness: f64,
    pub readability: f64,
    pub word_count: usize,
    pub content_flags: HashSet<ContentFlag>,
    pub accuracy_indicators: AccuracyIndicators,
}

/// The kind of disagreement found between two outputs (§3 "ContradictionReport").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContradictionKind {
    Factual,
    Logical,
    Recommendation,
    Heuristic,
}

/// How serious a single contradiction, or the run as a whole, is judged
/// to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    /// The weight used in detection-confidence aggregation (§4.5).
    pub fn weight(&self) -> f64 {
        match self {
            Severity::None => 0.0,
            Severity::Low => 0.8,
            Severity::Medium => 1.0,
            Severity::High => 1.2,
        }
    }
}

/// One detected disagreement between two backends' outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contradiction {
    pub a: String,
    pub b: String,
    pub kind: ContradictionKind,
    pub severity: Severity,
    pub description: String,
    pub similarity: f64,
}

/// The full output of the contradiction engine for one run (§3, §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContradictionReport {
    pub contradictions: Vec<Contradiction>,
    pub overall_severity: Severity,
    pub resolution: String,
    pub detection_confidence: f64,
}
