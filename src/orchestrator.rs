//! The Reasoning Orchestrator (C6, §4.6).
//!
//! Builds the canonical six-task plan for a prompt, drives it through the
//! scheduler (C3), scores and re-routes low-confidence results (C4), runs
//! the contradiction engine across the non-synthesis outputs (C5), and
//! assembles the stable report shape (§6) — tolerating any individual task,
//! probe, or collaborator failure along the way (§7 "C6 tolerates any
//! individual task failure").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::backend::LlmBackend;
use crate::config::Config;
use crate::contradiction::ContradictionEngine;
use crate::error::Result;
use crate::hallucination;
use crate::memory::{render_context, MemoryStore};
use crate::quality::QualityScorer;
use crate::registry::BackendRegistry;
use crate::report::{ContradictionSummary, ExecutionSummary, QualityAssessment, Report, ResponseVerification};
use crate::scheduler::Scheduler;
use crate::types::{BackendId, Priority, QualityMetrics, Task};

/// A canonical task definition before it's handed to the scheduler. Kept
/// around after scheduling so the scoring/re-route pass can recover which
/// backend and task type produced each result.
struct PlanTask {
    name: &'static str,
    backend: BackendId,
    priority: Priority,
    weight: f64,
    timeout: Duration,
    task_type: String,
    dependencies: Vec<&'static str>,
    prompt: String,
}

/// Adapts [`BackendRegistry::call_with_timeout`] to the [`LlmBackend`]
/// interface so the quality scorer, contradiction engine, and verification
/// probe can all dispatch through the same audited, rate-limited path every
/// primary task uses, rather than bypassing it for side-channel calls.
struct RegistryBackend<'a> {
    registry: &'a BackendRegistry,
    backend: BackendId,
    timeout: Duration,
    user_id: String,
    task_type: String,
}

#[async_trait]
impl<'a> LlmBackend for RegistryBackend<'a> {
    async fn invoke(&self, prompt: &str, _max_output_tokens: u32) -> Result<String> {
        self.registry
            .call_with_timeout(self.backend, prompt, self.timeout, &self.user_id, &self.task_type)
            .await
    }

    fn name(&self) -> &'static str {
        "registry-probe"
    }
}

/// Probe/side-channel calls (scoring, contradiction adjudication and
/// resolution, response verification) use a shorter fixed timeout than
/// primary tasks since they ask for a small structured answer, not a full
/// response.
const PROBE_TIMEOUT: Duration = Duration::from_secs(20);
const RESOLUTION_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct RawVerdict {
    adequate: bool,
    notes: Option<String>,
}

/// `Reason(userID, prompt, taskType)` (C6, §4.6).
pub struct Orchestrator {
    registry: Arc<BackendRegistry>,
    memory: Arc<dyn MemoryStore>,
    config: Config,
    scorer: QualityScorer,
    contradiction_engine: ContradictionEngine,
}

impl Orchestrator {
    pub fn new(registry: Arc<BackendRegistry>, config: Config) -> Self {
        Self {
            registry,
            memory: Arc::new(crate::memory::NoopMemoryStore),
            config,
            scorer: QualityScorer::new(),
            contradiction_engine: ContradictionEngine::new(),
        }
    }

    pub fn with_memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = memory;
        self
    }

    /// The canonical six-task plan (§4.6's table), with `{memory_context}`
    /// and the user prompt interpolated immediately — only the `{dep_name}`
    /// placeholders are left for the scheduler (C3) to resolve.
    fn build_plan(memory_context: &str, prompt: &str, task_type: &str) -> Vec<PlanTask> {
        vec![
            PlanTask {
                name: "task_analysis",
                backend: BackendId::Claude,
                priority: Priority::Critical,
                weight: 1.0,
                timeout: Duration::from_secs(45),
                task_type: "task_analysis".to_string(),
                dependencies: vec![],
                prompt: format!(
                    "{memory_context}\n\nAnalyze the following user request and break it into the key \
                     aspects, concepts, and sub-questions that a complete answer must address.\n\n\
                     User request: {prompt}"
                ),
            },
            PlanTask {
                name: "initial_explanation",
                backend: BackendId::Gpt,
                priority: Priority::High,
                weight: 0.9,
                timeout: Duration::from_secs(30),
                task_type: task_type.to_string(),
                dependencies: vec![],
                prompt: format!(
                    "{memory_context}\n\nProvide a clear, thorough explanation answering the following \
                     request.\n\nRequest: {prompt}"
                ),
            },
            PlanTask {
                name: "fact_check",
                backend: BackendId::Grok,
                priority: Priority::High,
                weight: 0.8,
                timeout: Duration::from_secs(30),
                task_type: "fact_check".to_string(),
                dependencies: vec!["task_analysis", "initial_explanation"],
                prompt: format!(
                    "Review the following analysis and explanation for factual accuracy. Note any \
                     errors, unverified claims, or missing caveats.\n\n\
                     Task analysis:\n{{task_analysis}}\n\nExplanation:\n{{initial_explanation}}\n\n\
                     Original request: {prompt}"
                ),
            },
            PlanTask {
                name: "refined_explanation",
                backend: BackendId::Gpt,
                priority: Priority::Medium,
                weight: 0.7,
                timeout: Duration::from_secs(30),
                task_type: task_type.to_string(),
                dependencies: vec!["initial_explanation", "fact_check"],
                prompt: format!(
                    "Revise the explanation below using the fact-check notes to correct any issues \
                     and improve clarity.\n\nOriginal explanation:\n{{initial_explanation}}\n\n\
                     Fact-check notes:\n{{fact_check}}\n\nOriginal request: {prompt}"
                ),
            },
            PlanTask {
                name: "code_example",
                backend: BackendId::Gpt,
                priority: Priority::Low,
                weight: 0.6,
                timeout: Duration::from_secs(30),
                task_type: "code_generation".to_string(),
                dependencies: vec!["task_analysis"],
                prompt: format!(
                    "Based on the following task analysis, provide a concise, runnable code example \
                     if one would help answer the request. If no code example is appropriate for this \
                     request, say so explicitly.\n\nTask analysis:\n{{task_analysis}}\n\n\
                     Original request: {prompt}"
                ),
            },
            PlanTask {
                name: "final_synthesis",
                backend: BackendId::Claude,
                priority: Priority::High,
                weight: 1.0,
                timeout: Duration::from_secs(45),
                task_type: "final_synthesis".to_string(),
                dependencies: vec!["task_analysis", "refined_explanation", "code_example", "fact_check"],
                prompt: format!(
                    "Synthesize a single, final answer to the user's request using the materials \
                     below.\n\nTask analysis:\n{{task_analysis}}\n\nRefined explanation:\n\
                     {{refined_explanation}}\n\nCode example:\n{{code_example}}\n\n\
                     Fact-check notes:\n{{fact_check}}\n\nOriginal request: {prompt}"
                ),
            },
        ]
    }

    fn probe_backend<'a>(&'a self, backend: BackendId, user_id: &str, task_type: &str) -> RegistryBackend<'a> {
        RegistryBackend {
            registry: self.registry.as_ref(),
            backend,
            timeout: PROBE_TIMEOUT,
            user_id: user_id.to_string(),
            task_type: task_type.to_string(),
        }
    }

    pub async fn reason(&self, user_id: &str, prompt: &str, task_type: &str) -> Report {
        let memory_context = render_context(&self.memory.recall(user_id, prompt, 3).await);

        let plan = Self::build_plan(&memory_context, prompt, task_type);
        let task_meta: HashMap<String, (BackendId, String)> =
            plan.iter().map(|p| (p.name.to_string(), (p.backend, p.task_type.clone()))).collect();

        let mut scheduler = Scheduler::new(self.registry.as_ref(), user_id);
        for p in &plan {
            let task = Task::new(p.name, p.backend, p.prompt.clone(), p.priority, p.task_type.clone())
                .with_weight(p.weight)
                .with_timeout(p.timeout)
                .with_dependencies(p.dependencies.iter().copied());
            scheduler.add(task);
        }

        let mut outputs = scheduler.run().await;
        let summary = scheduler.summary();
        info!(
            successful = summary.successful_tasks,
            failed = summary.failed_tasks,
            "scheduler run finished"
        );

        let (quality_assessments, low_confidence_tasks) =
            self.score_and_reroute(&task_meta, &mut outputs, prompt, user_id).await;

        let hallucination_report = self.config.enable_hallucination_detection.then(|| {
            let final_response = outputs.get("final_synthesis").cloned().unwrap_or_default();
            let sources: Vec<&str> = ["task_analysis", "refined_explanation", "code_example", "fact_check"]
                .iter()
                .filter_map(|name| outputs.get(*name).map(String::as_str))
                .collect();
            hallucination::check(&final_response, &sources)
        });

        let (contradiction_report, claude_resolution) =
            self.run_contradiction_engine(&outputs, user_id).await;

        let response_verification = if self.config.enable_response_verification {
            let final_response = outputs.get("final_synthesis").cloned().unwrap_or_default();
            Some(self.verify_response(prompt, &final_response, user_id).await)
        } else {
            None
        };

        let final_response = outputs.get("final_synthesis").cloned().unwrap_or_default();
        if !self.memory.store(user_id, prompt, &final_response).await {
            warn!(user_id, "memory store did not persist this exchange");
        }

        let confidence_scores: HashMap<String, f64> =
            quality_assessments.iter().map(|(k, v)| (k.clone(), v.confidence)).collect();
        let quality_assessments_report: HashMap<String, QualityAssessment> = quality_assessments
            .iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    QualityAssessment {
                        confidence_score: v.confidence,
                        coherence_score: v.coherence,
                        completeness_score: v.completeness,
                        content_flags: v.content_flags.iter().copied().collect(),
                    },
                )
            })
            .collect();

        let execution_summary = ExecutionSummary::from_parts(
            summary.total_tasks,
            summary.successful_tasks,
            summary.failed_tasks,
            summary.retries_performed,
            summary.total_execution_time,
            summary.completion_rate,
            summary.average_execution_time,
            summary.completed_task_names,
            summary.failed_task_names,
        );

        Report {
            task_breakdown: Self::task_output(&outputs, "task_analysis"),
            initial_explanation: Self::task_output(&outputs, "initial_explanation"),
            refined_explanation: Self::task_output(&outputs, "refined_explanation"),
            code_example: Self::task_output(&outputs, "code_example"),
            fact_check: Self::task_output(&outputs, "fact_check"),
            final_response: Self::task_output(&outputs, "final_synthesis"),
            hallucination_report,
            contradiction_report,
            claude_resolution,
            confidence_scores,
            quality_assessments: quality_assessments_report,
            execution_summary,
            low_confidence_tasks,
            response_verification,
        }
    }

    /// Score every completed task except `final_synthesis`; any task whose
    /// confidence falls under `CONFIDENCE_THRESHOLD` is re-invoked once with
    /// an alternate backend, replacing the output only if the retry scores
    /// strictly higher (§4.6).
    async fn score_and_reroute(
        &self,
        task_meta: &HashMap<String, (BackendId, String)>,
        outputs: &mut HashMap<String, String>,
        prompt: &str,
        user_id: &str,
    ) -> (HashMap<String, QualityMetrics>, Vec<String>) {
        let mut quality_assessments = HashMap::new();
        let mut low_confidence_tasks = Vec::new();

        for (name, (backend, task_type)) in task_meta {
            if name == "final_synthesis" {
                continue;
            }
            let Some(response) = outputs.get(name).cloned() else {
                continue;
            };

            let probe = self.probe_backend(*backend, user_id, "quality_probe");
            let score = self.scorer.score(&response, task_type, prompt, &probe).await;

            if score.confidence < self.config.confidence_threshold {
                low_confidence_tasks.push(name.clone());
                warn!(task = %name, confidence = score.confidence, "task scored below threshold, re-routing");

                let alternate = if score.confidence < 0.4 || name == "task_analysis" || name == "fact_check" {
                    BackendId::Claude
                } else {
                    BackendId::Gpt
                };
                let retry_prompt = format!(
                    "The following response to a {task_type} task scored {:.2} confidence and needs \
                     improvement.\n\nOriginal response:\n{response}\n\n\
                     Produce an improved response that addresses the same request more thoroughly and \
                     precisely.",
                    score.confidence
                );

                let retried = self
                    .registry
                    .call_with_timeout(alternate, &retry_prompt, RETRY_TIMEOUT, user_id, task_type)
                    .await;

                if let Ok(retry_text) = retried {
                    let retry_probe = self.probe_backend(alternate, user_id, "quality_probe");
                    let retry_score = self.scorer.score(&retry_text, task_type, prompt, &retry_probe).await;
                    if retry_score.confidence > score.confidence {
                        outputs.insert(name.clone(), retry_text);
                        quality_assessments.insert(name.clone(), retry_score);
                        continue;
                    }
                }
            }

            quality_assessments.insert(name.clone(), score);
        }

        low_confidence_tasks.sort();
        (quality_assessments, low_confidence_tasks)
    }

    /// Run C5 across every completed task output except `final_synthesis`
    /// (synthesis is the combined answer, not an independent perspective to
    /// compare against the others it was built from). The adjudication and
    /// resolution probes both route through `claude` — the report's
    /// `"Claude Resolution"` field names that choice (§2b, decision recorded
    /// in `DESIGN.md`).
    async fn run_contradiction_engine(
        &self,
        outputs: &HashMap<String, String>,
        user_id: &str,
    ) -> (Option<ContradictionSummary>, String) {
        if !self.config.enable_contradiction_detection {
            return (None, String::new());
        }

        let inputs: HashMap<String, String> =
            outputs.iter().filter(|(name, _)| name.as_str() != "final_synthesis").map(|(k, v)| (k.clone(), v.clone())).collect();

        let probe = self.probe_backend(BackendId::Claude, user_id, "contradiction_probe");
        let mut resolver = self.probe_backend(BackendId::Claude, user_id, "contradiction_resolution");
        resolver.timeout = RESOLUTION_TIMEOUT;

        let report = self.contradiction_engine.detect(&inputs, &probe, &resolver).await;
        let resolution = report.resolution.clone();
        (Some(ContradictionSummary::from(&report)), resolution)
    }

    /// `ENABLE_RESPONSE_VERIFICATION` probe (§2b): degrades to "adequate,
    /// unavailable" on any probe or parse failure, never failing the
    /// primary request.
    async fn verify_response(&self, prompt: &str, response: &str, user_id: &str) -> ResponseVerification {
        let probe_prompt = format!(
            "Does the following response fully and accurately address the original request? \
             Reply with only a JSON object of the form {{\"adequate\": true|false, \"notes\": \"...\"}}.\n\n\
             Original request: {prompt}\n\nResponse:\n{response}"
        );

        let outcome = self
            .registry
            .call_with_timeout(BackendId::Gpt, &probe_prompt, PROBE_TIMEOUT, user_id, "response_verification")
            .await;

        match outcome {
            Ok(reply) => match crate::output_parser::parse_json::<RawVerdict>(&reply) {
                Ok(v) => ResponseVerification {
                    adequate: v.adequate,
                    notes: v.notes.unwrap_or_default(),
                },
                Err(_) => ResponseVerification {
                    adequate: true,
                    notes: "verification unavailable".to_string(),
                },
            },
            Err(_) => ResponseVerification {
                adequate: true,
                notes: "verification unavailable".to_string(),
            },
        }
    }

    /// `"Failed"` for any missing output, except `code_example`, which reads
    /// `"No code example needed"` instead (§2b).
    fn task_output(outputs: &HashMap<String, String>, name: &str) -> String {
        match outputs.get(name) {
            Some(text) => text.clone(),
            None if name == "code_example" => "No code example needed".to_string(),
            None => "Failed".to_string(),
        }
    }
}
