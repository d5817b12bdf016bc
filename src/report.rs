//! The stable report JSON shape returned by [`crate::orchestrator::Orchestrator::reason`]
//! (§6 "Report JSON shape").

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

use crate::hallucination::HallucinationReport;
use crate::types::{ContentFlag, Contradiction, ContradictionKind, ContradictionReport, Severity};

/// One entry of `"Contradiction Report"."contradictions_found"`.
#[derive(Debug, Clone, Serialize)]
pub struct ContradictionEntry {
    pub a: String,
    pub b: String,
    pub kind: ContradictionKind,
    pub severity: Severity,
    pub description: String,
    pub similarity: f64,
}

impl From<&Contradiction> for ContradictionEntry {
    fn from(c: &Contradiction) -> Self {
        Self {
            a: c.a.clone(),
            b: c.b.clone(),
            kind: c.kind,
            severity: c.severity,
            description: c.description.clone(),
            similarity: c.similarity,
        }
    }
}

/// `"Contradiction Report"` (§6).
#[derive(Debug, Clone, Serialize)]
pub struct ContradictionSummary {
    pub contradictions_found: Vec<ContradictionEntry>,
    pub severity_level: Severity,
    pub confidence_in_detection: f64,
}

impl From<&ContradictionReport> for ContradictionSummary {
    fn from(report: &ContradictionReport) -> Self {
        Self {
            contradictions_found: report.contradictions.iter().map(ContradictionEntry::from).collect(),
            severity_level: report.overall_severity,
            confidence_in_detection: report.detection_confidence,
        }
    }
}

/// One entry of `"Quality Assessments"` (§6).
#[derive(Debug, Clone, Serialize)]
pub struct QualityAssessment {
    pub confidence_score: f64,
    pub coherence_score: f64,
    pub completeness_score: f64,
    pub content_flags: Vec<ContentFlag>,
}

/// `{adequate, notes}`, attached as `"Response Verification"` when
/// `ENABLE_RESPONSE_VERIFICATION` is on (§2b).
#[derive(Debug, Clone, Serialize)]
pub struct ResponseVerification {
    pub adequate: bool,
    pub notes: String,
}

/// `"Execution Summary"` (§6). The literal spec text names a count and a
/// list both `failed_tasks`; since a JSON object cannot carry the same key
/// twice, the list variants are named `completed_task_names`/
/// `failed_task_names` here (decision recorded in `DESIGN.md`).
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSummary {
    pub total_tasks: usize,
    pub successful_tasks: usize,
    pub failed_tasks: usize,
    pub retries_performed: u32,
    pub total_execution_time: f64,
    pub completion_rate: f64,
    pub average_execution_time: f64,
    pub completed_task_names: Vec<String>,
    pub failed_task_names: Vec<String>,
}

impl ExecutionSummary {
    pub fn from_parts(
        total_tasks: usize,
        successful_tasks: usize,
        failed_tasks: usize,
        retries_performed: u32,
        total_execution_time: Duration,
        completion_rate: f64,
        average_execution_time: Duration,
        completed_task_names: Vec<String>,
        failed_task_names: Vec<String>,
    ) -> Self {
        Self {
            total_tasks,
            successful_tasks,
            failed_tasks,
            retries_performed,
            total_execution_time: total_execution_time.as_secs_f64(),
            completion_rate,
            average_execution_time: average_execution_time.as_secs_f64(),
            completed_task_names,
            failed_task_names,
        }
    }
}

/// The full report returned to a caller of `reason()` (§6).
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    #[serde(rename = "Task Breakdown")]
    pub task_breakdown: String,
    #[serde(rename = "Initial Explanation")]
    pub initial_explanation: String,
    #[serde(rename = "Refined Explanation")]
    pub refined_explanation: String,
    #[serde(rename = "Code Example")]
    pub code_example: String,
    #[serde(rename = "Fact Check")]
    pub fact_check: String,
    #[serde(rename = "Final Response")]
    pub final_response: String,
    #[serde(rename = "Hallucination Report", skip_serializing_if = "Option::is_none")]
    pub hallucination_report: Option<HallucinationReport>,
    #[serde(rename = "Contradiction Report", skip_serializing_if = "Option::is_none")]
    pub contradiction_report: Option<ContradictionSummary>,
    #[serde(rename = "Claude Resolution")]
    pub claude_resolution: String,
    #[serde(rename = "Confidence Scores")]
    pub confidence_scores: HashMap<String, f64>,
    #[serde(rename = "Quality Assessments")]
    pub quality_assessments: HashMap<String, QualityAssessment>,
    #[serde(rename = "Execution Summary")]
    pub execution_summary: ExecutionSummary,
    #[serde(rename = "Low Confidence Tasks")]
    pub low_confidence_tasks: Vec<String>,
    #[serde(rename = "Response Verification", skip_serializing_if = "Option::is_none")]
    pub response_verification: Option<ResponseVerification>,
}
