//! The Contradiction Engine (C5, §4.5).
//!
//! [`ContradictionEngine::detect`] pairwise-compares every non-empty output
//! in a run: near-identical pairs are skipped on lexical similarity, an LLM
//! adjudication probe is asked for a verdict, and a fixed heuristic pass
//! covers probe failure. [`ContradictionEngine::resolve`] asks a backend to
//! reconcile whatever was found into one paragraph, falling back to a
//! canned string if that call fails too.

use std::collections::{BTreeMap, HashMap};

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

use crate::backend::LlmBackend;
use crate::output_parser::parse_json;
use crate::types::{Contradiction, ContradictionKind, ContradictionReport, Severity};

/// Regex pairs used by the heuristic fallback pass (§4.5, §9 "heuristic
/// contradiction pass considers a pair contradictory based on mere
/// co-occurrence... regardless of polarity", preserved literally).
fn heuristic_pairs() -> &'static Vec<(Regex, Regex)> {
    static PAIRS: OnceLock<Vec<(Regex, Regex)>> = OnceLock::new();
    PAIRS.get_or_init(|| {
        let raw: &[(&str, &str)] = &[
            (r"\b(true|correct|accurate)\b", r"\b(false|incorrect|inaccurate)\b"),
            (r"\b(increase|rise|grow|growing)\b", r"\b(decrease|fall|shrink|shrinking)\b"),
            (r"\bpositive\b", r"\bnegative\b"),
            (r"\b(recommend|should)\b", r"\b(avoid|should not|shouldn't)\b"),
            (r"\bsafe\b", r"\b(dangerous|unsafe)\b"),
        ];
        raw.iter()
            .map(|(a, b)| (Regex::new(a).unwrap(), Regex::new(b).unwrap()))
            .collect()
    })
}

/// The adjudication probe's expected JSON shape (§4.5).
#[derive(Debug, Deserialize)]
struct ProbeVerdict {
    contradiction_found: bool,
    #[serde(rename = "type")]
    kind: Option<String>,
    description: Option<String>,
    severity: Option<String>,
}

/// The three distinct outcomes of one adjudication probe call (§4.5 steps
/// 2-4). A successful verdict — whether or not it found a contradiction —
/// is a real answer; only `Unavailable` (the call failed, or its reply
/// didn't parse as the expected JSON shape) falls through to the heuristic
/// pass.
enum ProbeOutcome {
    Found(Contradiction),
    NoContradiction,
    Unavailable,
}

fn parse_kind(raw: Option<&str>) -> ContradictionKind {
    match raw.map(str::to_lowercase).as_deref() {
        Some("logical") => ContradictionKind::Logical,
        Some("recommendation") => ContradictionKind::Recommendation,
        Some("heuristic") => ContradictionKind::Heuristic,
        _ => ContradictionKind::Factual,
    }
}

fn parse_severity(raw: Option<&str>) -> Severity {
    match raw.map(str::to_lowercase).as_deref() {
        Some("low") => Severity::Low,
        Some("high") => Severity::High,
        _ => Severity::Medium,
    }
}

/// Ratio-based longest-common-subsequence similarity on lowercased strings,
/// matching `difflib`-style `2*M/T` (§4.5 step 1).
pub fn lcs_similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let total = a_chars.len() + b_chars.len();
    if total == 0 {
        return 1.0;
    }

    let matches = lcs_length(&a_chars, &b_chars);
    2.0 * matches as f64 / total as f64
}

fn lcs_length(a: &[char], b: &[char]) -> usize {
    let (n, m) = (a.len(), b.len());
    if n == 0 || m == 0 {
        return 0;
    }
    let mut prev = vec![0usize; m + 1];
    let mut curr = vec![0usize; m + 1];
    for i in 1..=n {
        for j in 1..=m {
            curr[j] = if a[i - 1] == b[j - 1] {
                prev[j - 1] + 1
            } else {
                prev[j].max(curr[j - 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[m]
}

/// Fixed adjudication prompt sent to the LLM probe for one pair (§4.5
/// step 2).
fn adjudication_prompt(name_a: &str, output_a: &str, name_b: &str, output_b: &str) -> String {
    format!(
        "Two AI agents produced the following responses to related questions. \
         Determine whether they contradict each other.\n\n\
         Response from {name_a}:\n{output_a}\n\n\
         Response from {name_b}:\n{output_b}\n\n\
         Reply with only a JSON object of the form: \
         {{\"contradiction_found\": true|false, \"type\": \"factual|logical|recommendation\", \
         \"description\": \"...\", \"severity\": \"low|medium|high\"}}"
    )
}

/// Fixed resolution prompt (§4.5 "Resolution").
fn resolution_prompt(contradictions: &[Contradiction], outputs: &BTreeMap<String, String>) -> String {
    let mut listed = String::new();
    for c in contradictions {
        listed.push_str(&format!("- {} vs {}: {}\n", c.a, c.b, c.description));
    }
    let mut sources = String::new();
    for (name, output) in outputs {
        sources.push_str(&format!("\n[{name}]\n{output}\n"));
    }
    format!(
        "The following contradictions were found across agent outputs:\n{listed}\n\
         Original outputs:{sources}\n\n\
         Write one reconciling paragraph that resolves these contradictions for the end user."
    )
}

const FALLBACK_RESOLUTION: &str =
    "Multiple agents produced differing perspectives on this topic; treat the synthesized response as the primary answer and the noted contradictions as open questions.";

pub struct ContradictionEngine;

impl Default for ContradictionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ContradictionEngine {
    pub fn new() -> Self {
        Self
    }

    /// `Detect(outputs) -> ContradictionReport` (§4.5). `probe_backend` is
    /// used for the adjudication probe on every non-skipped pair;
    /// `resolver_backend` is used for the final resolution call.
    pub async fn detect(
        &self,
        outputs: &HashMap<String, String>,
        probe_backend: &dyn LlmBackend,
        resolver_backend: &dyn LlmBackend,
    ) -> ContradictionReport {
        let mut non_empty: Vec<(&String, &String)> =
            outputs.iter().filter(|(_, v)| !v.trim().is_empty()).collect();
        non_empty.sort_by_key(|(name, _)| name.as_str());

        let mut contradictions = Vec::new();

        for i in 0..non_empty.len() {
            for j in (i + 1)..non_empty.len() {
                let (name_a, output_a) = non_empty[i];
                let (name_b, output_b) = non_empty[j];

                let similarity = lcs_similarity(output_a, output_b);
                if similarity > 0.8 {
                    continue;
                }

                match self
                    .probe_pair(name_a, output_a, name_b, output_b, similarity, probe_backend)
                    .await
                {
                    ProbeOutcome::Found(found) => contradictions.push(found),
                    // A successful probe that found no contradiction is a
                    // real verdict (§4.5 step 3) — it suppresses the
                    // heuristic fallback for this pair rather than falling
                    // through to it.
                    ProbeOutcome::NoContradiction => {}
                    ProbeOutcome::Unavailable => {
                        if let Some(found) =
                            Self::heuristic_pair(name_a, output_a, name_b, output_b, similarity)
                        {
                            contradictions.push(found);
                        }
                    }
                }
            }
        }

        let overall_severity = Self::overall_severity(contradictions.len());
        let detection_confidence = Self::detection_confidence(&contradictions);

        let outputs_sorted: BTreeMap<String, String> =
            non_empty.iter().map(|(k, v)| ((*k).clone(), (*v).clone())).collect();
        let resolution = self
            .resolve(&contradictions, &outputs_sorted, resolver_backend)
            .await;

        ContradictionReport {
            contradictions,
            overall_severity,
            resolution,
            detection_confidence,
        }
    }

    async fn probe_pair(
        &self,
        name_a: &str,
        output_a: &str,
        name_b: &str,
        output_b: &str,
        similarity: f64,
        backend: &dyn LlmBackend,
    ) -> ProbeOutcome {
        let prompt = adjudication_prompt(name_a, output_a, name_b, output_b);
        let Ok(reply) = backend.invoke(&prompt, 256).await else {
            return ProbeOutcome::Unavailable;
        };
        let Ok(verdict) = parse_json::<ProbeVerdict>(&reply) else {
            return ProbeOutcome::Unavailable;
        };
        if !verdict.contradiction_found {
            return ProbeOutcome::NoContradiction;
        }
        ProbeOutcome::Found(Contradiction {
            a: name_a.to_string(),
            b: name_b.to_string(),
            kind: parse_kind(verdict.kind.as_deref()),
            severity: parse_severity(verdict.severity.as_deref()),
            description: verdict
                .description
                .unwrap_or_else(|| "the probe reported a contradiction without detail".to_string()),
            similarity,
        })
    }

    fn heuristic_pair(
        name_a: &str,
        output_a: &str,
        name_b: &str,
        output_b: &str,
        similarity: f64,
    ) -> Option<Contradiction> {
        let lower_a = output_a.to_lowercase();
        let lower_b = output_b.to_lowercase();
        for (left, right) in heuristic_pairs() {
            let crosses = (left.is_match(&lower_a) && right.is_match(&lower_b))
                || (right.is_match(&lower_a) && left.is_match(&lower_b));
            if crosses {
                return Some(Contradiction {
                    a: name_a.to_string(),
                    b: name_b.to_string(),
                    kind: ContradictionKind::Heuristic,
                    severity: Severity::Medium,
                    description: format!(
                        "heuristic pattern match found opposing terms between {name_a} and {name_b}"
                    ),
                    similarity,
                });
            }
        }
        None
    }

    fn overall_severity(count: usize) -> Severity {
        match count {
            0 => Severity::None,
            1 => Severity::Low,
            2 | 3 => Severity::Medium,
            _ => Severity::High,
        }
    }

    fn detection_confidence(contradictions: &[Contradiction]) -> f64 {
        let n = contradictions.len();
        if n == 0 {
            return 1.0;
        }
        let sum_weight: f64 = contradictions.iter().map(|c| c.severity.weight()).sum();
        let base = (1.0 - 0.1 * n as f64).max(0.3);
        (base * sum_weight / n as f64).min(1.0)
    }

    async fn resolve(
        &self,
        contradictions: &[Contradiction],
        outputs: &BTreeMap<String, String>,
        backend: &dyn LlmBackend,
    ) -> String {
        if contradictions.is_empty() {
            return String::new();
        }
        let prompt = resolution_prompt(contradictions, outputs);
        match backend.invoke(&prompt, 512).await {
            Ok(text) if !text.trim().is_empty() => text,
            _ => FALLBACK_RESOLUTION.to_string(),
        }
    }
}
