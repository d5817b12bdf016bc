//! The Quality Scorer (C4, §4.4).
//!
//! [`QualityScorer::score`] computes five confidence components and three
//! accuracy indicators deterministically, then blends in one LLM-backed
//! probe (task alignment). The deterministic half is split out as
//! [`QualityScorer::score_with_alignment`] so that property tests can fix
//! the alignment input and assert the rest of the pipeline is a pure
//! function of `(response, task_type, prompt)` (§8 property 6).

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::backend::LlmBackend;
use crate::output_parser::parse_number;
use crate::types::{AccuracyIndicators, ContentFlag, QualityMetrics};

/// Fixed lowercase phrase list (glossary "Uncertainty phrases").
const UNCERTAINTY_PHRASES: &[&str] = &[
    "i'm not sure",
    "uncertain",
    "unclear",
    "might be",
    "could be",
    "possibly",
    "perhaps",
    "i don't know",
    "not certain",
    "can't determine",
    "insufficient information",
    "hard to say",
    "difficult to determine",
    "i think",
    "i believe",
    "seems like",
    "appears to",
    "probably",
];

/// Glossary "Confidence boosters".
const CONFIDENCE_BOOSTERS: &[&str] = &[
    "confirmed",
    "verified",
    "established",
    "proven",
    "demonstrated",
    "clearly",
    "definitely",
    "certainly",
    "undoubtedly",
    "precisely",
    "specifically",
    "exactly",
    "research shows",
    "studies indicate",
];

/// Glossary "Vague terms".
const VAGUE_TERMS: &[&str] = &["some", "many", "few", "several", "various", "often", "sometimes", "usually"];

/// Glossary "Transition words".
const TRANSITION_WORDS: &[&str] = &[
    "however",
    "therefore",
    "furthermore",
    "moreover",
    "additionally",
    "consequently",
    "meanwhile",
    "similarly",
    "in contrast",
    "for example",
    "specifically",
    "in particular",
    "as a result",
    "on the other hand",
];

/// Contradictory word pairs checked for `internal_consistency` co-occurrence
/// (§4.4 "Accuracy indicators").
const CONTRADICTORY_PAIRS: &[(&str, &str)] = &[
    ("always", "never"),
    ("all", "none"),
    ("increase", "decrease"),
    ("positive", "negative"),
    ("true", "false"),
    ("correct", "incorrect"),
];

const PLACEHOLDER_MARKERS: &[&str] = &["[placeholder]", "todo", "tbd", "xxx", "..."];

fn digit_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").unwrap())
}

fn four_digit_year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap())
}

fn capitalized_bigram_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z][a-z]+\s+[A-Z][a-z]+\b").unwrap())
}

fn capitalized_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z][a-z]+\b").unwrap())
}

fn bracket_citation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[(\d+)\]").unwrap())
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://\S+").unwrap())
}

fn bullet_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*[-*•]\s+").unwrap())
}

fn numbered_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*\d+[.)]\s+").unwrap())
}

fn function_keyword_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(fn|function|def)\s+\w").unwrap())
}

/// The "optimal length" word count target for a given task type (§4.4).
fn optimal_length(task_type: &str) -> usize {
    match task_type {
        "code_generation" => 200,
        "explanation" => 300,
        "fact_check" => 150,
        _ => 250,
    }
}

fn word_count(response: &str) -> usize {
    response.split_whitespace().count()
}

/// Occurrences of every phrase in `phrases` within `lower` (already
/// lowercased), summed across the whole response — not per-word, matching
/// the source's substring-count convention.
fn count_phrase_occurrences(lower: &str, phrases: &[&str]) -> usize {
    phrases.iter().map(|p| lower.matches(p).count()).sum()
}

fn density_per_100_words(count: usize, words: usize) -> f64 {
    if words == 0 {
        0.0
    } else {
        count as f64 * 100.0 / words as f64
    }
}

fn sentence_count(response: &str) -> usize {
    response
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .count()
}

fn lexical_diversity(response: &str) -> f64 {
    let words: Vec<String> = response
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return 0.0;
    }
    let unique: HashSet<&String> = words.iter().collect();
    unique.len() as f64 / words.len() as f64
}

/// `Score(response, taskType, prompt) -> QualityMetrics` (§4.4), minus the
/// LLM-backed task-alignment probe.
pub struct QualityScorer;

impl Default for QualityScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl QualityScorer {
    pub fn new() -> Self {
        Self
    }

    /// Fixed probe prompt for the task-alignment component (§4.4).
    fn alignment_prompt(response: &str, task_type: &str, prompt: &str) -> String {
        format!(
            "On a scale from 0.0 to 1.0, how well does the following response address \
             the original task? Respond with only a decimal number between 0.0 and 1.0.\n\n\
             Task type: {task_type}\nOriginal prompt: {prompt}\n\nResponse to evaluate:\n{response}"
        )
    }

    /// Run the LLM task-alignment probe and parse the first decimal in
    /// `[0,1]` from the reply. A probe failure, or a reply with no
    /// in-range decimal, defaults to `0.5` (§4.4).
    pub async fn probe_task_alignment(
        &self,
        response: &str,
        task_type: &str,
        prompt: &str,
        backend: &dyn LlmBackend,
    ) -> f64 {
        let probe_prompt = Self::alignment_prompt(response, task_type, prompt);
        match backend.invoke(&probe_prompt, 32).await {
            Ok(reply) => parse_number::<f64>(&reply)
                .ok()
                .filter(|v| (0.0..=1.0).contains(v))
                .unwrap_or(0.5),
            Err(_) => 0.5,
        }
    }

    /// Full scoring pipeline: runs the alignment probe then delegates to
    /// the pure [`Self::score_with_alignment`].
    pub async fn score(
        &self,
        response: &str,
        task_type: &str,
        prompt: &str,
        backend: &dyn LlmBackend,
    ) -> QualityMetrics {
        let alignment = self.probe_task_alignment(response, task_type, prompt, backend).await;
        self.score_with_alignment(response, task_type, prompt, alignment)
    }

    /// The deterministic core of scoring — pure given a fixed
    /// `task_alignment` (§8 property 6).
    pub fn score_with_alignment(
        &self,
        response: &str,
        task_type: &str,
        _prompt: &str,
        task_alignment: f64,
    ) -> QualityMetrics {
        let w = word_count(response);
        let lower = response.to_lowercase();

        let length = (0.2 + 0.8 * (w as f64 / optimal_length(task_type) as f64).min(1.0)).clamp(0.0, 1.0);

        let uncertainty_density = density_per_100_words(count_phrase_occurrences(&lower, UNCERTAINTY_PHRASES), w);
        let booster_density = density_per_100_words(count_phrase_occurrences(&lower, CONFIDENCE_BOOSTERS), w);
        let uncertainty = ((1.0 - 0.3 * uncertainty_density).max(0.0) + 0.2 * booster_density).clamp(0.0, 1.0);

        let digit_runs = digit_run_re().find_iter(response).count();
        let years = four_digit_year_re().find_iter(response).count();
        let bigrams = capitalized_bigram_re().find_iter(response).count();
        let specificity = (((digit_runs + years + bigrams) as f64) / 10.0).min(1.0);

        let has_bullets = bullet_line_re().is_match(response);
        let has_numbered = numbered_line_re().is_match(response);
        let multi_paragraph = response.matches("\n\n").count() >= 2;
        let structure = (0.5
            + if has_bullets { 0.2 } else { 0.0 }
            + if has_numbered { 0.2 } else { 0.0 }
            + if multi_paragraph { 0.1 } else { 0.0 })
        .clamp(0.0, 1.0);

        let confidence = (0.15 * length
            + 0.25 * uncertainty
            + 0.20 * specificity
            + 0.15 * structure
            + 0.25 * task_alignment)
            .clamp(0.0, 1.0);

        let coherence = self.coherence(response, w);
        let completeness = self.completeness(&lower, task_type, w);
        let readability = self.readability(w, response);
        let accuracy_indicators = self.accuracy_indicators(response, &lower, w);
        let content_flags = self.content_flags(response, w);

        QualityMetrics {
            confidence,
            coherence,
            completeness,
            readability,
            word_count: w,
            content_flags,
            accuracy_indicators,
        }
    }

    fn coherence(&self, response: &str, _w: usize) -> f64 {
        let sentences = sentence_count(response);
        if sentences < 2 {
            return 0.8;
        }
        let lower = response.to_lowercase();
        let transitions = TRANSITION_WORDS.iter().filter(|p| lower.contains(*p)).count();
        let base = 0.7 + 0.05 * (transitions.min(4) as f64);
        (base * lexical_diversity(response)).clamp(0.0, 1.0)
    }

    fn completeness(&self, lower: &str, task_type: &str, w: usize) -> f64 {
        let mut score = 0.5;
        match task_type {
            "explanation" => {
                if lower.contains("example") || lower.contains("for instance") {
                    score += 0.2;
                }
                if w > 100 {
                    score += 0.2;
                }
                if lower.contains("because") || lower.contains("due to") {
                    score += 0.1;
                }
            }
            "fact_check" => {
                const MARKERS: &[&str] = &["verified", "confirmed", "according to", "source", "study"];
                if MARKERS.iter().any(|m| lower.contains(m)) {
                    score += 0.3;
                }
            }
            "code_generation" => {
                let has_fence = lower.contains("```");
                let has_function = function_keyword_re().is_match(lower);
                if has_fence || has_function {
                    score += 0.3;
                }
                if lower.contains("//") || lower.contains('#') || lower.contains("/*") {
                    score += 0.1;
                }
            }
            _ => {}
        }
        if w > 50 {
            score += 0.1;
        }
        score.clamp(0.0, 1.0)
    }

    fn readability(&self, w: usize, response: &str) -> f64 {
        let s = sentence_count(response);
        if s == 0 {
            return 0.0;
        }
        let avg = w as f64 / s as f64;
        if (10.0..=25.0).contains(&avg) {
            1.0
        } else if avg < 10.0 {
            0.7
        } else {
            (1.0 - 0.02 * (avg - 25.0)).max(0.3)
        }
    }

    fn accuracy_indicators(&self, response: &str, lower: &str, w: usize) -> AccuracyIndicators {
        let sentences = sentence_count(response);
        let internal_consistency = if sentences < 2 {
            1.0
        } else {
            let mut contradictory_count = 0;
            for (a, b) in CONTRADICTORY_PAIRS {
                if Self::co_occur_within(lower, a, b, 200) {
                    contradictory_count += 1;
                }
            }
            (1.0 - 0.3 * contradictory_count as f64).max(0.0)
        };

        let bracket_matches: Vec<&str> = bracket_citation_re()
            .captures_iter(response)
            .map(|c| c.get(1).unwrap().as_str())
            .collect();
        let has_bracket = !bracket_matches.is_empty();
        let has_url = url_re().is_match(response);
        let citation_quality = if !has_bracket && !has_url {
            0.5
        } else {
            let unique: HashSet<&str> = bracket_matches.iter().copied().collect();
            let bracket_unique = has_bracket && unique.len() == bracket_matches.len();
            0.3 + if has_bracket { 0.3 } else { 0.0 } + if has_url { 0.2 } else { 0.0 } + if bracket_unique { 0.2 } else { 0.0 }
        };

        let digits = digit_run_re().find_iter(response).count();
        let dates = four_digit_year_re().find_iter(response).count();
        let proper_nouns = capitalized_word_re().find_iter(response).count();
        let vague_count = VAGUE_TERMS.iter().map(|t| lower.matches(t).count()).sum::<usize>();
        let raw_specificity = (digits + dates + proper_nouns) as f64 / (w as f64 / 20.0).max(1.0)
            - vague_count as f64 / (w as f64 / 50.0).max(1.0);
        let specificity = raw_specificity.clamp(0.0, 1.0);

        AccuracyIndicators {
            internal_consistency,
            citation_quality: citation_quality.clamp(0.0, 1.0),
            specificity,
        }
    }

    fn co_occur_within(lower: &str, a: &str, b: &str, window: usize) -> bool {
        let positions_a: Vec<usize> = lower.match_indices(a).map(|(i, _)| i).collect();
        let positions_b: Vec<usize> = lower.match_indices(b).map(|(i, _)| i).collect();
        if positions_a.is_empty() || positions_b.is_empty() {
            return false;
        }
        positions_a
            .iter()
            .any(|pa| positions_b.iter().any(|pb| pa.abs_diff(*pb) <= window))
    }

    fn content_flags(&self, response: &str, w: usize) -> HashSet<ContentFlag> {
        let mut flags = HashSet::new();

        let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
        for word in response.split_whitespace() {
            let cleaned: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            if cleaned.len() > 3 {
                *counts.entry(cleaned).or_insert(0) += 1;
            }
        }
        if w > 0 && counts.values().any(|&c| c as f64 > 0.1 * w as f64) {
            flags.insert(ContentFlag::ExcessiveRepetition);
        }

        let lower = response.to_lowercase();
        if PLACEHOLDER_MARKERS.iter().any(|m| lower.contains(m)) {
            flags.insert(ContentFlag::PlaceholderContent);
        }

        if response.trim().chars().count() < 20 {
            flags.insert(ContentFlag::TooShort);
        }
        if response.len() > 5000 {
            flags.insert(ContentFlag::TooLong);
        }

        flags
    }
}
