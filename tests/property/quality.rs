//! Property tests for the Quality Scorer (C4), covering §8 invariants 6-7:
//! `score_with_alignment` is a pure function of its inputs, and every
//! component score it produces is bounded to `[0, 1]`.

use proptest::prelude::*;
use reasoning_core::quality::QualityScorer;

fn task_type_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("explanation"),
        Just("fact_check"),
        Just("code_generation"),
        Just("synthesis"),
        Just("analysis"),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Invariant 6: given the same response, task type, prompt, and fixed
    /// alignment score, `score_with_alignment` always returns identical
    /// metrics — there is no hidden clock, randomness, or I/O in the
    /// deterministic half of scoring.
    #[test]
    fn score_with_alignment_is_deterministic(
        response in ".{0,300}",
        task_type in task_type_strategy(),
        prompt in ".{0,80}",
        alignment in 0.0f64..1.0,
    ) {
        let scorer = QualityScorer::new();
        let first = scorer.score_with_alignment(&response, task_type, &prompt, alignment);
        let second = scorer.score_with_alignment(&response, task_type, &prompt, alignment);

        prop_assert_eq!(first.confidence, second.confidence);
        prop_assert_eq!(first.coherence, second.coherence);
        prop_assert_eq!(first.completeness, second.completeness);
        prop_assert_eq!(first.readability, second.readability);
        prop_assert_eq!(first.word_count, second.word_count);
    }

    /// Invariant 7: every component the deterministic scorer produces stays
    /// within the documented `[0, 1]` range, across arbitrary response text,
    /// task types, and alignment inputs (including out-of-spec alignment
    /// values a misbehaving probe might still hand back).
    #[test]
    fn all_component_scores_stay_in_unit_range(
        response in ".{0,500}",
        task_type in task_type_strategy(),
        prompt in ".{0,80}",
        alignment in -1.0f64..2.0,
    ) {
        let scorer = QualityScorer::new();
        let metrics = scorer.score_with_alignment(&response, task_type, &prompt, alignment);

        prop_assert!((0.0..=1.0).contains(&metrics.confidence), "confidence out of range: {}", metrics.confidence);
        prop_assert!((0.0..=1.0).contains(&metrics.coherence), "coherence out of range: {}", metrics.coherence);
        prop_assert!((0.0..=1.0).contains(&metrics.completeness), "completeness out of range: {}", metrics.completeness);
        prop_assert!((0.0..=1.0).contains(&metrics.readability), "readability out of range: {}", metrics.readability);
        prop_assert!((0.0..=1.0).contains(&metrics.accuracy_indicators.internal_consistency));
        prop_assert!((0.0..=1.0).contains(&metrics.accuracy_indicators.citation_quality));
        prop_assert!((0.0..=1.0).contains(&metrics.accuracy_indicators.specificity));
    }

    /// An empty response never panics and is scored as unambiguously weak:
    /// zero word count and the "too short" content flag set.
    #[test]
    fn empty_response_is_flagged_too_short(
        task_type in task_type_strategy(),
        prompt in ".{0,40}",
        alignment in 0.0f64..1.0,
    ) {
        let scorer = QualityScorer::new();
        let metrics = scorer.score_with_alignment("", task_type, &prompt, alignment);

        prop_assert_eq!(metrics.word_count, 0);
        prop_assert!(metrics.content_flags.contains(&reasoning_core::types::ContentFlag::TooShort));
    }
}
