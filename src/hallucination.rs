//! The hallucination / citation check (§2b, gated by
//! `ENABLE_HALLUCINATION_DETECTION`).
//!
//! A deterministic, no-LLM pass over the final synthesized response: any
//! bracketed numeric citation or bare URL that cannot be found in the task's
//! own source materials is flagged as unsupported. This is a heuristic
//! confidence signal, not a truth verifier, and never blocks or alters the
//! response it inspects.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

fn bracket_citation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[(\d+)\]").unwrap())
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://\S+").unwrap())
}

/// `{flag: bool, reason: string}` attached to the report as
/// `"Hallucination Report"` (§2b).
#[derive(Debug, Clone, Serialize)]
pub struct HallucinationReport {
    pub flag: bool,
    pub reason: String,
}

/// Flag `response` if it cites a bracketed marker (e.g. `[3]`) or a URL that
/// does not appear anywhere in `sources` (the outputs of the tasks it was
/// synthesized from).
pub fn check(response: &str, sources: &[&str]) -> HallucinationReport {
    let joined_sources = sources.join("\n");

    let unsupported_citation = bracket_citation_re()
        .find_iter(response)
        .map(|m| m.as_str())
        .find(|marker| !joined_sources.contains(marker));

    if let Some(marker) = unsupported_citation {
        return HallucinationReport {
            flag: true,
            reason: format!("citation marker {marker} does not appear in any source material"),
        };
    }

    let unsupported_url = url_re()
        .find_iter(response)
        .map(|m| m.as_str())
        .find(|url| !joined_sources.contains(url));

    if let Some(url) = unsupported_url {
        return HallucinationReport {
            flag: true,
            reason: format!("URL {url} does not appear in any source material"),
        };
    }

    HallucinationReport {
        flag: false,
        reason: "no unsupported citations or links detected".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_citation_not_present_in_sources() {
        let report = check("Paris is the capital [7].", &["Paris is the capital of France."]);
        assert!(report.flag);
        assert!(report.reason.contains("[7]"));
    }

    #[test]
    fn does_not_flag_citation_present_in_sources() {
        let response = "As established in the analysis [1], Paris is the capital.";
        let sources = ["The task breakdown cites reference [1] for background."];
        let report = check(response, &sources);
        assert!(!report.flag);
    }

    #[test]
    fn flags_url_not_present_in_sources() {
        let report = check("See https://example.com/fact for details.", &["No links here."]);
        assert!(report.flag);
        assert!(report.reason.contains("https://example.com/fact"));
    }

    #[test]
    fn no_citations_or_links_is_unflagged() {
        let report = check("A plain response with no markers at all.", &["source text"]);
        assert!(!report.flag);
    }
}
