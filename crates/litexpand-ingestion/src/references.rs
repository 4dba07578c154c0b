//! Candidate title extraction from generated review text.
//!
//! The review system prompt asks the model to wrap every paper title in
//! square brackets, so `[Title]` is the primary form. Quoted titles after
//! "titled", "paper" or "study" are picked up as well for output that drifts
//! from that convention. Nothing is filtered: empty or implausible
//! candidates are kept and simply fail to resolve later.

use std::sync::OnceLock;
use regex::Regex;
use tracing::debug;

use crate::models::TitleSet;

fn bracketed() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[(.*?)\]").unwrap())
}

fn quoted_patterns() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [r#"titled "([^"]*)""#, r#"paper "([^"]*)""#, r#"study "([^"]*)""#]
            .iter()
            .map(|p| Regex::new(p).unwrap())
            .collect()
    })
}

/// Extract the deduplicated set of candidate titles from `text`.
/// Returns an empty set when nothing matches.
pub fn extract_references(text: &str) -> TitleSet {
    let mut titles = TitleSet::new();

    titles.extend(bracketed().captures_iter(text).map(|c| c[1].to_string()));
    for re in quoted_patterns() {
        titles.extend(re.captures_iter(text).map(|c| c[1].to_string()));
    }

    debug!(n = titles.len(), "Extracted candidate titles");
    titles
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn set(items: &[&str]) -> TitleSet {
        items.iter().copied().collect()
    }

    #[test]
    fn test_duplicate_brackets_collapse() {
        let text = "See [A] for details, and again [A] later.";
        assert_eq!(extract_references(text), set(&["A"]));
    }

    #[test]
    fn test_bracket_and_titled_pattern_union() {
        let text = "Builds on [A] and the work titled \"B\".";
        assert_eq!(extract_references(text), set(&["A", "B"]));
    }

    #[test]
    fn test_no_matches_returns_empty_set() {
        let text = "A literature review without any citations at all.";
        assert!(extract_references(text).is_empty());
    }

    #[test]
    fn test_survey_example() {
        let text = "The survey builds on [Attention Is All You Need] and the study \"BERT\"";
        assert_eq!(
            extract_references(text),
            set(&["Attention Is All You Need", "BERT"])
        );
    }

    #[test]
    fn test_all_quoted_patterns() {
        let text = r#"A paper "X", a study "Y" and a report titled "Z"."#;
        assert_eq!(extract_references(text), set(&["X", "Y", "Z"]));
    }

    #[test]
    fn test_bracket_match_is_non_greedy() {
        let text = "[First Paper] and [Second Paper]";
        assert_eq!(extract_references(text), set(&["First Paper", "Second Paper"]));
    }

    #[test]
    fn test_empty_and_short_candidates_are_kept() {
        let text = "Markdown checkbox [] and footnote [1].";
        assert_eq!(extract_references(text), set(&["", "1"]));
    }

    #[test]
    fn test_bracket_does_not_span_lines() {
        let text = "[Unclosed title\ncontinues] then [Closed]";
        assert_eq!(extract_references(text), set(&["Closed"]));
    }

    #[test]
    fn test_same_title_from_both_rules_counted_once() {
        let text = "[BERT] is also the paper \"BERT\".";
        assert_eq!(extract_references(text), set(&["BERT"]));
    }

    #[test]
    fn test_case_variants_stay_distinct() {
        let text = "[Deep Residual Learning] vs [deep residual learning]";
        assert_eq!(extract_references(text).len(), 2);
    }
}
