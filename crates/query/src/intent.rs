//! Heuristic intent classification
//!
//! Distinguishes broad background-seeking questions from narrow factual
//! ones. Pure pattern matching over lower-cased text; the result widens
//! retrieval and relaxes the answer persona but touches nothing else.

use regex_lite::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Closed classification of a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryIntent {
    General,
    Specific,
}

impl QueryIntent {
    pub fn is_general(self) -> bool {
        self == QueryIntent::General
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryIntent::General => "general",
            QueryIntent::Specific => "specific",
        }
    }
}

fn general_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"\b(tell me about (you|your( self)?|this|the (tool|service|product)))\b",
            r"\b(who (are|r) (you|the author|the team)|what (do|does) (you|this) do)\b",
            r"\b(your (background|experience|credentials|expertise|bio|story))\b",
            r"\b(general(ized)?|high[- ]level|overview|best practices|where do i start|how to get started)\b",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static pattern"))
        .collect()
    })
}

fn advice_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b(advice|guidance|framework|roadmap|strategy|playbook)\b")
            .expect("static pattern")
    })
}

fn short_help_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\b(help|advice|guidance|tips)\b").expect("static pattern"))
}

/// Classify one question. Everything not recognizably general is specific.
pub fn classify(question: &str) -> QueryIntent {
    let s = question.to_lowercase();

    if general_patterns().iter().any(|p| p.is_match(&s)) {
        return QueryIntent::General;
    }
    if advice_pattern().is_match(&s) && s.len() < 140 {
        return QueryIntent::General;
    }
    if s.trim().len() <= 24 && short_help_pattern().is_match(&s) {
        return QueryIntent::General;
    }

    QueryIntent::Specific
}

/// Expanded embedding query for general-intent questions: the original
/// question plus synonym anchors that pull in profile/overview chunks.
pub fn expanded_query(question: &str) -> String {
    format!(
        "{} — overview • summary • profile • experience • services • case studies • methodology • credentials",
        question
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_referential_is_general() {
        assert_eq!(classify("Tell me about yourself"), QueryIntent::General);
        assert_eq!(classify("who are you exactly?"), QueryIntent::General);
        assert_eq!(classify("what does this do?"), QueryIntent::General);
    }

    #[test]
    fn test_background_is_general() {
        assert_eq!(
            classify("What is your experience with carbon accounting?"),
            QueryIntent::General
        );
        assert_eq!(classify("describe your credentials"), QueryIntent::General);
    }

    #[test]
    fn test_overview_terms_are_general() {
        assert_eq!(
            classify("Give me a high-level overview of scope 3 reporting"),
            QueryIntent::General
        );
        assert_eq!(classify("where do I start?"), QueryIntent::General);
    }

    #[test]
    fn test_short_advice_question_is_general() {
        assert_eq!(classify("Any advice on ESG strategy?"), QueryIntent::General);
        assert_eq!(classify("need help"), QueryIntent::General);
    }

    #[test]
    fn test_long_advice_question_is_specific() {
        let long = format!(
            "I would like advice about {} in our 2023 supplier emissions data set",
            "the detailed interplay of many very specific reporting clauses, exemptions, and disclosure thresholds"
        );
        assert!(long.len() >= 140);
        assert_eq!(classify(&long), QueryIntent::Specific);
    }

    #[test]
    fn test_factual_question_is_specific() {
        assert_eq!(
            classify("What was the total scope 2 emissions figure for 2022?"),
            QueryIntent::Specific
        );
        assert_eq!(classify("Which frameworks does the Q3 report cover?"), QueryIntent::Specific);
    }

    #[test]
    fn test_expanded_query_keeps_question() {
        let expanded = expanded_query("tell me about yourself");
        assert!(expanded.starts_with("tell me about yourself"));
        assert!(expanded.contains("overview"));
        assert!(expanded.contains("methodology"));
    }
}
