// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic query complexity classification.
//!
//! Pure string rules: no model call, no network, no state.

use serde::Serialize;
use strum::Display;
use tollgate_core::Tier;

/// How demanding a query looks, least first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Trivial,
    Simple,
    Moderate,
    Complex,
    Expert,
}

impl Complexity {
    /// Bucket for a raw heuristic score.
    pub fn from_score(score: i32) -> Self {
        match score {
            i32::MIN..=-3 => Self::Trivial,
            -2..=-1 => Self::Simple,
            0..=1 => Self::Moderate,
            2..=4 => Self::Complex,
            _ => Self::Expert,
        }
    }

    /// The tier a query of this complexity ideally runs on.
    pub fn desired_tier(&self) -> Tier {
        match self {
            Self::Trivial | Self::Simple => Tier::Local,
            Self::Moderate => Tier::CloudFast,
            Self::Complex => Tier::CloudBalanced,
            Self::Expert => Tier::CloudBest,
        }
    }
}

/// What kind of help a query asks for. Recorded for audit and display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Lookup,
    Explanation,
    CodeGeneration,
    Refactoring,
    Architecture,
    Debugging,
    Review,
    Planning,
    General,
}

impl QueryType {
    /// First matching keyword family wins.
    pub fn classify(query: &str) -> Self {
        let q = query.to_lowercase();
        let any = |words: &[&str]| words.iter().any(|w| q.contains(w));

        if any(&["what is", "syntax", "first "]) || q.starts_with("list ") {
            Self::Lookup
        } else if any(&["explain", "how does", "why "]) {
            Self::Explanation
        } else if any(&["write", "create", "implement", "generate"]) {
            Self::CodeGeneration
        } else if any(&["refactor", "improve", "optimize"]) {
            Self::Refactoring
        } else if any(&["architect", "design", "should i", "trade-off"]) {
            Self::Architecture
        } else if any(&["bug", "fix", "debug", "error"]) {
            Self::Debugging
        } else if any(&["review", "check"]) {
            Self::Review
        } else if any(&["plan", "roadmap"]) {
            Self::Planning
        } else {
            Self::General
        }
    }
}

/// A classified query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    pub value: i32,
    pub complexity: Complexity,
    pub query_type: QueryType,
}

/// Greetings and acknowledgements (exact match, case-insensitive).
const ACKNOWLEDGEMENTS: &[&str] = &[
    "hi", "hello", "hey", "thanks", "thank you", "bye", "ok", "okay", "yes", "no", "sure",
    "good", "great", "cool", "nice", "yep", "nope", "yeah", "nah",
];

/// Openers of simple, single-fact questions.
const SIMPLE_OPENERS: &[&str] = &[
    "what time",
    "what day",
    "what date",
    "how are you",
    "what's up",
    "who are you",
    "what is the time",
    "what is the date",
];

/// Each one present adds to the score.
const ANALYTICAL_INDICATORS: &[&str] = &[
    "analyze",
    "compare",
    "evaluate",
    "implement",
    "design",
    "architecture",
    "step by step",
    "explain in detail",
    "debug",
    "refactor",
    "code review",
    "write a function",
    "write code",
    "write a program",
    "optimize",
    "algorithm",
    "strategy",
    "in depth",
    "comprehensive",
];

const EXPERT_INDICATORS: &[&str] = &[
    "architect",
    "design pattern",
    "trade-off",
    "pros and cons",
    "best approach",
    "should i",
];

/// Scores queries with fixed keyword and shape rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryClassifier;

impl QueryClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, query: &str) -> Score {
        let value = self.score(query);
        Score {
            value,
            complexity: Complexity::from_score(value),
            query_type: QueryType::classify(query),
        }
    }

    /// Raw heuristic score. An empty query scores as trivial.
    pub fn score(&self, query: &str) -> i32 {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return -3;
        }
        let lower = trimmed.to_lowercase();

        let mut score = length_score(trimmed.split_whitespace().count());

        if ACKNOWLEDGEMENTS.contains(&lower.trim_end_matches(['!', '.', '?']).trim()) {
            score -= 3;
        }
        if SIMPLE_OPENERS.iter().any(|o| lower.starts_with(o)) {
            score -= 2;
        }

        let analytical = ANALYTICAL_INDICATORS
            .iter()
            .filter(|i| lower.contains(*i))
            .count() as i32;
        score += 2 * analytical;

        if EXPERT_INDICATORS.iter().any(|i| lower.contains(i)) {
            score += 3;
        }
        if trimmed.contains("```") {
            score += 3;
        }
        if count_sentences(trimmed) >= 3 {
            score += 1;
        }
        score
    }
}

fn length_score(word_count: usize) -> i32 {
    match word_count {
        0..=3 => -2,
        4..=15 => 0,
        16..=50 => 1,
        _ => 2,
    }
}

fn count_sentences(text: &str) -> usize {
    text.chars()
        .filter(|c| matches!(c, '.' | '?' | '!'))
        .count()
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complexity(q: &str) -> Complexity {
        QueryClassifier::new().classify(q).complexity
    }

    #[test]
    fn greetings_are_trivial() {
        for q in ["hi", "Hello", "thanks!", "ok", "thank you"] {
            assert_eq!(complexity(q), Complexity::Trivial, "{q}");
        }
    }

    #[test]
    fn simple_openers_are_simple() {
        assert_eq!(complexity("what time is it?"), Complexity::Simple);
        assert_eq!(complexity("maybe"), Complexity::Simple);
    }

    #[test]
    fn neutral_question_is_moderate() {
        assert_eq!(complexity("what's the weather like today?"), Complexity::Moderate);
    }

    #[test]
    fn analytical_work_is_complex() {
        assert_eq!(
            complexity("analyze this code and refactor it for better performance"),
            Complexity::Complex
        );
    }

    #[test]
    fn code_fence_raises_score() {
        assert_eq!(
            complexity("can you fix this?\n```\nfn main() { panic!() }\n```"),
            Complexity::Complex
        );
    }

    #[test]
    fn architectural_trade_offs_are_expert() {
        let score = QueryClassifier::new()
            .classify("should i design the plugin architecture around trade-offs of dynamic loading");
        assert_eq!(score.complexity, Complexity::Expert);
        assert_eq!(score.complexity.desired_tier(), Tier::CloudBest);
    }

    #[test]
    fn empty_query_is_trivial() {
        assert_eq!(complexity(""), Complexity::Trivial);
        assert_eq!(complexity("   "), Complexity::Trivial);
    }

    #[test]
    fn buckets_and_desired_tiers() {
        assert_eq!(Complexity::from_score(-3), Complexity::Trivial);
        assert_eq!(Complexity::from_score(-1), Complexity::Simple);
        assert_eq!(Complexity::from_score(1), Complexity::Moderate);
        assert_eq!(Complexity::from_score(4), Complexity::Complex);
        assert_eq!(Complexity::from_score(5), Complexity::Expert);
        assert_eq!(Complexity::Simple.desired_tier(), Tier::Local);
        assert_eq!(Complexity::Moderate.desired_tier(), Tier::CloudFast);
        assert_eq!(Complexity::Complex.desired_tier(), Tier::CloudBalanced);
    }

    #[test]
    fn query_types() {
        assert_eq!(QueryType::classify("what is a mutex"), QueryType::Lookup);
        assert_eq!(QueryType::classify("explain async await"), QueryType::Explanation);
        assert_eq!(QueryType::classify("write a function to sort"), QueryType::CodeGeneration);
        assert_eq!(QueryType::classify("fix this bug"), QueryType::Debugging);
        assert_eq!(QueryType::classify("plan the migration"), QueryType::Planning);
        assert_eq!(QueryType::classify("hello there"), QueryType::General);
    }
}
