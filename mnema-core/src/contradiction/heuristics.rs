//! Text heuristics for conflict detection between two highly similar chunks.
//!
//! Three signal families: negation phrasing, opposing value pairs, and
//! numeric claims about the same unit. A candidate that is very similar but
//! trips none of them still produces a weak signal, because near-duplicate
//! phrasing of the "same" fact is where silent contradictions hide.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::ConflictType;

/// Per-candidate heuristic verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct ContradictionAnalysis {
    pub is_contradiction: bool,
    pub conflict_type: ConflictType,
    pub confidence: f32,
    pub explanation: String,
}

impl ContradictionAnalysis {
    fn none() -> Self {
        Self {
            is_contradiction: false,
            conflict_type: ConflictType::Partial,
            confidence: 0.0,
            explanation: String::new(),
        }
    }
}

/// "no longer" marks a temporal replacement rather than a flat negation.
static TEMPORAL_NEGATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bno longer\b|\bnot anymore\b|\bused to be\b").unwrap());

static NEGATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bis not\b|\bare not\b|\bisn't\b|\baren't\b|\bcannot\b|\bcan't\b|\bnever\b|\bno\b")
        .unwrap()
});

/// Antonym pairs that flip a claim when swapped between two similar texts.
const OPPOSING_PAIRS: &[(&str, &str)] = &[
    ("best", "worst"),
    ("true", "false"),
    ("always", "never"),
    ("fast", "slow"),
    ("easy", "hard"),
    ("increase", "decrease"),
    ("high", "low"),
    ("before", "after"),
];

static NUMBER_WITH_UNIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*([a-zA-Z%]+)").unwrap());

fn word_set(text: &str) -> std::collections::HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn has_word(text: &str, word: &str) -> bool {
    word_set(text).contains(word)
}

/// Numeric claims `(value, unit)` extracted from a text, unit lowercased.
fn numeric_claims(text: &str) -> Vec<(f64, String)> {
    NUMBER_WITH_UNIT
        .captures_iter(text)
        .filter_map(|cap| {
            let value: f64 = cap[1].parse().ok()?;
            Some((value, cap[2].to_lowercase()))
        })
        .collect()
}

/// Analyze a new statement against an existing one.
///
/// Both texts are assumed to be semantically close already (the caller
/// filters by vector similarity); these heuristics only decide whether the
/// closeness hides a conflict.
#[must_use]
pub fn analyze(new_content: &str, existing_content: &str, similarity: f32) -> ContradictionAnalysis {
    let new_lower = new_content.to_lowercase();
    let existing_lower = existing_content.to_lowercase();

    // Temporal negation: the new statement retires the old one.
    if TEMPORAL_NEGATION.is_match(&new_lower) && !TEMPORAL_NEGATION.is_match(&existing_lower) {
        return ContradictionAnalysis {
            is_contradiction: true,
            conflict_type: ConflictType::Temporal,
            confidence: (0.75 + 0.2 * similarity).min(0.95),
            explanation: "new statement marks the prior claim as outdated".to_string(),
        };
    }

    // Plain negation asymmetry: one side negates what the other asserts.
    let new_negated = NEGATION.is_match(&new_lower);
    let existing_negated = NEGATION.is_match(&existing_lower);
    if new_negated != existing_negated {
        return ContradictionAnalysis {
            is_contradiction: true,
            conflict_type: ConflictType::Direct,
            confidence: (0.7 + 0.2 * similarity).min(0.92),
            explanation: "negation on one side of two near-identical claims".to_string(),
        };
    }

    // Opposing value pairs across the two texts.
    for (a, b) in OPPOSING_PAIRS {
        let forward = has_word(&new_lower, a) && has_word(&existing_lower, b);
        let backward = has_word(&new_lower, b) && has_word(&existing_lower, a);
        if forward || backward {
            return ContradictionAnalysis {
                is_contradiction: true,
                conflict_type: ConflictType::Direct,
                confidence: (0.72 + 0.2 * similarity).min(0.93),
                explanation: format!("opposing values \"{a}\" / \"{b}\" in matching claims"),
            };
        }
    }

    // Numeric conflict: same unit, different magnitude.
    let new_numbers = numeric_claims(&new_lower);
    let existing_numbers = numeric_claims(&existing_lower);
    for (value_a, unit_a) in &new_numbers {
        for (value_b, unit_b) in &existing_numbers {
            if unit_a == unit_b && (value_a - value_b).abs() > f64::EPSILON {
                return ContradictionAnalysis {
                    is_contradiction: true,
                    conflict_type: ConflictType::Partial,
                    confidence: 0.75,
                    explanation: format!(
                        "conflicting figures for the same unit: {value_a}{unit_a} vs {value_b}{unit_b}"
                    ),
                };
            }
        }
    }

    // Very high similarity with no clear signal is itself a weak signal.
    if similarity >= 0.95 {
        return ContradictionAnalysis {
            is_contradiction: true,
            conflict_type: ConflictType::Partial,
            confidence: 0.5,
            explanation: "near-duplicate phrasing with no clear conflict marker".to_string(),
        };
    }

    ContradictionAnalysis::none()
}
