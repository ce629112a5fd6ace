//! Post-hoc quality scoring of an enhanced prompt.
//!
//! Scores are keyword and structure heuristics over the original text, the
//! final text and the list of applied techniques. Everything is bounded to
//! [0, 1]. [`MetricsCalculator::calculate`] is total: an internal failure
//! yields [`QualityMetrics::unavailable`] instead of an error.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::text;

pub const CLARITY_WEIGHT: f64 = 0.3;
pub const SPECIFICITY_WEIGHT: f64 = 0.3;
pub const COHERENCE_WEIGHT: f64 = 0.4;

/// Effectiveness assigned to techniques without a dedicated check.
pub const BASELINE_EFFECTIVENESS: f64 = 0.7;

const PRECISION_MARKERS: &[&str] = &[
    "ensure", "must", "format", "specific", "exactly", "include", "provide", "should",
    "required",
];

const TRANSITIONS: &[&str] = &[
    "first",
    "second",
    "then",
    "next",
    "finally",
    "therefore",
    "however",
    "because",
    "additionally",
    "furthermore",
    "consequently",
    "in conclusion",
];

static STRUCTURAL_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(\d+[.)]|[-*•]\s|#{1,6}\s|Step \d+)").unwrap()
});
static NUMBERED_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*\d+[.)]\s").unwrap());
static PRECISION_PATTERN: Lazy<Regex> =
    Lazy::new(|| text::term_pattern(PRECISION_MARKERS).unwrap());
static TRANSITION_PATTERN: Lazy<Regex> = Lazy::new(|| text::term_pattern(TRANSITIONS).unwrap());
static EXAMPLE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bexample\b").unwrap());

#[derive(Debug, Error, PartialEq)]
pub enum MetricsError {
    #[error("non-finite {0} score")]
    NonFinite(&'static str),
}

/// Heuristic quality signals for one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// False when scoring failed; all scores are then zero.
    pub available: bool,
    pub clarity: f64,
    pub specificity: f64,
    pub coherence: f64,
    pub overall_quality: f64,
    /// Growth in length, as a percentage clamped to [0, 100].
    pub improvement_percentage: f64,
    pub technique_effectiveness: HashMap<String, f64>,
}

impl QualityMetrics {
    /// The result reported when scoring could not be completed.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            clarity: 0.0,
            specificity: 0.0,
            coherence: 0.0,
            overall_quality: 0.0,
            improvement_percentage: 0.0,
            technique_effectiveness: HashMap::new(),
        }
    }
}

/// Stateless scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCalculator;

impl MetricsCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Score a transformation. Never fails.
    pub fn calculate(&self, original: &str, enhanced: &str, applied: &[String]) -> QualityMetrics {
        match self.try_calculate(original, enhanced, applied) {
            Ok(metrics) => metrics,
            Err(e) => {
                log::warn!("Quality metrics unavailable: {}", e);
                QualityMetrics::unavailable()
            }
        }
    }

    pub fn try_calculate(
        &self,
        original: &str,
        enhanced: &str,
        applied: &[String],
    ) -> Result<QualityMetrics, MetricsError> {
        let clarity = finite("clarity", clarity_score(original, enhanced))?;
        let specificity = finite("specificity", specificity_score(original, enhanced))?;
        let coherence = finite("coherence", coherence_score(enhanced))?;
        let overall_quality = finite(
            "overall",
            CLARITY_WEIGHT * clarity + SPECIFICITY_WEIGHT * specificity + COHERENCE_WEIGHT * coherence,
        )?;
        let improvement_percentage =
            finite("improvement", improvement_percentage(original, enhanced))?;

        let mut effectiveness = HashMap::new();
        for id in applied {
            let score = finite("effectiveness", technique_effectiveness(id, enhanced))?;
            effectiveness.insert(id.clone(), score);
        }

        Ok(QualityMetrics {
            available: true,
            clarity,
            specificity,
            coherence,
            overall_quality,
            improvement_percentage,
            technique_effectiveness: effectiveness,
        })
    }
}

fn finite(name: &'static str, value: f64) -> Result<f64, MetricsError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(MetricsError::NonFinite(name))
    }
}

/// Rewards structural markers (lists, headings, steps) and added paragraphs.
pub fn clarity_score(original: &str, enhanced: &str) -> f64 {
    let markers = STRUCTURAL_LINE.find_iter(enhanced).count() as f64;
    let mut score = 0.5 + (0.05 * markers).min(0.3);
    if text::paragraph_count(enhanced) > text::paragraph_count(original) {
        score += 0.2;
    }
    score.clamp(0.0, 1.0)
}

/// Rewards precision markers added by the enhancement.
pub fn specificity_score(original: &str, enhanced: &str) -> f64 {
    let before = PRECISION_PATTERN.find_iter(original).count();
    let after = PRECISION_PATTERN.find_iter(enhanced).count();
    let added = after.saturating_sub(before) as f64;
    (0.5 + (0.1 * added).min(0.5)).clamp(0.0, 1.0)
}

/// Rewards transition words, capped.
pub fn coherence_score(enhanced: &str) -> f64 {
    let transitions = TRANSITION_PATTERN.find_iter(enhanced).count() as f64;
    (0.5 + (0.05 * transitions).min(0.5)).clamp(0.0, 1.0)
}

pub fn improvement_percentage(original: &str, enhanced: &str) -> f64 {
    let before = original.chars().count();
    if before == 0 {
        return 0.0;
    }
    let after = enhanced.chars().count() as f64;
    ((after - before as f64) / before as f64 * 100.0).clamp(0.0, 100.0)
}

/// Whether `technique_id` left its signature in `enhanced`.
pub fn technique_effectiveness(technique_id: &str, enhanced: &str) -> f64 {
    let lower = enhanced.to_lowercase();
    let score = match technique_id {
        "chain_of_thought" | "step_by_step" => {
            if lower.contains("step by step") || NUMBERED_LINE.is_match(enhanced) || lower.contains("step 1") {
                0.9
            } else {
                0.6
            }
        }
        "few_shot" => {
            if EXAMPLE_WORD.find_iter(enhanced).count() >= 2 {
                0.9
            } else {
                0.6
            }
        }
        "role_play" => {
            if lower.contains("you are") {
                0.85
            } else {
                0.6
            }
        }
        "tree_of_thoughts" => {
            if lower.contains("approach") || lower.contains("perspective") {
                0.85
            } else {
                0.6
            }
        }
        "structured_output" => {
            if lower.contains("format") || lower.contains("structure") {
                0.85
            } else {
                0.6
            }
        }
        "analogical_reasoning" => {
            if lower.contains("analog") || lower.contains("similar to") {
                0.8
            } else {
                0.6
            }
        }
        "constitutional_ai" => {
            if lower.contains("principle") {
                0.8
            } else {
                0.6
            }
        }
        "emotional_appeal" => {
            if lower.contains("important") {
                0.8
            } else {
                0.6
            }
        }
        "zero_shot" => 0.75,
        _ => BASELINE_EFFECTIVENESS,
    };
    score.clamp(0.0, 1.0)
}
