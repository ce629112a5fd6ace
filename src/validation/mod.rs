//! Pre-flight validation of a generation request.
//!
//! Runs once before chaining. Errors make the request invalid; warnings
//! and suggestions are advisory and pass through to the result.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::techniques::TechniqueRegistry;
use crate::text;

/// Technique pairs that work against each other.
pub const CONFLICTING_TECHNIQUES: &[(&str, &str)] = &[
    ("zero_shot", "few_shot"),
    ("chain_of_thought", "tree_of_thoughts"),
    ("step_by_step", "tree_of_thoughts"),
];

const AMBIGUOUS_PRONOUNS: &[&str] = &["it", "this", "that", "they", "them", "these", "those"];
const MIN_WORDS_FOR_AMBIGUITY: usize = 5;

static CONFLICTING_INSTRUCTIONS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?is)\b(brief|concise|short)\b.*\b(detailed|comprehensive|thorough|in-depth)\b",
        r"(?is)\b(detailed|comprehensive|thorough|in-depth)\b.*\b(brief|concise|short)\b",
        r"(?is)\b(simple|simply)\b.*\b(complex|advanced|sophisticated)\b",
        r"(?is)\balways\b.*\bnever\b",
        r"(?is)\bformal\b.*\b(casual|informal)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static TECHNICAL_MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(```|\bfn\b|\bdef\b|\bclass\b|\bfunction\b|\balgorithm\b|\bAPI\b|\bSQL\b|[{};]|=>|->)").unwrap()
});

/// Outcome of validating a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
    pub estimated_token_count: usize,
    /// 0 (trivial) to 1 (highly complex).
    pub complexity_score: f64,
    /// 0 (hard to read) to 1 (easy to read).
    pub readability_score: f64,
}

/// Request validator.
#[derive(Debug, Clone)]
pub struct PromptValidator {
    pub max_length: usize,
    pub min_length: usize,
    pub max_techniques: usize,
    pub ambiguity_threshold: f64,
    pub max_avg_sentence_words: f64,
}

impl Default for PromptValidator {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl PromptValidator {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_length: config.max_prompt_length,
            min_length: config.min_prompt_length,
            max_techniques: config.max_techniques,
            ambiguity_threshold: config.ambiguity_threshold,
            max_avg_sentence_words: config.max_avg_sentence_words,
        }
    }

    /// Validate `prompt` and the requested `techniques` against `registry`.
    pub fn validate(
        &self,
        prompt: &str,
        techniques: &[String],
        registry: &TechniqueRegistry,
    ) -> ValidationReport {
        self.validate_scored(prompt, techniques, registry, complexity_score(prompt))
    }

    /// Like [`validate`](Self::validate), reusing a complexity score the
    /// caller already computed for `prompt`.
    pub fn validate_scored(
        &self,
        prompt: &str,
        techniques: &[String],
        registry: &TechniqueRegistry,
        complexity_score: f64,
    ) -> ValidationReport {
        let mut report = ValidationReport {
            estimated_token_count: text::estimate_tokens(prompt),
            complexity_score,
            readability_score: readability_score(prompt),
            ..ValidationReport::default()
        };

        self.check_length(prompt, &mut report);
        if !prompt.trim().is_empty() {
            self.check_ambiguity(prompt, &mut report);
            self.check_sentence_length(prompt, &mut report);
            check_conflicting_instructions(prompt, &mut report);
        }
        self.check_techniques(techniques, registry, &mut report);

        report.is_valid = report.errors.is_empty();
        if !report.is_valid {
            log::debug!("Validation failed: {:?}", report.errors);
        }
        report
    }

    fn check_length(&self, prompt: &str, report: &mut ValidationReport) {
        let length = prompt.chars().count();
        if prompt.trim().is_empty() {
            report.errors.push("Prompt text cannot be empty".into());
        } else if length < self.min_length {
            report.errors.push(format!(
                "Prompt is shorter than the minimum of {} characters (got {})",
                self.min_length, length
            ));
        }
        if length > self.max_length {
            report.errors.push(format!(
                "Prompt exceeds the maximum of {} characters (got {})",
                self.max_length, length
            ));
        }
    }

    fn check_ambiguity(&self, prompt: &str, report: &mut ValidationReport) {
        let words = text::words(prompt);
        if words.len() < MIN_WORDS_FOR_AMBIGUITY {
            return;
        }
        let pronouns = words
            .iter()
            .filter(|w| AMBIGUOUS_PRONOUNS.contains(&w.as_str()))
            .count();
        let density = pronouns as f64 / words.len() as f64;
        if density > self.ambiguity_threshold {
            report.warnings.push(format!(
                "High ambiguous pronoun density ({:.0}% of words)",
                density * 100.0
            ));
            report
                .suggestions
                .push("Replace pronouns like 'it' or 'this' with the specific nouns they refer to".into());
        }
    }

    fn check_sentence_length(&self, prompt: &str, report: &mut ValidationReport) {
        let avg = average_sentence_words(prompt);
        if avg > self.max_avg_sentence_words {
            report.warnings.push(format!(
                "Average sentence length is {:.1} words",
                avg
            ));
            report
                .suggestions
                .push("Break long sentences into shorter, focused instructions".into());
        }
    }

    fn check_techniques(
        &self,
        techniques: &[String],
        registry: &TechniqueRegistry,
        report: &mut ValidationReport,
    ) {
        for id in techniques {
            if !registry.is_registered(id) {
                report.errors.push(format!("Unknown technique: {}", id));
            }
        }

        let mut seen = HashSet::new();
        for id in techniques {
            if !seen.insert(id.as_str()) {
                report
                    .warnings
                    .push(format!("Technique '{}' requested more than once", id));
            }
        }

        for (a, b) in CONFLICTING_TECHNIQUES {
            if seen.contains(a) && seen.contains(b) {
                report
                    .warnings
                    .push(format!("Techniques '{}' and '{}' may conflict", a, b));
            }
        }

        if techniques.len() > self.max_techniques {
            report.warnings.push(format!(
                "{} techniques requested; more than {} may dilute the prompt",
                techniques.len(),
                self.max_techniques
            ));
        }
    }
}

fn check_conflicting_instructions(prompt: &str, report: &mut ValidationReport) {
    if CONFLICTING_INSTRUCTIONS.iter().any(|re| re.is_match(prompt)) {
        report
            .warnings
            .push("Prompt contains potentially conflicting instructions".into());
        report
            .suggestions
            .push("Resolve contradictory requirements (e.g. 'brief' vs 'detailed')".into());
    }
}

fn average_sentence_words(prompt: &str) -> f64 {
    let sentences = text::split_sentences(prompt);
    if sentences.is_empty() {
        return 0.0;
    }
    let words: usize = sentences.iter().map(|s| text::word_count(s)).sum();
    words as f64 / sentences.len() as f64
}

/// Heuristic complexity in [0, 1] from length, vocabulary, and technical
/// content.
pub fn complexity_score(prompt: &str) -> f64 {
    let words = text::words(prompt);
    if words.is_empty() {
        return 0.0;
    }
    let length_factor = (words.len() as f64 / 200.0).min(1.0);
    let avg_word_len =
        words.iter().map(|w| w.chars().count()).sum::<usize>() as f64 / words.len() as f64;
    let vocabulary_factor = (avg_word_len / 10.0).min(1.0);
    let technical_factor = if TECHNICAL_MARKERS.is_match(prompt) { 1.0 } else { 0.0 };

    (0.5 * length_factor + 0.3 * vocabulary_factor + 0.2 * technical_factor).clamp(0.0, 1.0)
}

/// Heuristic readability in [0, 1]; short sentences read best.
pub fn readability_score(prompt: &str) -> f64 {
    if prompt.trim().is_empty() {
        return 0.0;
    }
    let avg = average_sentence_words(prompt);
    (1.0 - (avg - 15.0).max(0.0) / 30.0).clamp(0.0, 1.0)
}
