//! Prompt intent and complexity classification.
//!
//! Requests may carry both explicitly. When they don't, the engine falls
//! back to the keyword heuristics in [`infer_intent`] and the validator's
//! complexity score via [`Complexity::from_score`].

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// What the prompt is trying to get done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    CodeGeneration,
    Debugging,
    Analysis,
    CreativeWriting,
    QuestionAnswering,
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeGeneration => "code_generation",
            Self::Debugging => "debugging",
            Self::Analysis => "analysis",
            Self::CreativeWriting => "creative_writing",
            Self::QuestionAnswering => "question_answering",
            Self::General => "general",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "code_generation" | "coding" => Ok(Self::CodeGeneration),
            "debugging" | "debug" => Ok(Self::Debugging),
            "analysis" => Ok(Self::Analysis),
            "creative_writing" | "creative" => Ok(Self::CreativeWriting),
            "question_answering" | "qa" => Ok(Self::QuestionAnswering),
            "general" => Ok(Self::General),
            other => Err(format!("unknown intent '{}'", other)),
        }
    }
}

/// Coarse prompt complexity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl Complexity {
    /// Bucket a complexity score in [0, 1].
    pub fn from_score(score: f64) -> Self {
        if score < 0.3 {
            Self::Simple
        } else if score < 0.6 {
            Self::Moderate
        } else {
            Self::Complex
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Moderate => "moderate",
            Self::Complex => "complex",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Complexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" | "low" => Ok(Self::Simple),
            "moderate" | "medium" => Ok(Self::Moderate),
            "complex" | "high" => Ok(Self::Complex),
            other => Err(format!("unknown complexity '{}'", other)),
        }
    }
}

static DEBUGGING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(debug|fix|bug|error|exception|crash|broken|failing|stack ?trace)\b").unwrap()
});
static CODE_GENERATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(write|implement|create|build|generate|refactor)\b.*\b(code|function|class|script|program|api|module|method)s?\b").unwrap()
});
static ANALYSIS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(analy[sz]e|analysis|compare|evaluate|assess|review|summari[sz]e)\b").unwrap()
});
static CREATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(story|poem|creative|fiction|narrative|lyrics|novel)\b").unwrap()
});
static QUESTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(what|why|how|when|where|who|which|is|are|can|does|do)\b").unwrap()
});

/// Guess the intent of `text` from keywords.
///
/// Checks run most-specific first; anything unmatched is `General`.
pub fn infer_intent(text: &str) -> Intent {
    if DEBUGGING.is_match(text) {
        Intent::Debugging
    } else if CODE_GENERATION.is_match(text) {
        Intent::CodeGeneration
    } else if ANALYSIS.is_match(text) {
        Intent::Analysis
    } else if CREATIVE.is_match(text) {
        Intent::CreativeWriting
    } else if QUESTION.is_match(text) || text.trim_end().ends_with('?') {
        Intent::QuestionAnswering
    } else {
        Intent::General
    }
}
