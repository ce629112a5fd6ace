//! Technique recommendation for requests that do not name techniques.
//!
//! The recommender is an external collaborator. The engine bounds every
//! call with [`recommend_with_timeout`] and falls back to its default
//! technique when the call fails, times out, or returns nothing.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::intent::{Complexity, Intent};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RecommenderError {
    #[error("recommender timed out after {0} ms")]
    Timeout(u64),

    #[error("recommender unavailable: {0}")]
    Unavailable(String),
}

/// Suggests technique identifiers for a prompt.
#[async_trait]
pub trait TechniqueRecommender: Send + Sync {
    async fn recommend(
        &self,
        text: &str,
        intent: Intent,
        complexity: Complexity,
    ) -> Result<Vec<String>, RecommenderError>;
}

impl fmt::Debug for dyn TechniqueRecommender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TechniqueRecommender")
    }
}

/// Call `recommender`, giving up after `timeout_ms`.
pub async fn recommend_with_timeout(
    recommender: &dyn TechniqueRecommender,
    text: &str,
    intent: Intent,
    complexity: Complexity,
    timeout_ms: u64,
) -> Result<Vec<String>, RecommenderError> {
    let timeout = Duration::from_millis(timeout_ms);
    match tokio::time::timeout(timeout, recommender.recommend(text, intent, complexity)).await {
        Ok(result) => result,
        Err(_) => Err(RecommenderError::Timeout(timeout_ms)),
    }
}

/// Table-driven recommender keyed by intent.
///
/// Complex prompts get an extra reasoning technique appended when the
/// intent's list has none.
#[derive(Debug, Clone, Default)]
pub struct StaticRecommender {
    by_intent: HashMap<Intent, Vec<String>>,
}

impl StaticRecommender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let table: [(Intent, &[&str]); 6] = [
            (Intent::CodeGeneration, &["role_play", "few_shot", "structured_output"]),
            (Intent::Debugging, &["role_play", "chain_of_thought", "structured_output"]),
            (Intent::Analysis, &["role_play", "tree_of_thoughts", "structured_output"]),
            (Intent::CreativeWriting, &["role_play", "analogical_reasoning", "emotional_appeal"]),
            (Intent::QuestionAnswering, &["chain_of_thought", "constitutional_ai"]),
            (Intent::General, &["zero_shot"]),
        ];

        let mut recommender = Self::new();
        for (intent, ids) in table {
            recommender = recommender.with_intent(intent, ids.iter().map(|s| s.to_string()).collect());
        }
        recommender
    }

    pub fn with_intent(mut self, intent: Intent, techniques: Vec<String>) -> Self {
        self.by_intent.insert(intent, techniques);
        self
    }
}

#[async_trait]
impl TechniqueRecommender for StaticRecommender {
    async fn recommend(
        &self,
        _text: &str,
        intent: Intent,
        complexity: Complexity,
    ) -> Result<Vec<String>, RecommenderError> {
        let mut techniques = self.by_intent.get(&intent).cloned().unwrap_or_default();

        let has_reasoning = techniques
            .iter()
            .any(|t| t == "chain_of_thought" || t == "tree_of_thoughts" || t == "step_by_step");
        if complexity == Complexity::Complex && !has_reasoning && !techniques.is_empty() {
            techniques.push("step_by_step".to_string());
        }
        Ok(techniques)
    }
}
