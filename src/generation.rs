//! Request and result types of [`crate::engine::PromptEngine::generate`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chain::{ChainSummary, StepError};
use crate::intent::{Complexity, Intent};
use crate::metrics::QualityMetrics;
use crate::techniques::ContextMap;
use crate::validation::ValidationReport;

/// A prompt enhancement request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub text: String,
    #[serde(default)]
    pub target_model: Option<String>,
    /// `None` asks the recommender; `Some(vec![])` applies nothing.
    #[serde(default)]
    pub techniques: Option<Vec<String>>,
    #[serde(default)]
    pub context: ContextMap,
    /// Maximum output length in characters.
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub intent: Option<Intent>,
    #[serde(default)]
    pub complexity: Option<Complexity>,
}

impl GenerationRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_techniques<I, S>(mut self, techniques: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.techniques = Some(techniques.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn with_target_model(mut self, model: impl Into<String>) -> Self {
        self.target_model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intent = Some(intent);
        self
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = Some(complexity);
        self
    }

    /// Intent named by the request: the typed field first, then a string
    /// `intent` entry in the caller context.
    pub fn declared_intent(&self) -> Option<Intent> {
        self.intent.or_else(|| {
            self.context
                .get("intent")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok())
        })
    }

    pub fn declared_complexity(&self) -> Option<Complexity> {
        self.complexity.or_else(|| {
            self.context
                .get("complexity")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok())
        })
    }
}

/// The assembled output of one `generate` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub request_id: String,
    pub generated_at: DateTime<Utc>,
    pub original_text: String,
    pub enhanced_text: String,
    pub target_model: String,
    /// Techniques that actually changed the text, in application order.
    pub techniques_applied: Vec<String>,
    pub chain: ChainSummary,
    pub step_metadata: HashMap<String, ContextMap>,
    pub errors: Vec<StepError>,
    pub metrics: QualityMetrics,
    pub validation: ValidationReport,
    pub warnings: Vec<String>,
    pub estimated_tokens: usize,
}

impl GenerationResult {
    /// Whether the output differs from the input.
    pub fn is_enhanced(&self) -> bool {
        !self.techniques_applied.is_empty()
    }
}
