//! Constitutional review: ask the model to check its answer against a
//! list of principles before finalizing it.

use serde_json::Value;
use tera::Context;

use crate::errors::TechniqueError;
use crate::techniques::template::render;
use crate::techniques::{ContextMap, Technique, TechniqueBase, TechniqueConfig, TechniqueContext};

pub const ID: &str = "constitutional_ai";

const TEMPLATE: &str = "{{ text }}

Before finalizing your response, review it against these principles:
{% for p in principles %}- {{ p }}
{% endfor %}
If any part of the response violates a principle, revise it before answering.";

const DEFAULT_PRINCIPLES: &[&str] = &[
    "Be accurate and do not state guesses as facts.",
    "Be helpful and address the request directly.",
    "Avoid harmful, biased, or unsafe content.",
    "Acknowledge uncertainty and limitations.",
];

#[derive(Debug)]
pub struct ConstitutionalAi {
    base: TechniqueBase,
}

impl ConstitutionalAi {
    pub fn new(config: TechniqueConfig) -> Self {
        Self {
            base: TechniqueBase::new(config),
        }
    }

    fn principles(&self) -> Vec<String> {
        self.config()
            .param_string_list("principles")
            .unwrap_or_else(|| DEFAULT_PRINCIPLES.iter().map(|p| p.to_string()).collect())
    }
}

impl Technique for ConstitutionalAi {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn description(&self) -> &'static str {
        "Adds a self-review against guiding principles"
    }

    fn apply(&self, text: &str, _context: &TechniqueContext) -> Result<String, TechniqueError> {
        let principles = self.principles();
        if principles.is_empty() {
            return Err(TechniqueError::InvalidInput(
                "constitutional_ai requires at least one principle".into(),
            ));
        }
        let mut ctx = Context::new();
        ctx.insert("text", text.trim());
        ctx.insert("principles", &principles);
        render(TEMPLATE, &ctx)
    }

    fn extract_context_updates(&self, _input: &str, _output: &str, _context: &TechniqueContext) -> ContextMap {
        [("principles_count".to_string(), Value::from(self.principles().len()))].into()
    }
}
