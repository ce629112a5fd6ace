//! Analogical reasoning: ask for an analogy from a familiar domain before
//! answering.

use serde_json::Value;
use tera::Context;

use crate::errors::TechniqueError;
use crate::intent::Intent;
use crate::techniques::template::render;
use crate::techniques::{ContextMap, Technique, TechniqueBase, TechniqueConfig, TechniqueContext};

pub const ID: &str = "analogical_reasoning";

const TEMPLATE: &str = "{{ text }}

Before answering, think of an analogous problem from a familiar domain such as {{ domain }}. Explain the analogy briefly, then use it to inform your answer.";

fn domain_for(intent: Intent) -> &'static str {
    match intent {
        Intent::Debugging => "medical diagnosis",
        Intent::CodeGeneration => "building construction",
        Intent::Analysis => "scientific experiments",
        Intent::CreativeWriting => "music composition",
        Intent::QuestionAnswering => "teaching a student",
        Intent::General => "everyday life",
    }
}

#[derive(Debug)]
pub struct AnalogicalReasoning {
    base: TechniqueBase,
}

impl AnalogicalReasoning {
    pub fn new(config: TechniqueConfig) -> Self {
        Self {
            base: TechniqueBase::new(config),
        }
    }

    fn domain<'a>(&'a self, context: &TechniqueContext) -> &'a str {
        self.config()
            .param_str("domain")
            .unwrap_or_else(|| domain_for(context.request.intent))
    }
}

impl Technique for AnalogicalReasoning {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn description(&self) -> &'static str {
        "Grounds the answer in an analogy from a familiar domain"
    }

    fn apply(&self, text: &str, context: &TechniqueContext) -> Result<String, TechniqueError> {
        let mut ctx = Context::new();
        ctx.insert("text", text.trim());
        ctx.insert("domain", self.domain(context));
        render(TEMPLATE, &ctx)
    }

    fn extract_context_updates(&self, _input: &str, _output: &str, context: &TechniqueContext) -> ContextMap {
        [("analogy_domain".to_string(), Value::from(self.domain(context)))].into()
    }
}
