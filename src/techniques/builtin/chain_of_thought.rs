//! Chain of thought: append an explicit numbered reasoning scaffold.
//!
//! Publishes `reasoning_structure` so other reasoning techniques later in
//! the chain can avoid stacking a second scaffold.

use serde_json::Value;
use tera::Context;

use super::published_role;
use crate::errors::TechniqueError;
use crate::intent::Intent;
use crate::techniques::template::render;
use crate::techniques::{ContextMap, Technique, TechniqueBase, TechniqueConfig, TechniqueContext};

pub const ID: &str = "chain_of_thought";

const TEMPLATE: &str = "{{ text }}

{% if role %}As {{ role }}, let's{% else %}Let's{% endif %} think through this step by step:
{% for step in steps %}{{ loop.index }}. {{ step }}
{% endfor %}
Show your reasoning for each step before giving the final answer.";

fn steps_for(intent: Intent) -> &'static [&'static str] {
    match intent {
        Intent::Debugging => &[
            "Describe the expected behavior and the observed behavior.",
            "Identify the code paths involved and where they could diverge.",
            "Form hypotheses about the root cause and check each against the evidence.",
            "Propose a fix and explain how to verify it.",
        ],
        Intent::CodeGeneration => &[
            "Clarify the inputs, outputs, and constraints.",
            "Outline the approach and the main components.",
            "Implement each component, explaining non-obvious decisions.",
            "Review the result for edge cases and errors.",
        ],
        Intent::Analysis => &[
            "Identify the key factors that need to be examined.",
            "Examine each factor with supporting evidence.",
            "Weigh the factors against each other.",
            "Draw a conclusion and state its limitations.",
        ],
        _ => &[
            "Understand what is being asked and identify the key requirements.",
            "Break the problem down into smaller parts.",
            "Work through each part, explaining the reasoning.",
            "Combine the results and verify the final answer.",
        ],
    }
}

#[derive(Debug)]
pub struct ChainOfThought {
    base: TechniqueBase,
}

impl ChainOfThought {
    pub fn new(config: TechniqueConfig) -> Self {
        Self {
            base: TechniqueBase::new(config),
        }
    }

    fn steps(&self, context: &TechniqueContext) -> Vec<String> {
        self.config()
            .param_string_list("steps")
            .unwrap_or_else(|| {
                steps_for(context.request.intent)
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            })
    }
}

impl Technique for ChainOfThought {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn description(&self) -> &'static str {
        "Adds an explicit step-by-step reasoning scaffold"
    }

    fn apply(&self, text: &str, context: &TechniqueContext) -> Result<String, TechniqueError> {
        let steps = self.steps(context);
        if steps.is_empty() {
            return Err(TechniqueError::InvalidInput(
                "chain_of_thought requires at least one reasoning step".into(),
            ));
        }

        let mut ctx = Context::new();
        ctx.insert("text", text.trim());
        ctx.insert("steps", &steps);
        ctx.insert("role", &published_role(context));
        render(TEMPLATE, &ctx)
    }

    fn describe_metadata(&self, _input: &str, _output: &str, context: &TechniqueContext) -> ContextMap {
        [
            ("steps_added".to_string(), Value::from(self.steps(context).len())),
            ("intent".to_string(), Value::from(context.request.intent.as_str())),
        ]
        .into()
    }

    fn extract_context_updates(&self, _input: &str, _output: &str, context: &TechniqueContext) -> ContextMap {
        [
            ("reasoning_structure".to_string(), Value::from(ID)),
            ("reasoning_steps".to_string(), Value::from(self.steps(context).len())),
        ]
        .into()
    }
}
