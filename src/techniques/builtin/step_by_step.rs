//! Step by step: ask for an explicitly labelled, sequential procedure.
//!
//! When an earlier step already published a `reasoning_structure`, only a
//! short directive is added so the scaffolds don't stack.

use serde_json::Value;
use tera::Context;

use crate::errors::TechniqueError;
use crate::techniques::template::render;
use crate::techniques::{ContextMap, Technique, TechniqueBase, TechniqueConfig, TechniqueContext};

pub const ID: &str = "step_by_step";

const FULL_TEMPLATE: &str = "{{ text }}

Approach this systematically, one step at a time:
{% for step in steps %}Step {{ loop.index }}: {{ step }}
{% endfor %}
Complete each step before moving on to the next.";

const REINFORCE_TEMPLATE: &str = "{{ text }}

Work through the reasoning above one step at a time, and label each step explicitly.";

const STEPS: &[&str] = &[
    "Restate the goal and list any constraints.",
    "Gather the information needed to proceed.",
    "Solve the first part of the problem.",
    "Extend the solution to the remaining parts.",
    "Check the result against the goal and constraints.",
    "Summarize the outcome.",
];

const DEFAULT_MAX_STEPS: usize = 5;

#[derive(Debug)]
pub struct StepByStep {
    base: TechniqueBase,
}

impl StepByStep {
    pub fn new(config: TechniqueConfig) -> Self {
        Self {
            base: TechniqueBase::new(config),
        }
    }

    fn max_steps(&self) -> usize {
        self.config()
            .param_usize("max_steps")
            .unwrap_or(DEFAULT_MAX_STEPS)
            .clamp(2, STEPS.len())
    }

    fn reinforces(context: &TechniqueContext) -> bool {
        context.get_str("reasoning_structure").is_some()
    }
}

impl Technique for StepByStep {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn description(&self) -> &'static str {
        "Asks for a labelled, sequential procedure"
    }

    fn apply(&self, text: &str, context: &TechniqueContext) -> Result<String, TechniqueError> {
        let mut ctx = Context::new();
        ctx.insert("text", text.trim());
        if Self::reinforces(context) {
            return render(REINFORCE_TEMPLATE, &ctx);
        }
        ctx.insert("steps", &STEPS[..self.max_steps()]);
        render(FULL_TEMPLATE, &ctx)
    }

    fn describe_metadata(&self, _input: &str, _output: &str, context: &TechniqueContext) -> ContextMap {
        let mode = if Self::reinforces(context) { "reinforce" } else { "full" };
        [("mode".to_string(), Value::from(mode))].into()
    }

    fn extract_context_updates(&self, _input: &str, _output: &str, context: &TechniqueContext) -> ContextMap {
        let mut updates = ContextMap::new();
        if !Self::reinforces(context) {
            updates.insert("reasoning_structure".into(), Value::from(ID));
            updates.insert("steps_count".into(), Value::from(self.max_steps()));
        }
        updates
    }
}
