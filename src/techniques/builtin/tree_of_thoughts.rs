//! Tree of thoughts: have the model explore several candidate approaches
//! and commit to the strongest one.

use serde_json::Value;
use tera::Context;

use crate::errors::TechniqueError;
use crate::techniques::template::render;
use crate::techniques::{ContextMap, Technique, TechniqueBase, TechniqueConfig, TechniqueContext};

pub const ID: &str = "tree_of_thoughts";

const FULL_TEMPLATE: &str = "{{ text }}

Explore {{ branches }} distinct approaches before committing to one:
{% for i in range(end=branches) %}Approach {{ i + 1 }}: describe the idea, its strengths, and its risks.
{% endfor %}
Then compare the approaches and continue with the most promising one, explaining why it was chosen.";

const BRIEF_TEMPLATE: &str = "{{ text }}

Before following the reasoning steps, briefly consider {{ branches }} alternative approaches and pick the strongest.";

const DEFAULT_BRANCHES: usize = 3;
const MIN_BRANCHES: usize = 2;
const MAX_BRANCHES: usize = 5;

#[derive(Debug)]
pub struct TreeOfThoughts {
    base: TechniqueBase,
}

impl TreeOfThoughts {
    pub fn new(config: TechniqueConfig) -> Self {
        Self {
            base: TechniqueBase::new(config),
        }
    }

    fn branches(&self) -> usize {
        self.config()
            .param_usize("branches")
            .unwrap_or(DEFAULT_BRANCHES)
    }
}

impl Technique for TreeOfThoughts {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn description(&self) -> &'static str {
        "Explores several approaches before committing to one"
    }

    fn apply(&self, text: &str, context: &TechniqueContext) -> Result<String, TechniqueError> {
        let branches = self.branches();
        if !(MIN_BRANCHES..=MAX_BRANCHES).contains(&branches) {
            return Err(TechniqueError::InvalidInput(format!(
                "branches must be between {} and {}, got {}",
                MIN_BRANCHES, MAX_BRANCHES, branches
            )));
        }

        let mut ctx = Context::new();
        ctx.insert("text", text.trim());
        ctx.insert("branches", &branches);
        if context.get_str("reasoning_structure").is_some() {
            render(BRIEF_TEMPLATE, &ctx)
        } else {
            render(FULL_TEMPLATE, &ctx)
        }
    }

    fn extract_context_updates(&self, _input: &str, _output: &str, context: &TechniqueContext) -> ContextMap {
        let mut updates = ContextMap::new();
        updates.insert("branches_explored".into(), Value::from(self.branches()));
        if context.get_str("reasoning_structure").is_none() {
            updates.insert("reasoning_structure".into(), Value::from(ID));
        }
        updates
    }
}
