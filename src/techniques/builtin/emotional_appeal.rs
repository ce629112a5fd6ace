//! Emotional appeal: close the prompt with a statement of stakes.

use serde_json::Value;
use tera::Context;

use super::published_role;
use crate::errors::TechniqueError;
use crate::techniques::template::render;
use crate::techniques::{ContextMap, Technique, TechniqueBase, TechniqueConfig, TechniqueContext};

pub const ID: &str = "emotional_appeal";

const TEMPLATE: &str = "{{ text }}

{{ appeal }}{% if role %} As {{ role }}, you are well placed to help with this.{% endif %}";

const DEFAULT_INTENSITY: &str = "medium";

fn appeal_for(intensity: &str) -> Option<&'static str> {
    match intensity {
        "low" => Some("This is important to get right."),
        "medium" => Some(
            "This is very important to my work, so please take your time and be thorough.",
        ),
        "high" => Some(
            "This is critically important to me and my career. Please give it your full attention and ensure your answer is accurate.",
        ),
        _ => None,
    }
}

#[derive(Debug)]
pub struct EmotionalAppeal {
    base: TechniqueBase,
}

impl EmotionalAppeal {
    pub fn new(config: TechniqueConfig) -> Self {
        Self {
            base: TechniqueBase::new(config),
        }
    }

    fn intensity(&self) -> &str {
        self.config()
            .param_str("intensity")
            .unwrap_or(DEFAULT_INTENSITY)
    }
}

impl Technique for EmotionalAppeal {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn description(&self) -> &'static str {
        "Adds a statement of stakes to encourage careful answers"
    }

    fn apply(&self, text: &str, context: &TechniqueContext) -> Result<String, TechniqueError> {
        let intensity = self.intensity();
        let appeal = appeal_for(intensity).ok_or_else(|| {
            TechniqueError::failed(ID, format!("unknown intensity '{}'", intensity))
        })?;

        let mut ctx = Context::new();
        ctx.insert("text", text.trim());
        ctx.insert("appeal", appeal);
        ctx.insert("role", &published_role(context));
        render(TEMPLATE, &ctx)
    }

    fn describe_metadata(&self, _input: &str, _output: &str, _context: &TechniqueContext) -> ContextMap {
        [("intensity".to_string(), Value::from(self.intensity()))].into()
    }
}
