//! Structured output: append formatting requirements for the response.

use serde_json::Value;
use tera::Context;

use super::published_role;
use crate::errors::TechniqueError;
use crate::techniques::template::render;
use crate::techniques::{ContextMap, Technique, TechniqueBase, TechniqueConfig, TechniqueContext};

pub const ID: &str = "structured_output";

const TEMPLATE: &str = "{{ text }}

{% if role %}As {{ role }}, format{% else %}Format{% endif %} your response as follows:
{% for rule in rules %}- {{ rule }}
{% endfor %}";

const DEFAULT_FORMAT: &str = "markdown";
const DEFAULT_MAX_INPUT_CHARS: usize = 8000;

fn rules_for(format: &str) -> Option<&'static [&'static str]> {
    match format {
        "json" => Some(&[
            "Respond with valid JSON only.",
            "Ensure all keys are descriptive snake_case strings.",
            "Do not include commentary outside the JSON object.",
        ]),
        "markdown" => Some(&[
            "Use a short heading for each major section.",
            "Use bullet points for lists of items.",
            "Ensure code appears in fenced code blocks.",
        ]),
        "bullet_points" => Some(&[
            "Present the answer as concise bullet points.",
            "Keep each bullet to a single idea.",
            "Order the bullets from most to least important.",
        ]),
        _ => None,
    }
}

#[derive(Debug)]
pub struct StructuredOutput {
    base: TechniqueBase,
}

impl StructuredOutput {
    pub fn new(config: TechniqueConfig) -> Self {
        Self {
            base: TechniqueBase::new(config),
        }
    }

    fn format(&self) -> &str {
        self.config().param_str("format").unwrap_or(DEFAULT_FORMAT)
    }

    fn max_input_chars(&self) -> usize {
        self.config()
            .param_usize("max_input_chars")
            .unwrap_or(DEFAULT_MAX_INPUT_CHARS)
    }
}

impl Technique for StructuredOutput {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn description(&self) -> &'static str {
        "Specifies the structure of the expected response"
    }

    fn validate_input(&self, text: &str, _context: &TechniqueContext) -> bool {
        !text.trim().is_empty() && text.chars().count() <= self.max_input_chars()
    }

    fn apply(&self, text: &str, context: &TechniqueContext) -> Result<String, TechniqueError> {
        let format = self.format();
        let rules = rules_for(format).ok_or_else(|| {
            TechniqueError::failed(ID, format!("unsupported output format '{}'", format))
        })?;

        let mut ctx = Context::new();
        ctx.insert("text", text.trim());
        ctx.insert("rules", rules);
        ctx.insert("role", &published_role(context));
        let rendered = render(TEMPLATE, &ctx)?;
        Ok(rendered.trim_end().to_string())
    }

    fn describe_metadata(&self, _input: &str, _output: &str, _context: &TechniqueContext) -> ContextMap {
        [("format".to_string(), Value::from(self.format()))].into()
    }

    fn extract_context_updates(&self, _input: &str, _output: &str, _context: &TechniqueContext) -> ContextMap {
        [("output_format".to_string(), Value::from(self.format()))].into()
    }
}
