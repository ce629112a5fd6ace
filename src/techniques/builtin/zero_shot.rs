//! Zero-shot: append a direct task instruction. Also the engine's default
//! when no recommendation is available.

use serde_json::Value;
use tera::Context;

use crate::errors::TechniqueError;
use crate::intent::Intent;
use crate::techniques::template::render;
use crate::techniques::{ContextMap, Technique, TechniqueBase, TechniqueConfig, TechniqueContext};

pub const ID: &str = "zero_shot";

const TEMPLATE: &str = "{{ text }}\n\n{{ instruction }}";

fn instruction_for(intent: Intent) -> &'static str {
    match intent {
        Intent::Debugging => {
            "Identify the root cause of the problem, explain it clearly, and provide a corrected version."
        }
        Intent::CodeGeneration => {
            "Provide complete, working code with brief explanations of the key decisions."
        }
        Intent::Analysis => "Provide a thorough, well-organized analysis with clear conclusions.",
        Intent::CreativeWriting => "Be original and vivid while staying true to the request.",
        Intent::QuestionAnswering => "Answer clearly and directly, then add any essential context.",
        Intent::General => "Provide a clear, direct, and complete response.",
    }
}

#[derive(Debug)]
pub struct ZeroShot {
    base: TechniqueBase,
}

impl ZeroShot {
    pub fn new(config: TechniqueConfig) -> Self {
        Self {
            base: TechniqueBase::new(config),
        }
    }

    fn instruction<'a>(&'a self, context: &TechniqueContext) -> &'a str {
        self.config()
            .param_str("instruction")
            .unwrap_or_else(|| instruction_for(context.request.intent))
    }
}

impl Technique for ZeroShot {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn description(&self) -> &'static str {
        "Adds a direct, intent-specific task instruction"
    }

    fn apply(&self, text: &str, context: &TechniqueContext) -> Result<String, TechniqueError> {
        let mut ctx = Context::new();
        ctx.insert("text", text.trim());
        ctx.insert("instruction", self.instruction(context));
        render(TEMPLATE, &ctx)
    }

    fn describe_metadata(&self, _input: &str, _output: &str, context: &TechniqueContext) -> ContextMap {
        let source = if self.config().param_str("instruction").is_some() {
            "parameter"
        } else {
            "intent"
        };
        [
            ("instruction_source".to_string(), Value::from(source)),
            ("intent".to_string(), Value::from(context.request.intent.as_str())),
        ]
        .into()
    }
}
