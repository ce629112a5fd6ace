//! Role framing: open the prompt with an expert persona suited to the
//! intent. Publishes `role` and `expertise_area` for later steps.

use serde_json::Value;
use tera::Context;

use crate::errors::TechniqueError;
use crate::intent::Intent;
use crate::techniques::template::{render, with_article};
use crate::techniques::{ContextMap, Technique, TechniqueBase, TechniqueConfig, TechniqueContext};

pub const ID: &str = "role_play";

const TEMPLATE: &str = "You are {{ role }}{% if expertise %} with deep expertise in {{ expertise }}{% endif %}.\n\n{{ text }}";

fn role_for(intent: Intent) -> &'static str {
    match intent {
        Intent::Debugging => "senior software engineer specializing in debugging",
        Intent::CodeGeneration => "experienced software engineer",
        Intent::Analysis => "meticulous analyst",
        Intent::CreativeWriting => "accomplished creative writer",
        Intent::QuestionAnswering => "knowledgeable subject-matter expert",
        Intent::General => "helpful expert assistant",
    }
}

fn expertise_for(intent: Intent) -> Option<&'static str> {
    match intent {
        Intent::Debugging => Some("root-cause analysis and systematic troubleshooting"),
        Intent::CodeGeneration => Some("clean, maintainable software design"),
        Intent::Analysis => Some("structured reasoning and evidence evaluation"),
        Intent::CreativeWriting => Some("storytelling and vivid language"),
        Intent::QuestionAnswering => Some("explaining complex topics clearly"),
        Intent::General => None,
    }
}

#[derive(Debug)]
pub struct RolePlay {
    base: TechniqueBase,
}

impl RolePlay {
    pub fn new(config: TechniqueConfig) -> Self {
        Self {
            base: TechniqueBase::new(config),
        }
    }

    fn role<'a>(&'a self, context: &TechniqueContext) -> &'a str {
        self.config()
            .param_str("role")
            .unwrap_or_else(|| role_for(context.request.intent))
    }

    fn expertise<'a>(&'a self, context: &TechniqueContext) -> Option<&'a str> {
        self.config()
            .param_str("expertise")
            .or_else(|| expertise_for(context.request.intent))
    }
}

impl Technique for RolePlay {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn description(&self) -> &'static str {
        "Frames the prompt with an expert persona"
    }

    fn validate_input(&self, text: &str, _context: &TechniqueContext) -> bool {
        let trimmed = text.trim_start();
        // already framed
        !trimmed.is_empty() && !trimmed.starts_with("You are ")
    }

    fn apply(&self, text: &str, context: &TechniqueContext) -> Result<String, TechniqueError> {
        let mut ctx = Context::new();
        ctx.insert("role", &with_article(self.role(context)));
        ctx.insert("expertise", &self.expertise(context));
        ctx.insert("text", text.trim());
        render(TEMPLATE, &ctx)
    }

    fn describe_metadata(&self, _input: &str, _output: &str, context: &TechniqueContext) -> ContextMap {
        let source = if self.config().param_str("role").is_some() {
            "parameter"
        } else {
            "intent"
        };
        [
            ("role".to_string(), Value::from(self.role(context))),
            ("role_source".to_string(), Value::from(source)),
        ]
        .into()
    }

    fn extract_context_updates(&self, _input: &str, _output: &str, context: &TechniqueContext) -> ContextMap {
        let mut updates = ContextMap::new();
        updates.insert("role".into(), Value::from(self.role(context)));
        if let Some(expertise) = self.expertise(context) {
            updates.insert("expertise_area".into(), Value::from(expertise));
        }
        updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::Complexity;
    use crate::techniques::RequestContext;

    fn debugging_ctx() -> TechniqueContext {
        TechniqueContext::new(RequestContext::new(Intent::Debugging, Complexity::Simple, "gpt-4"))
    }

    #[test]
    fn test_prefixes_role_for_intent() {
        let technique = RolePlay::new(TechniqueConfig::new(ID));
        let out = technique.apply("Debug this code", &debugging_ctx()).unwrap();
        assert!(out.starts_with("You are a senior software engineer specializing in debugging with deep expertise in"));
        assert!(out.ends_with("\n\nDebug this code"));
    }

    #[test]
    fn test_role_parameter_and_updates() {
        let technique = RolePlay::new(
            TechniqueConfig::new(ID)
                .with_parameter("role", "astronomer")
                .with_parameter("expertise", "exoplanets"),
        );
        let ctx = debugging_ctx();
        let out = technique.apply("Explain transits", &ctx).unwrap();
        assert!(out.starts_with("You are an astronomer with deep expertise in exoplanets."));

        let updates = technique.extract_context_updates("", &out, &ctx);
        assert_eq!(updates["role"], "astronomer");
        assert_eq!(updates["expertise_area"], "exoplanets");
    }

    #[test]
    fn test_general_intent_has_no_expertise_clause() {
        let technique = RolePlay::new(TechniqueConfig::new(ID));
        let out = technique.apply("Plan my week", &TechniqueContext::default()).unwrap();
        assert!(out.starts_with("You are a helpful expert assistant.\n\n"));
    }

    #[test]
    fn test_rejects_already_framed_prompt() {
        let technique = RolePlay::new(TechniqueConfig::new(ID));
        let ctx = TechniqueContext::default();
        assert!(!technique.validate_input("You are a pirate. Talk like one.", &ctx));
        assert!(technique.validate_input("Talk like a pirate.", &ctx));
    }
}
