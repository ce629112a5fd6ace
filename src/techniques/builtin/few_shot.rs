//! Few-shot: precede the request with worked examples.
//!
//! Examples come from the `examples` parameter when set, otherwise from a
//! small built-in bank keyed by intent. A role statement placed by an
//! earlier role-framing step stays at the top of the prompt.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tera::Context;

use crate::errors::TechniqueError;
use crate::intent::Intent;
use crate::techniques::template::render;
use crate::techniques::{ContextMap, Technique, TechniqueBase, TechniqueConfig, TechniqueContext};

pub const ID: &str = "few_shot";

const TEMPLATE: &str = "Here {% if examples | length == 1 %}is an example{% else %}are examples{% endif %} of how to handle similar requests:
{% for ex in examples %}
Example {{ loop.index }}:
Input: {{ ex.input }}
Output: {{ ex.output }}
{% endfor %}
Now handle the following request in the same way:
{{ text }}";

const DEFAULT_MAX_EXAMPLES: usize = 2;
const DEFAULT_MAX_INPUT_CHARS: usize = 4000;

/// One input/output demonstration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub input: String,
    pub output: String,
}

impl Example {
    fn new(input: &str, output: &str) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

fn bank_for(intent: Intent) -> Vec<Example> {
    match intent {
        Intent::Debugging => vec![
            Example::new(
                "My loop never terminates: `while i < 10 { println!(\"{}\", i); }`",
                "The loop condition never changes because `i` is not incremented. Add `i += 1;` inside the loop body.",
            ),
            Example::new(
                "Why does `list[len(list)]` raise an IndexError?",
                "Indices are zero-based, so the last valid index is `len(list) - 1`. Use `list[-1]` or `list[len(list) - 1]`.",
            ),
        ],
        Intent::CodeGeneration => vec![
            Example::new(
                "Write a function that reverses a string.",
                "fn reverse(s: &str) -> String { s.chars().rev().collect() }",
            ),
            Example::new(
                "Write a function that checks whether a number is even.",
                "fn is_even(n: i64) -> bool { n % 2 == 0 }",
            ),
        ],
        Intent::Analysis => vec![
            Example::new(
                "Compare SQL and NoSQL databases for a logging workload.",
                "Key factors: write volume, schema flexibility, query patterns. NoSQL favors high write volume and flexible schemas; SQL favors complex queries. Conclusion: NoSQL for raw logs, SQL for aggregated reports.",
            ),
            Example::new(
                "Assess the risk of deploying on Fridays.",
                "Factors: reduced staff over the weekend, slower incident response, user traffic. Conclusion: higher risk unless rollbacks are automated.",
            ),
        ],
        Intent::CreativeWriting => vec![
            Example::new(
                "Write a two-line poem about rain.",
                "Soft silver threads stitch the sky to the street,\nand every puddle hums the clouds' heartbeat.",
            ),
            Example::new(
                "Describe a forest at dawn in one sentence.",
                "Mist curled between the pines like a slow exhale, and the first birds tested the silence.",
            ),
        ],
        Intent::QuestionAnswering | Intent::General => vec![
            Example::new(
                "What is the capital of Australia?",
                "Canberra. It was chosen as a compromise between Sydney and Melbourne.",
            ),
            Example::new(
                "How many minutes are in a day?",
                "1,440 minutes (24 hours x 60 minutes).",
            ),
        ],
    }
}

#[derive(Debug)]
pub struct FewShot {
    base: TechniqueBase,
}

impl FewShot {
    pub fn new(config: TechniqueConfig) -> Self {
        Self {
            base: TechniqueBase::new(config),
        }
    }

    fn max_examples(&self) -> usize {
        self.config()
            .param_usize("max_examples")
            .unwrap_or(DEFAULT_MAX_EXAMPLES)
    }

    fn max_input_chars(&self) -> usize {
        self.config()
            .param_usize("max_input_chars")
            .unwrap_or(DEFAULT_MAX_INPUT_CHARS)
    }

    fn examples(&self, context: &TechniqueContext) -> Result<Vec<Example>, TechniqueError> {
        let mut examples = match self.config().parameters.get("examples") {
            Some(raw) => serde_json::from_value::<Vec<Example>>(raw.clone()).map_err(|e| {
                TechniqueError::InvalidInput(format!("malformed examples parameter: {}", e))
            })?,
            None => bank_for(context.request.intent),
        };
        examples.truncate(self.max_examples());
        if examples.is_empty() {
            return Err(TechniqueError::failed(ID, "no examples available"));
        }
        Ok(examples)
    }
}

impl Technique for FewShot {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn description(&self) -> &'static str {
        "Precedes the request with worked examples"
    }

    fn validate_input(&self, text: &str, _context: &TechniqueContext) -> bool {
        !text.trim().is_empty() && text.chars().count() <= self.max_input_chars()
    }

    fn apply(&self, text: &str, context: &TechniqueContext) -> Result<String, TechniqueError> {
        let examples = self.examples(context)?;

        let text = text.trim();
        let (preamble, body) = match text.split_once("\n\n") {
            Some((head, rest)) if context.has_applied("role_play") => (Some(head), rest),
            _ => (None, text),
        };

        let mut ctx = Context::new();
        ctx.insert("examples", &examples);
        ctx.insert("text", body);
        let rendered = render(TEMPLATE, &ctx)?;

        Ok(match preamble {
            Some(head) => format!("{}\n\n{}", head, rendered),
            None => rendered,
        })
    }

    fn describe_metadata(&self, _input: &str, _output: &str, context: &TechniqueContext) -> ContextMap {
        let source = if self.config().parameters.contains_key("examples") {
            "parameter"
        } else {
            "bank"
        };
        [
            ("example_source".to_string(), Value::from(source)),
            ("intent".to_string(), Value::from(context.request.intent.as_str())),
        ]
        .into()
    }

    fn extract_context_updates(&self, _input: &str, _output: &str, context: &TechniqueContext) -> ContextMap {
        let count = self.examples(context).map(|e| e.len()).unwrap_or(0);
        [
            ("examples_count".to_string(), Value::from(count)),
            ("example_domain".to_string(), Value::from(context.request.intent.as_str())),
        ]
        .into()
    }
}
