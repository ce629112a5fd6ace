//! Built-in technique catalogue.
//!
//! Each variant lives in its own module and is registered under the id in
//! [`builtin_configs`], together with its default priority.

pub mod analogical_reasoning;
pub mod chain_of_thought;
pub mod constitutional_ai;
pub mod emotional_appeal;
pub mod few_shot;
pub mod role_play;
pub mod step_by_step;
pub mod structured_output;
pub mod tree_of_thoughts;
pub mod zero_shot;

use std::sync::Arc;

use super::{Technique, TechniqueConfig, TechniqueContext, TechniqueRegistry};
use crate::techniques::template::with_article;

pub use analogical_reasoning::AnalogicalReasoning;
pub use chain_of_thought::ChainOfThought;
pub use constitutional_ai::ConstitutionalAi;
pub use emotional_appeal::EmotionalAppeal;
pub use few_shot::FewShot;
pub use role_play::RolePlay;
pub use step_by_step::StepByStep;
pub use structured_output::StructuredOutput;
pub use tree_of_thoughts::TreeOfThoughts;
pub use zero_shot::ZeroShot;

/// Default descriptors of the built-in techniques.
pub fn builtin_configs() -> Vec<TechniqueConfig> {
    vec![
        TechniqueConfig::new(role_play::ID).with_priority(100),
        TechniqueConfig::new(few_shot::ID)
            .with_priority(90)
            .with_parameter("max_examples", 2)
            .with_parameter("max_input_chars", 4000),
        TechniqueConfig::new(chain_of_thought::ID).with_priority(80),
        TechniqueConfig::new(step_by_step::ID)
            .with_priority(75)
            .with_parameter("max_steps", 5),
        TechniqueConfig::new(tree_of_thoughts::ID)
            .with_priority(70)
            .with_parameter("branches", 3),
        TechniqueConfig::new(analogical_reasoning::ID).with_priority(60),
        TechniqueConfig::new(structured_output::ID)
            .with_priority(50)
            .with_parameter("format", "markdown")
            .with_parameter("max_input_chars", 8000),
        TechniqueConfig::new(constitutional_ai::ID).with_priority(40),
        TechniqueConfig::new(emotional_appeal::ID)
            .with_priority(30)
            .with_parameter("intensity", "medium"),
        TechniqueConfig::new(zero_shot::ID).with_priority(10),
    ]
}

/// Register every built-in constructor and configure an instance of each
/// with its default descriptor.
pub fn register_builtin_techniques(registry: &mut TechniqueRegistry) {
    registry.register(role_play::ID, |c| Arc::new(RolePlay::new(c)) as Arc<dyn Technique>);
    registry.register(few_shot::ID, |c| Arc::new(FewShot::new(c)) as Arc<dyn Technique>);
    registry.register(chain_of_thought::ID, |c| {
        Arc::new(ChainOfThought::new(c)) as Arc<dyn Technique>
    });
    registry.register(step_by_step::ID, |c| Arc::new(StepByStep::new(c)) as Arc<dyn Technique>);
    registry.register(tree_of_thoughts::ID, |c| {
        Arc::new(TreeOfThoughts::new(c)) as Arc<dyn Technique>
    });
    registry.register(analogical_reasoning::ID, |c| {
        Arc::new(AnalogicalReasoning::new(c)) as Arc<dyn Technique>
    });
    registry.register(structured_output::ID, |c| {
        Arc::new(StructuredOutput::new(c)) as Arc<dyn Technique>
    });
    registry.register(constitutional_ai::ID, |c| {
        Arc::new(ConstitutionalAi::new(c)) as Arc<dyn Technique>
    });
    registry.register(emotional_appeal::ID, |c| {
        Arc::new(EmotionalAppeal::new(c)) as Arc<dyn Technique>
    });
    registry.register(zero_shot::ID, |c| Arc::new(ZeroShot::new(c)) as Arc<dyn Technique>);

    for config in builtin_configs() {
        let id = config.id.clone();
        if let Err(e) = registry.create_instance(&id, config) {
            log::error!("Failed to configure built-in technique '{}': {}", id, e);
        }
    }
}

/// The role published by an earlier role-framing step, with its article.
pub(crate) fn published_role(context: &TechniqueContext) -> Option<String> {
    context
        .get_str("role")
        .filter(|r| !r.trim().is_empty())
        .map(with_article)
}
