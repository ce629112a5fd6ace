//! # prompt-enhancer
//!
//! Enhances text prompts by chaining independent techniques (role framing,
//! exemplar injection, step decomposition, ...) in priority order.
//!
//! Each technique sees what earlier ones published, a failing technique is
//! recorded and skipped without aborting the chain, and the finished text
//! is scored with heuristic quality metrics.
//!
//! ```no_run
//! use prompt_enhancer::{GenerationRequest, PromptEngine};
//!
//! # async fn run() -> Result<(), prompt_enhancer::EngineError> {
//! let engine = PromptEngine::with_builtins();
//! let result = engine
//!     .generate(GenerationRequest::new("Debug this code").with_techniques(["chain_of_thought"]))
//!     .await?;
//! println!("{}", result.enhanced_text);
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod config;
pub mod engine;
pub mod errors;
pub mod generation;
pub mod intent;
pub mod metrics;
pub mod recommender;
pub mod techniques;
pub mod text;
pub mod tracking;
pub mod validation;

pub use chain::{ChainContext, ChainSummary, StepError, StepOutcome, StepRecord};
pub use config::{EngineConfig, TechniqueOverride};
pub use engine::PromptEngine;
pub use errors::{EngineError, TechniqueError};
pub use generation::{GenerationRequest, GenerationResult};
pub use intent::{Complexity, Intent};
pub use metrics::{MetricsCalculator, QualityMetrics};
pub use recommender::{StaticRecommender, TechniqueRecommender};
pub use techniques::{
    Technique, TechniqueBase, TechniqueConfig, TechniqueContext, TechniqueRegistry,
};
pub use tracking::{EffectivenessTracker, InMemoryTracker};
pub use validation::{PromptValidator, ValidationReport};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
