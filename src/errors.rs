//! Error types for the enhancement engine.
//!
//! Two tiers exist. [`EngineError`] is fatal to a `generate` call and is
//! only raised before chaining starts. [`TechniqueError`] is raised by a
//! single step and is always absorbed into the chain record.

use thiserror::Error;

use crate::config::ConfigError;

/// Request-level errors surfaced by [`crate::engine::PromptEngine::generate`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// The validator rejected the request; no technique was invoked.
    #[error("Invalid request: {}", errors.join("; "))]
    InvalidRequest { errors: Vec<String> },

    /// A technique identifier was never registered.
    #[error("Unknown technique: {0}")]
    UnknownTechnique(String),

    /// Engine or technique configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Whether this error came from request validation.
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, Self::InvalidRequest { .. })
    }
}

/// Step-level errors raised by a single technique.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TechniqueError {
    /// No configured instance exists for the identifier.
    #[error("Unknown technique: {0}")]
    UnknownTechnique(String),

    /// Template rendering failed.
    #[error("Template error: {0}")]
    Template(String),

    /// The technique cannot work with the given input or parameters.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The technique failed while transforming the text.
    #[error("Technique '{technique}' failed: {message}")]
    Failed { technique: String, message: String },
}

impl TechniqueError {
    /// Shorthand for [`TechniqueError::Failed`].
    pub fn failed(technique: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            technique: technique.into(),
            message: message.into(),
        }
    }
}

impl From<tera::Error> for TechniqueError {
    fn from(err: tera::Error) -> Self {
        // tera nests the useful message in the source chain
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(inner) = source {
            message = format!("{}: {}", message, inner);
            source = inner.source();
        }
        Self::Template(message)
    }
}
