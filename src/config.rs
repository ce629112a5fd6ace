//! Engine configuration and technique configuration loading.
//!
//! [`EngineConfig`] carries the validator limits and chain defaults and can be
//! read from `ENHANCER_*` environment variables. Technique overrides are
//! loaded from YAML files holding either a single `technique:` entry or a
//! `techniques:` list.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The configuration is structurally valid but semantically wrong.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for [`crate::engine::PromptEngine`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum prompt length in characters.
    pub max_prompt_length: usize,
    /// Minimum prompt length in characters.
    pub min_prompt_length: usize,
    /// Requesting more techniques than this produces a warning.
    pub max_techniques: usize,
    /// Bound on the recommender call, in milliseconds.
    pub recommender_timeout_ms: u64,
    /// Technique used when no recommendation is available.
    pub default_technique: String,
    /// Appended to output cut by `max_length`.
    pub truncation_marker: String,
    /// Ambiguous-pronoun ratio above which the validator warns.
    pub ambiguity_threshold: f64,
    /// Average sentence length (in words) above which the validator warns.
    pub max_avg_sentence_words: f64,
    /// Target model used when a request does not name one.
    pub target_model: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_prompt_length: 10_000,
            min_prompt_length: 1,
            max_techniques: 5,
            recommender_timeout_ms: 2_000,
            default_technique: "zero_shot".into(),
            truncation_marker: "...".into(),
            ambiguity_threshold: 0.1,
            max_avg_sentence_words: 30.0,
            target_model: "gpt-4".into(),
        }
    }
}

impl EngineConfig {
    /// Load from environment variables, keeping defaults for anything
    /// missing or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_prompt_length: env_parse("ENHANCER_MAX_PROMPT_LENGTH")
                .unwrap_or(defaults.max_prompt_length),
            max_techniques: env_parse("ENHANCER_MAX_TECHNIQUES")
                .unwrap_or(defaults.max_techniques),
            recommender_timeout_ms: env_parse("ENHANCER_RECOMMENDER_TIMEOUT_MS")
                .unwrap_or(defaults.recommender_timeout_ms),
            default_technique: std::env::var("ENHANCER_DEFAULT_TECHNIQUE")
                .unwrap_or(defaults.default_technique),
            target_model: std::env::var("ENHANCER_TARGET_MODEL")
                .unwrap_or(defaults.target_model),
            ..defaults
        }
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_prompt_length < self.min_prompt_length {
            return Err(ConfigError::Invalid(format!(
                "max_prompt_length ({}) is below min_prompt_length ({})",
                self.max_prompt_length, self.min_prompt_length
            )));
        }
        if self.default_technique.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "default_technique must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("Ignoring unparsable value for {}: '{}'", key, raw);
            None
        }
    }
}

/// A partial technique configuration read from YAML.
///
/// Unset fields keep the value of the instance being overridden.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechniqueOverride {
    /// Technique identifier.
    pub id: String,
    /// New priority.
    #[serde(default)]
    pub priority: Option<i32>,
    /// New enabled flag.
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Parameters merged over the existing ones.
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct SingleOverride {
    technique: TechniqueOverride,
}

#[derive(Deserialize)]
struct OverrideList {
    techniques: Vec<TechniqueOverride>,
}

/// Parse technique overrides from a YAML document.
pub fn parse_technique_overrides(content: &str) -> Result<Vec<TechniqueOverride>, ConfigError> {
    let overrides = match serde_yaml::from_str::<SingleOverride>(content) {
        Ok(single) => vec![single.technique],
        Err(_) => serde_yaml::from_str::<OverrideList>(content)?.techniques,
    };

    if let Some(blank) = overrides.iter().find(|o| o.id.trim().is_empty()) {
        return Err(ConfigError::Invalid(format!(
            "technique override without id: {:?}",
            blank
        )));
    }
    Ok(overrides)
}

/// Load technique overrides from a YAML file.
pub fn load_technique_overrides(path: &Path) -> Result<Vec<TechniqueOverride>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let overrides = parse_technique_overrides(&content)?;
    log::info!(
        "Loaded {} technique override(s) from {}",
        overrides.len(),
        path.display()
    );
    Ok(overrides)
}

/// Merge `overrides` on top of `defaults`.
pub fn merge_parameters(
    defaults: &HashMap<String, Value>,
    overrides: &HashMap<String, Value>,
) -> HashMap<String, Value> {
    let mut result = defaults.clone();
    for (key, value) in overrides {
        result.insert(key.clone(), value.clone());
    }
    result
}
