//! Technique contract, descriptors, and the registry.
//!
//! A technique is a named, stateless text transform. The engine drives
//! every technique through the same [`Technique`] trait and never assumes
//! another one ran, except through values published in the accumulated
//! context.

pub mod builtin;
pub mod context;
pub mod registry;
pub mod template;

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{merge_parameters, TechniqueOverride};
use crate::errors::TechniqueError;
use crate::tracking::EffectivenessTracker;

pub use context::{ChainInfo, ContextMap, RequestContext, TechniqueContext};
pub use registry::TechniqueRegistry;

fn default_enabled() -> bool {
    true
}

/// Immutable descriptor of a configured technique instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechniqueConfig {
    /// Unique identifier.
    pub id: String,
    /// Higher priorities are applied first.
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Technique-specific parameters.
    #[serde(default)]
    pub parameters: ContextMap,
}

impl TechniqueConfig {
    /// An enabled descriptor with priority 0 and no parameters.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            priority: 0,
            enabled: true,
            parameters: ContextMap::new(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }

    pub fn param_usize(&self, key: &str) -> Option<usize> {
        self.parameters
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|v| usize::try_from(v).ok())
    }

    /// A string-list parameter. Non-string entries are skipped.
    pub fn param_string_list(&self, key: &str) -> Option<Vec<String>> {
        self.parameters.get(key).and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
    }

    /// Apply a YAML override on top of this descriptor.
    pub fn with_override(&self, o: &TechniqueOverride) -> Self {
        Self {
            id: self.id.clone(),
            priority: o.priority.unwrap_or(self.priority),
            enabled: o.enabled.unwrap_or(self.enabled),
            parameters: merge_parameters(&self.parameters, &o.parameters),
        }
    }
}

/// State every technique instance carries: its descriptor and the
/// optional, write-once effectiveness tracker.
pub struct TechniqueBase {
    config: TechniqueConfig,
    tracker: OnceCell<Arc<dyn EffectivenessTracker>>,
}

impl TechniqueBase {
    pub fn new(config: TechniqueConfig) -> Self {
        Self {
            config,
            tracker: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &TechniqueConfig {
        &self.config
    }

    pub fn tracker(&self) -> Option<&Arc<dyn EffectivenessTracker>> {
        self.tracker.get()
    }

    /// Attach a tracker. Returns `false` if one was already attached.
    pub fn attach_tracker(&self, tracker: Arc<dyn EffectivenessTracker>) -> bool {
        let attached = self.tracker.set(tracker).is_ok();
        if !attached {
            log::debug!(
                "Technique '{}' already has an effectiveness tracker",
                self.config.id
            );
        }
        attached
    }
}

impl fmt::Debug for TechniqueBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TechniqueBase")
            .field("config", &self.config)
            .field("tracker_attached", &self.tracker.get().is_some())
            .finish()
    }
}

/// The uniform transform contract.
///
/// Implementations must be safe to call concurrently from different
/// requests. Configuration is read-only after construction and `apply`
/// must depend only on its arguments and the instance's own templates.
pub trait Technique: Send + Sync {
    /// Descriptor and tracker storage.
    fn base(&self) -> &TechniqueBase;

    /// One-line human description.
    fn description(&self) -> &'static str;

    /// Transform `text`.
    fn apply(&self, text: &str, context: &TechniqueContext) -> Result<String, TechniqueError>;

    /// Cheap precondition check. Must not panic.
    fn validate_input(&self, text: &str, _context: &TechniqueContext) -> bool {
        !text.trim().is_empty()
    }

    /// Observability data about one application. Empty means nothing to
    /// record.
    fn describe_metadata(
        &self,
        _input: &str,
        _output: &str,
        _context: &TechniqueContext,
    ) -> ContextMap {
        ContextMap::new()
    }

    /// Values later steps should see.
    fn extract_context_updates(
        &self,
        _input: &str,
        _output: &str,
        _context: &TechniqueContext,
    ) -> ContextMap {
        ContextMap::new()
    }

    fn config(&self) -> &TechniqueConfig {
        self.base().config()
    }

    fn id(&self) -> &str {
        &self.base().config().id
    }

    fn priority(&self) -> i32 {
        self.base().config().priority
    }

    fn is_enabled(&self) -> bool {
        self.base().config().enabled
    }

    fn tracker(&self) -> Option<&Arc<dyn EffectivenessTracker>> {
        self.base().tracker()
    }

    fn attach_tracker(&self, tracker: Arc<dyn EffectivenessTracker>) -> bool {
        self.base().attach_tracker(tracker)
    }
}

impl fmt::Debug for dyn Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Technique")
            .field("id", &self.id())
            .field("priority", &self.priority())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
