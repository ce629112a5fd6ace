//! Technique registry: constructors keyed by identifier plus the
//! configured instances built from them.
//!
//! Constructors are registered once at startup. Instances live behind a
//! read-mostly lock so they can be swapped at runtime (e.g. when YAML
//! overrides are reloaded) while requests keep reading concurrently.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Technique, TechniqueConfig};
use crate::config::TechniqueOverride;
use crate::errors::TechniqueError;
use crate::tracking::EffectivenessTracker;

/// Builds a configured technique instance.
pub type TechniqueConstructor = Arc<dyn Fn(TechniqueConfig) -> Arc<dyn Technique> + Send + Sync>;

/// Registry of technique variants and their configured instances.
#[derive(Default)]
pub struct TechniqueRegistry {
    constructors: HashMap<String, TechniqueConstructor>,
    instances: RwLock<HashMap<String, Arc<dyn Technique>>>,
}

impl TechniqueRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in technique, instantiated with its
    /// default configuration.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        super::builtin::register_builtin_techniques(&mut registry);
        registry
    }

    /// Register a constructor. The last registration for an id wins.
    pub fn register<F>(&mut self, id: impl Into<String>, constructor: F)
    where
        F: Fn(TechniqueConfig) -> Arc<dyn Technique> + Send + Sync + 'static,
    {
        let id = id.into();
        if self.constructors.contains_key(&id) {
            log::warn!("Technique '{}' is already registered; overwriting", id);
        }
        self.constructors.insert(id, Arc::new(constructor));
    }

    /// Whether a constructor exists for `id`.
    pub fn is_registered(&self, id: &str) -> bool {
        self.constructors.contains_key(id)
    }

    /// Build an instance of `id` from `config` and make it the configured
    /// instance for that id.
    pub fn create_instance(
        &self,
        id: &str,
        mut config: TechniqueConfig,
    ) -> Result<Arc<dyn Technique>, TechniqueError> {
        let constructor = self
            .constructors
            .get(id)
            .ok_or_else(|| TechniqueError::UnknownTechnique(id.to_string()))?;

        config.id = id.to_string();
        let instance = constructor(config);
        log::debug!(
            "Configured technique '{}' (priority {}, enabled {})",
            id,
            instance.priority(),
            instance.is_enabled()
        );
        self.instances.write().insert(id.to_string(), Arc::clone(&instance));
        Ok(instance)
    }

    /// The configured instance for `id`.
    pub fn get_instance(&self, id: &str) -> Option<Arc<dyn Technique>> {
        self.instances.read().get(id).cloned()
    }

    /// Whether a configured instance exists for `id`.
    pub fn has_instance(&self, id: &str) -> bool {
        self.instances.read().contains_key(id)
    }

    /// Priority of the configured instance, 0 when there is none.
    pub fn priority_of(&self, id: &str) -> i32 {
        self.instances
            .read()
            .get(id)
            .map_or(0, |instance| instance.priority())
    }

    /// Every registered identifier, sorted.
    pub fn list_available(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.constructors.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Identifiers of enabled instances, highest priority first.
    pub fn list_enabled(&self) -> Vec<String> {
        let instances = self.instances.read();
        let mut enabled: Vec<(&String, i32)> = instances
            .iter()
            .filter(|(_, t)| t.is_enabled())
            .map(|(id, t)| (id, t.priority()))
            .collect();
        enabled.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        enabled.into_iter().map(|(id, _)| id.clone()).collect()
    }

    /// Rebuild instances with overrides applied on top of their current
    /// configuration. Returns the number of instances rebuilt.
    pub fn apply_overrides(&self, overrides: &[TechniqueOverride]) -> Result<usize, TechniqueError> {
        for o in overrides {
            if !self.is_registered(&o.id) {
                return Err(TechniqueError::UnknownTechnique(o.id.clone()));
            }
        }

        for o in overrides {
            let previous = self.get_instance(&o.id);
            let current = previous
                .as_ref()
                .map(|t| t.config().clone())
                .unwrap_or_else(|| TechniqueConfig::new(o.id.clone()));
            let rebuilt = self.create_instance(&o.id, current.with_override(o))?;
            // the tracker belongs to the id, not to one configuration
            if let Some(tracker) = previous.as_ref().and_then(|t| t.tracker()) {
                rebuilt.attach_tracker(Arc::clone(tracker));
            }
        }
        Ok(overrides.len())
    }

    /// Attach `tracker` to every configured instance that has none yet.
    pub fn attach_tracker(&self, tracker: Arc<dyn EffectivenessTracker>) -> usize {
        self.instances
            .read()
            .values()
            .filter(|t| t.attach_tracker(Arc::clone(&tracker)))
            .count()
    }
}

impl fmt::Debug for TechniqueRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TechniqueRegistry")
            .field("registered", &self.list_available())
            .field("enabled", &self.list_enabled())
            .finish()
    }
}
