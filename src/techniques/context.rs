//! Context handed to techniques.
//!
//! Well-known request fields are typed in [`RequestContext`]. Values that
//! techniques publish for each other live in an open string-keyed map, and
//! [`ChainInfo`] describes what already ran in the current chain.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::intent::{Complexity, Intent};

/// Open-ended string-keyed values.
pub type ContextMap = HashMap<String, Value>;

/// Request-derived context shared by every step of a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    pub intent: Intent,
    pub complexity: Complexity,
    pub target_model: String,
    pub temperature: Option<f64>,
    /// Caller-supplied values.
    #[serde(default)]
    pub extra: ContextMap,
}

impl RequestContext {
    pub fn new(intent: Intent, complexity: Complexity, target_model: impl Into<String>) -> Self {
        Self {
            intent,
            complexity,
            target_model: target_model.into(),
            temperature: None,
            extra: ContextMap::new(),
        }
    }

    /// Flatten into a string-keyed map. Typed fields win over `extra`.
    pub fn to_map(&self) -> ContextMap {
        let mut map = self.extra.clone();
        map.insert("intent".into(), Value::from(self.intent.as_str()));
        map.insert("complexity".into(), Value::from(self.complexity.as_str()));
        map.insert("target_model".into(), Value::from(self.target_model.clone()));
        if let Some(t) = self.temperature {
            map.insert("temperature".into(), json!(t));
        }
        map
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new(Intent::General, Complexity::Simple, "gpt-4")
    }
}

/// Position of the current step and what ran before it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainInfo {
    /// Identifiers applied so far, in order.
    pub previous_techniques: Vec<String>,
    /// Output of each applied technique.
    pub previous_outputs: HashMap<String, String>,
    /// Zero-based index of the current step.
    pub position: usize,
    /// Number of steps in the chain.
    pub total_steps: usize,
}

/// The per-step view a technique receives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TechniqueContext {
    pub request: RequestContext,
    /// Values published by earlier steps.
    pub accumulated: ContextMap,
    pub chain_info: ChainInfo,
}

impl TechniqueContext {
    /// A context for a single standalone step.
    pub fn new(request: RequestContext) -> Self {
        Self {
            request,
            accumulated: ContextMap::new(),
            chain_info: ChainInfo {
                total_steps: 1,
                ..ChainInfo::default()
            },
        }
    }

    /// Look a key up in the accumulated context, then in caller extras.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.accumulated
            .get(key)
            .or_else(|| self.request.extra.get(key))
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(Value::as_u64)
    }

    /// Whether `technique_id` already ran in this chain.
    pub fn has_applied(&self, technique_id: &str) -> bool {
        self.chain_info
            .previous_techniques
            .iter()
            .any(|t| t == technique_id)
    }

    /// Base context merged with accumulated values plus a `chain_info`
    /// entry.
    pub fn merged(&self) -> ContextMap {
        let mut map = self.request.to_map();
        for (key, value) in &self.accumulated {
            map.insert(key.clone(), value.clone());
        }
        map.insert(
            "chain_info".into(),
            json!({
                "previous_techniques": self.chain_info.previous_techniques,
                "previous_outputs": self.chain_info.previous_outputs,
                "position": self.chain_info.position,
                "total_steps": self.chain_info.total_steps,
            }),
        );
        map
    }
}
