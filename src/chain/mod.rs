//! Per-request chain state.
//!
//! A [`ChainContext`] is created for one `generate` call, owned by the
//! engine for the duration of that call, and dropped once the result is
//! assembled. Every step ends in exactly one [`StepOutcome`], recorded in
//! order.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::techniques::{ChainInfo, ContextMap, RequestContext, TechniqueContext};

/// How a single step resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Applied,
    SkippedDisabled,
    SkippedValidationFailed,
    Failed,
}

impl StepOutcome {
    /// Short label used in warnings and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::SkippedDisabled => "skipped: disabled",
            Self::SkippedValidationFailed => "skipped: validation_failed",
            Self::Failed => "failed",
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Self::SkippedDisabled | Self::SkippedValidationFailed)
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A failure recorded for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepError {
    pub technique_id: String,
    pub message: String,
    /// Zero-based position of the step in the chain.
    pub position: usize,
}

/// One entry of the ordered step log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub technique_id: String,
    pub position: usize,
    pub outcome: StepOutcome,
    pub duration_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Counts and timings of a finished chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainSummary {
    pub total_steps: usize,
    pub applied_count: usize,
    pub skipped_count: usize,
    pub failed_count: usize,
    pub total_duration_ms: f64,
    pub steps: Vec<StepRecord>,
}

/// Mutable state threaded through one chain.
///
/// `current_text` equals `original_text` until a step applies, and from
/// then on equals the output of the last applied step.
#[derive(Debug, Clone)]
pub struct ChainContext {
    original_text: String,
    current_text: String,
    applied_techniques: Vec<String>,
    step_outputs: HashMap<String, String>,
    step_metadata: HashMap<String, ContextMap>,
    accumulated_context: ContextMap,
    errors: Vec<StepError>,
    warnings: Vec<String>,
    timings: HashMap<String, Duration>,
    steps: Vec<StepRecord>,
    total_steps: usize,
}

impl ChainContext {
    /// Start a chain over `original_text` with `total_steps` planned steps.
    pub fn new(original_text: impl Into<String>, total_steps: usize) -> Self {
        let original_text = original_text.into();
        Self {
            current_text: original_text.clone(),
            original_text,
            applied_techniques: Vec::new(),
            step_outputs: HashMap::new(),
            step_metadata: HashMap::new(),
            accumulated_context: ContextMap::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            timings: HashMap::new(),
            steps: Vec::with_capacity(total_steps),
            total_steps,
        }
    }

    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn current_text(&self) -> &str {
        &self.current_text
    }

    pub fn applied_techniques(&self) -> &[String] {
        &self.applied_techniques
    }

    pub fn step_outputs(&self) -> &HashMap<String, String> {
        &self.step_outputs
    }

    pub fn step_metadata(&self) -> &HashMap<String, ContextMap> {
        &self.step_metadata
    }

    pub fn accumulated_context(&self) -> &ContextMap {
        &self.accumulated_context
    }

    pub fn errors(&self) -> &[StepError] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn timings(&self) -> &HashMap<String, Duration> {
        &self.timings
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// The view handed to the technique at `position`: the request
    /// context, everything accumulated so far, and what already ran.
    pub fn step_view(&self, request: &RequestContext, position: usize) -> TechniqueContext {
        let previous_outputs = self
            .applied_techniques
            .iter()
            .filter_map(|id| {
                self.step_outputs
                    .get(id)
                    .map(|out| (id.clone(), out.clone()))
            })
            .collect();

        TechniqueContext {
            request: request.clone(),
            accumulated: self.accumulated_context.clone(),
            chain_info: ChainInfo {
                previous_techniques: self.applied_techniques.clone(),
                previous_outputs,
                position,
                total_steps: self.total_steps,
            },
        }
    }

    /// Record a successful step and make its output the current text.
    pub fn record_applied(
        &mut self,
        technique_id: &str,
        position: usize,
        output: String,
        metadata: ContextMap,
        context_updates: ContextMap,
        elapsed: Duration,
    ) {
        self.current_text = output.clone();
        self.step_outputs.insert(technique_id.to_string(), output);
        if !metadata.is_empty() {
            self.step_metadata.insert(technique_id.to_string(), metadata);
        }
        // append/overwrite only
        self.accumulated_context.extend(context_updates);
        self.timings.insert(technique_id.to_string(), elapsed);
        self.applied_techniques.push(technique_id.to_string());
        self.steps.push(StepRecord {
            technique_id: technique_id.to_string(),
            position,
            outcome: StepOutcome::Applied,
            duration_ms: duration_ms(elapsed),
            error: None,
        });
    }

    /// Record a skipped step. `current_text` is untouched.
    pub fn record_skipped(&mut self, technique_id: &str, position: usize, outcome: StepOutcome) {
        debug_assert!(outcome.is_skip());
        self.warnings
            .push(format!("Technique '{}' {}", technique_id, outcome.label()));
        self.steps.push(StepRecord {
            technique_id: technique_id.to_string(),
            position,
            outcome,
            duration_ms: 0.0,
            error: None,
        });
    }

    /// Record a failed step. `current_text` is untouched.
    pub fn record_failed(
        &mut self,
        technique_id: &str,
        position: usize,
        message: String,
        elapsed: Duration,
    ) {
        self.warnings.push(format!(
            "Technique '{}' skipped due to error: {}",
            technique_id, message
        ));
        self.timings.insert(technique_id.to_string(), elapsed);
        self.errors.push(StepError {
            technique_id: technique_id.to_string(),
            message: message.clone(),
            position,
        });
        self.steps.push(StepRecord {
            technique_id: technique_id.to_string(),
            position,
            outcome: StepOutcome::Failed,
            duration_ms: duration_ms(elapsed),
            error: Some(message),
        });
    }

    /// Counts and timings of the steps recorded so far.
    pub fn summary(&self) -> ChainSummary {
        let count = |outcome: fn(&StepOutcome) -> bool| {
            self.steps.iter().filter(|s| outcome(&s.outcome)).count()
        };
        ChainSummary {
            total_steps: self.total_steps,
            applied_count: count(|o| *o == StepOutcome::Applied),
            skipped_count: count(StepOutcome::is_skip),
            failed_count: count(|o| *o == StepOutcome::Failed),
            total_duration_ms: self.steps.iter().map(|s| s.duration_ms).sum(),
            steps: self.steps.clone(),
        }
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
