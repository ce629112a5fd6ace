//! The orchestration engine.
//!
//! [`PromptEngine::generate`] resolves which techniques to run, validates
//! the request, orders the techniques by priority, and threads the text
//! through them one at a time. Step failures are recorded and the chain
//! moves on; only validation can fail the request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use uuid::Uuid;

use crate::chain::{ChainContext, StepOutcome};
use crate::config::{EngineConfig, TechniqueOverride};
use crate::errors::{EngineError, TechniqueError};
use crate::generation::{GenerationRequest, GenerationResult};
use crate::intent::{infer_intent, Complexity, Intent};
use crate::metrics::MetricsCalculator;
use crate::recommender::{recommend_with_timeout, TechniqueRecommender};
use crate::techniques::{RequestContext, Technique, TechniqueRegistry};
use crate::text;
use crate::tracking::{EffectivenessTracker, TechniqueReport};
use crate::validation::{self, PromptValidator};

/// Applies technique chains to prompts.
///
/// Holds no per-request state; one engine can serve concurrent requests
/// behind an `Arc`.
#[derive(Debug)]
pub struct PromptEngine {
    registry: Arc<TechniqueRegistry>,
    recommender: Option<Arc<dyn TechniqueRecommender>>,
    tracker: Option<Arc<dyn EffectivenessTracker>>,
    validator: PromptValidator,
    metrics: MetricsCalculator,
    config: EngineConfig,
}

impl PromptEngine {
    /// Create an engine over `registry`, rejecting unusable configuration.
    pub fn new(registry: Arc<TechniqueRegistry>, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            registry,
            recommender: None,
            tracker: None,
            validator: PromptValidator::from_config(&config),
            metrics: MetricsCalculator::new(),
            config,
        })
    }

    /// An engine over the built-in techniques with default configuration.
    pub fn with_builtins() -> Self {
        let config = EngineConfig::default();
        Self {
            registry: Arc::new(TechniqueRegistry::with_builtins()),
            recommender: None,
            tracker: None,
            validator: PromptValidator::from_config(&config),
            metrics: MetricsCalculator::new(),
            config,
        }
    }

    pub fn with_recommender(mut self, recommender: Arc<dyn TechniqueRecommender>) -> Self {
        self.recommender = Some(recommender);
        self
    }

    /// Report step outcomes to `tracker` for instances without their own.
    pub fn with_tracker(mut self, tracker: Arc<dyn EffectivenessTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn registry(&self) -> &TechniqueRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Reconfigure technique instances from YAML overrides.
    pub fn apply_technique_overrides(
        &self,
        overrides: &[TechniqueOverride],
    ) -> Result<usize, EngineError> {
        self.registry.apply_overrides(overrides).map_err(|e| match e {
            TechniqueError::UnknownTechnique(id) => EngineError::UnknownTechnique(id),
            other => EngineError::Config(crate::config::ConfigError::Invalid(other.to_string())),
        })
    }

    /// Enhance `request.text`.
    ///
    /// Fails only with [`EngineError::InvalidRequest`], before any technique
    /// runs.
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult, EngineError> {
        let mut warnings = Vec::new();

        let intent = request
            .declared_intent()
            .unwrap_or_else(|| infer_intent(&request.text));
        let complexity_score = validation::complexity_score(&request.text);
        let complexity = request
            .declared_complexity()
            .unwrap_or_else(|| Complexity::from_score(complexity_score));

        let techniques = self
            .resolve_techniques(&request, intent, complexity, &mut warnings)
            .await;

        let report = self.validator.validate_scored(
            &request.text,
            &techniques,
            &self.registry,
            complexity_score,
        );
        if !report.is_valid {
            log::info!("Rejecting request: {}", report.errors.join("; "));
            return Err(EngineError::InvalidRequest {
                errors: report.errors,
            });
        }

        let target_model = request
            .target_model
            .clone()
            .unwrap_or_else(|| self.config.target_model.clone());
        let request_context = RequestContext {
            intent,
            complexity,
            target_model: target_model.clone(),
            temperature: request.temperature,
            extra: request.context.clone(),
        };

        let ordered = self.order_techniques(techniques);
        log::debug!("Technique order: {:?}", ordered);

        let mut chain = ChainContext::new(request.text.clone(), ordered.len());
        for (position, id) in ordered.iter().enumerate() {
            self.run_step(&mut chain, &request_context, id, position);
        }

        let enhanced_text = self.post_process(&chain, request.max_length, &mut warnings);

        let metrics = self
            .metrics
            .calculate(&request.text, &enhanced_text, chain.applied_techniques());
        if !metrics.available {
            warnings.push("Quality metrics unavailable".to_string());
        }

        warnings.extend(report.warnings.iter().cloned());
        warnings.extend(chain.warnings().iter().cloned());

        let summary = chain.summary();
        let result = GenerationResult {
            request_id: Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            original_text: request.text,
            estimated_tokens: text::estimate_tokens(&enhanced_text),
            enhanced_text,
            target_model,
            techniques_applied: chain.applied_techniques().to_vec(),
            step_metadata: chain.step_metadata().clone(),
            errors: chain.errors().to_vec(),
            chain: summary,
            metrics,
            validation: report,
            warnings,
        };

        log::info!(
            "Generated {}: {}/{} techniques applied, {} failed",
            result.request_id,
            result.chain.applied_count,
            result.chain.total_steps,
            result.chain.failed_count
        );
        Ok(result)
    }

    /// Pick the techniques for a request.
    ///
    /// An explicit list is used as given, minus registered techniques that
    /// have no configured instance. Unregistered ids are kept so the
    /// validator rejects them. Without a list the recommender is asked; any
    /// failure falls back to the default technique.
    async fn resolve_techniques(
        &self,
        request: &GenerationRequest,
        intent: Intent,
        complexity: Complexity,
        warnings: &mut Vec<String>,
    ) -> Vec<String> {
        if let Some(requested) = &request.techniques {
            return requested
                .iter()
                .filter(|id| {
                    let usable = !self.registry.is_registered(id) || self.registry.has_instance(id);
                    if !usable {
                        log::warn!("Technique '{}' has no configured instance", id);
                        warnings.push(format!(
                            "Technique '{}' is not configured and was ignored",
                            id
                        ));
                    }
                    usable
                })
                .cloned()
                .collect();
        }

        let Some(recommender) = &self.recommender else {
            return self.fallback(warnings);
        };

        match recommend_with_timeout(
            recommender.as_ref(),
            &request.text,
            intent,
            complexity,
            self.config.recommender_timeout_ms,
        )
        .await
        {
            Ok(ids) => {
                let usable: Vec<String> = ids
                    .into_iter()
                    .filter(|id| self.registry.has_instance(id))
                    .collect();
                if usable.is_empty() {
                    log::warn!("Recommender returned no usable techniques; using default");
                    warnings.push("No techniques recommended; using default technique".into());
                    return self.fallback(warnings);
                }
                log::debug!("Recommended techniques for {}: {:?}", intent, usable);
                usable
            }
            Err(e) => {
                log::warn!("Recommender failed ({}); using default technique", e);
                warnings.push(format!("Technique recommendation failed: {}", e));
                self.fallback(warnings)
            }
        }
    }

    fn fallback(&self, warnings: &mut Vec<String>) -> Vec<String> {
        let default = &self.config.default_technique;
        if self.registry.has_instance(default) {
            vec![default.clone()]
        } else {
            log::warn!("Default technique '{}' is not configured", default);
            warnings.push(format!(
                "Default technique '{}' is not configured; no techniques applied",
                default
            ));
            Vec::new()
        }
    }

    /// Sort by descending priority. The sort is stable, so equal
    /// priorities keep the caller's order.
    pub fn order_techniques(&self, techniques: Vec<String>) -> Vec<String> {
        let mut keyed: Vec<(i32, String)> = techniques
            .into_iter()
            .map(|id| (self.registry.priority_of(&id), id))
            .collect();
        keyed.sort_by(|a, b| b.0.cmp(&a.0));
        keyed.into_iter().map(|(_, id)| id).collect()
    }

    fn run_step(
        &self,
        chain: &mut ChainContext,
        request: &RequestContext,
        id: &str,
        position: usize,
    ) {
        let Some(technique) = self.registry.get_instance(id) else {
            let err = TechniqueError::UnknownTechnique(id.to_string());
            log::warn!("Step {} failed: {}", position, err);
            chain.record_failed(id, position, err.to_string(), Duration::ZERO);
            return;
        };

        let view = chain.step_view(request, position);

        if !technique.is_enabled() {
            log::warn!("Skipping disabled technique '{}'", id);
            chain.record_skipped(id, position, StepOutcome::SkippedDisabled);
            return;
        }

        let input = chain.current_text().to_string();
        if !technique.validate_input(&input, &view) {
            log::warn!("Technique '{}' rejected its input", id);
            chain.record_skipped(id, position, StepOutcome::SkippedValidationFailed);
            return;
        }

        let started = Instant::now();
        let result = technique.apply(&input, &view);
        let elapsed = started.elapsed();

        match result {
            Ok(output) => {
                let metadata = technique.describe_metadata(&input, &output, &view);
                let updates = technique.extract_context_updates(&input, &output, &view);
                self.report(technique.as_ref(), elapsed, token_delta(&input, &output), true);
                log::debug!("Applied technique '{}' in {:?}", id, elapsed);
                chain.record_applied(id, position, output, metadata, updates, elapsed);
            }
            Err(e) => {
                self.report(technique.as_ref(), elapsed, 0, false);
                log::warn!("Technique '{}' failed: {}", id, e);
                chain.record_failed(id, position, e.to_string(), elapsed);
            }
        }
    }

    fn report(&self, technique: &dyn Technique, duration: Duration, token_delta: i64, success: bool) {
        let tracker = technique.tracker().or(self.tracker.as_ref());
        if let Some(tracker) = tracker {
            tracker.record(&TechniqueReport {
                technique_id: technique.id().to_string(),
                duration,
                token_delta,
                success,
            });
        }
    }

    fn post_process(
        &self,
        chain: &ChainContext,
        max_length: Option<usize>,
        warnings: &mut Vec<String>,
    ) -> String {
        let mut output = if chain.applied_techniques().is_empty() {
            chain.current_text().to_string()
        } else {
            text::collapse_whitespace(chain.current_text())
        };

        if let Some(max) = max_length {
            if output.chars().count() > max {
                output = text::truncate_at_word_boundary(&output, max, &self.config.truncation_marker);
                warnings.push(format!("Output truncated to {} characters", max));
            }
        }
        output
    }
}

fn token_delta(input: &str, output: &str) -> i64 {
    text::estimate_tokens(output) as i64 - text::estimate_tokens(input) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommender::{RecommenderError, StaticRecommender};
    use crate::techniques::{TechniqueBase, TechniqueConfig, TechniqueContext};
    use crate::tracking::InMemoryTracker;
    use async_trait::async_trait;

    struct Append {
        base: TechniqueBase,
        suffix: &'static str,
    }

    impl Technique for Append {
        fn base(&self) -> &TechniqueBase {
            &self.base
        }

        fn description(&self) -> &'static str {
            "appends a suffix"
        }

        fn apply(&self, text: &str, _context: &TechniqueContext) -> Result<String, TechniqueError> {
            Ok(format!("{} {}", text, self.suffix))
        }
    }

    struct Broken {
        base: TechniqueBase,
    }

    impl Technique for Broken {
        fn base(&self) -> &TechniqueBase {
            &self.base
        }

        fn description(&self) -> &'static str {
            "always fails"
        }

        fn apply(&self, _text: &str, _context: &TechniqueContext) -> Result<String, TechniqueError> {
            Err(TechniqueError::failed("broken", "boom"))
        }
    }

    fn registry() -> Arc<TechniqueRegistry> {
        let mut registry = TechniqueRegistry::new();
        registry.register("alpha", |c| {
            Arc::new(Append { base: TechniqueBase::new(c), suffix: "[alpha]" }) as Arc<dyn Technique>
        });
        registry.register("beta", |c| {
            Arc::new(Append { base: TechniqueBase::new(c), suffix: "[beta]" }) as Arc<dyn Technique>
        });
        registry.register("broken", |c| {
            Arc::new(Broken { base: TechniqueBase::new(c) }) as Arc<dyn Technique>
        });
        registry.register("zero_shot", |c| {
            Arc::new(Append { base: TechniqueBase::new(c), suffix: "[default]" }) as Arc<dyn Technique>
        });
        registry.register("unconfigured", |c| {
            Arc::new(Append { base: TechniqueBase::new(c), suffix: "[never]" }) as Arc<dyn Technique>
        });
        for (id, priority) in [("alpha", 10), ("beta", 20), ("broken", 15), ("zero_shot", 1)] {
            registry
                .create_instance(id, TechniqueConfig::new(id).with_priority(priority))
                .unwrap();
        }
        Arc::new(registry)
    }

    fn engine() -> PromptEngine {
        PromptEngine::new(registry(), EngineConfig::default()).unwrap()
    }

    struct Failing;

    #[async_trait]
    impl TechniqueRecommender for Failing {
        async fn recommend(
            &self,
            _text: &str,
            _intent: Intent,
            _complexity: Complexity,
        ) -> Result<Vec<String>, RecommenderError> {
            Err(RecommenderError::Unavailable("selector offline".into()))
        }
    }

    #[test]
    fn test_new_rejects_bad_config() {
        let config = EngineConfig {
            default_technique: " ".into(),
            ..EngineConfig::default()
        };
        let err = PromptEngine::new(registry(), config).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_order_is_priority_desc_and_stable() {
        let engine = engine();
        let ordered = engine.order_techniques(vec![
            "alpha".into(),
            "ghost".into(),
            "beta".into(),
            "other_ghost".into(),
        ]);
        assert_eq!(ordered, vec!["beta", "alpha", "ghost", "other_ghost"]);
    }

    #[tokio::test]
    async fn test_generate_applies_in_priority_order() {
        let result = engine()
            .generate(GenerationRequest::new("Fix it").with_techniques(["alpha", "beta"]))
            .await
            .unwrap();
        assert_eq!(result.enhanced_text, "Fix it [beta] [alpha]");
        assert_eq!(result.techniques_applied, vec!["beta", "alpha"]);
        assert_eq!(result.chain.applied_count, 2);
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let result = engine()
            .generate(GenerationRequest::new("Fix it").with_techniques(["alpha", "broken", "beta"]))
            .await
            .unwrap();
        assert_eq!(result.enhanced_text, "Fix it [beta] [alpha]");
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].technique_id, "broken");
        assert_eq!(result.errors[0].position, 1);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.starts_with("Technique 'broken' skipped due to error")));
    }

    #[tokio::test]
    async fn test_unknown_technique_is_invalid_request() {
        let err = engine()
            .generate(GenerationRequest::new("Fix it").with_techniques(["alpha", "ghost"]))
            .await
            .unwrap_err();
        match err {
            EngineError::InvalidRequest { errors } => {
                assert_eq!(errors, vec!["Unknown technique: ghost"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_technique_is_dropped_with_warning() {
        let result = engine()
            .generate(GenerationRequest::new("Fix it").with_techniques(["unconfigured", "alpha"]))
            .await
            .unwrap();
        assert_eq!(result.techniques_applied, vec!["alpha"]);
        assert_eq!(result.chain.total_steps, 1);
        assert!(result.warnings.iter().any(|w| w.contains("'unconfigured' is not configured")));
    }

    #[tokio::test]
    async fn test_empty_list_is_noop() {
        let text = "Keep   this  exactly\n\n\n as is ";
        let result = engine()
            .generate(GenerationRequest::new(text).with_techniques(Vec::<String>::new()))
            .await
            .unwrap();
        assert_eq!(result.enhanced_text, text);
        assert!(result.techniques_applied.is_empty());
        assert_eq!(result.chain.total_steps, 0);
    }

    #[tokio::test]
    async fn test_no_recommender_uses_default() {
        let result = engine().generate(GenerationRequest::new("Fix it")).await.unwrap();
        assert_eq!(result.techniques_applied, vec!["zero_shot"]);
        assert_eq!(result.enhanced_text, "Fix it [default]");
    }

    #[tokio::test]
    async fn test_recommender_failure_falls_back() {
        let engine = engine().with_recommender(Arc::new(Failing));
        let result = engine.generate(GenerationRequest::new("Fix it")).await.unwrap();
        assert_eq!(result.techniques_applied, vec!["zero_shot"]);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("selector offline")));
    }

    #[tokio::test]
    async fn test_recommendation_filtered_to_configured() {
        let recommender = StaticRecommender::new()
            .with_intent(Intent::General, vec!["beta".into(), "ghost".into()]);
        let engine = engine().with_recommender(Arc::new(recommender));
        let result = engine
            .generate(GenerationRequest::new("Plan my week").with_intent(Intent::General))
            .await
            .unwrap();
        assert_eq!(result.techniques_applied, vec!["beta"]);
    }

    #[tokio::test]
    async fn test_truncation() {
        let result = engine()
            .generate(
                GenerationRequest::new("one two three four five six")
                    .with_techniques(["alpha"])
                    .with_max_length(20),
            )
            .await
            .unwrap();
        assert!(result.enhanced_text.chars().count() <= 20);
        assert!(result.enhanced_text.ends_with("..."));
        assert!(result.warnings.iter().any(|w| w == "Output truncated to 20 characters"));
    }

    #[tokio::test]
    async fn test_tracker_receives_reports() {
        let tracker = Arc::new(InMemoryTracker::new());
        let engine = engine().with_tracker(tracker.clone());
        engine
            .generate(GenerationRequest::new("Fix it").with_techniques(["alpha", "broken"]))
            .await
            .unwrap();

        let alpha = tracker.stats_for("alpha").unwrap();
        assert_eq!(alpha.applications, 1);
        assert_eq!(alpha.successes, 1);
        let broken = tracker.stats_for("broken").unwrap();
        assert_eq!(broken.successes, 0);
    }

    #[tokio::test]
    async fn test_result_envelope() {
        let result = engine()
            .generate(
                GenerationRequest::new("Fix it")
                    .with_techniques(["alpha"])
                    .with_target_model("claude-3"),
            )
            .await
            .unwrap();
        assert_eq!(result.original_text, "Fix it");
        assert_eq!(result.target_model, "claude-3");
        assert!(Uuid::parse_str(&result.request_id).is_ok());
        assert!(result.metrics.available);
        assert_eq!(result.estimated_tokens, text::estimate_tokens(&result.enhanced_text));
        assert!(result.is_enhanced());
    }

    #[tokio::test]
    async fn test_validation_reports_complexity_used_for_context() {
        let text = "Implement a function that parses the SQL API response => struct";
        let result = engine()
            .generate(GenerationRequest::new(text).with_techniques(["alpha"]))
            .await
            .unwrap();
        assert_eq!(result.validation.complexity_score, validation::complexity_score(text));
    }

    #[test]
    fn test_apply_overrides_maps_unknown() {
        let engine = engine();
        let err = engine
            .apply_technique_overrides(&[TechniqueOverride {
                id: "ghost".into(),
                ..TechniqueOverride::default()
            }])
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownTechnique(id) if id == "ghost"));

        let n = engine
            .apply_technique_overrides(&[TechniqueOverride {
                id: "alpha".into(),
                enabled: Some(false),
                ..TechniqueOverride::default()
            }])
            .unwrap();
        assert_eq!(n, 1);
        assert!(!engine.registry().get_instance("alpha").unwrap().is_enabled());
    }
}
