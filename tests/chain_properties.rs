//! Chain-level properties of `PromptEngine::generate`: ordering, failure
//! isolation, context flow, no-op requests, the validation gate, metric
//! bounds, and recommender fallback.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use prompt_enhancer::metrics::MetricsCalculator;
use prompt_enhancer::recommender::RecommenderError;
use prompt_enhancer::techniques::ContextMap;
use prompt_enhancer::{
    Complexity, EngineConfig, EngineError, GenerationRequest, InMemoryTracker, Intent,
    PromptEngine, StepOutcome, Technique, TechniqueBase, TechniqueConfig, TechniqueContext,
    TechniqueError, TechniqueRecommender, TechniqueRegistry,
};
use proptest::prelude::*;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Appends ` [tag]`.
struct Tagger {
    base: TechniqueBase,
    tag: String,
}

impl Technique for Tagger {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn description(&self) -> &'static str {
        "appends its tag"
    }

    fn apply(&self, text: &str, _context: &TechniqueContext) -> Result<String, TechniqueError> {
        Ok(format!("{} [{}]", text, self.tag))
    }
}

struct AlwaysFails {
    base: TechniqueBase,
}

impl Technique for AlwaysFails {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn description(&self) -> &'static str {
        "always fails"
    }

    fn apply(&self, _text: &str, _context: &TechniqueContext) -> Result<String, TechniqueError> {
        Err(TechniqueError::failed("middle", "deliberate failure"))
    }
}

/// Publishes `token` for later steps.
struct Producer {
    base: TechniqueBase,
}

impl Technique for Producer {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn description(&self) -> &'static str {
        "publishes a token"
    }

    fn apply(&self, text: &str, _context: &TechniqueContext) -> Result<String, TechniqueError> {
        Ok(format!("{} (produced)", text))
    }

    fn extract_context_updates(&self, _input: &str, _output: &str, _context: &TechniqueContext) -> ContextMap {
        [("token".to_string(), Value::from("abc123"))].into()
    }
}

/// Requires `token` from an earlier step.
struct Consumer {
    base: TechniqueBase,
}

impl Technique for Consumer {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn description(&self) -> &'static str {
        "consumes a token"
    }

    fn apply(&self, text: &str, context: &TechniqueContext) -> Result<String, TechniqueError> {
        let token = context
            .get_str("token")
            .ok_or_else(|| TechniqueError::InvalidInput("token missing".into()))?;
        Ok(format!(
            "{} (consumed {} after {})",
            text,
            token,
            context.chain_info.previous_techniques.join(",")
        ))
    }
}

/// Counts calls to `apply`.
struct Counting {
    base: TechniqueBase,
    calls: Arc<AtomicUsize>,
}

impl Technique for Counting {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn description(&self) -> &'static str {
        "counts applications"
    }

    fn apply(&self, text: &str, _context: &TechniqueContext) -> Result<String, TechniqueError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(text.to_string())
    }
}

struct SlowRecommender;

#[async_trait]
impl TechniqueRecommender for SlowRecommender {
    async fn recommend(
        &self,
        _text: &str,
        _intent: Intent,
        _complexity: Complexity,
    ) -> Result<Vec<String>, RecommenderError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(vec!["role_play".into()])
    }
}

fn register_tagger(registry: &mut TechniqueRegistry, id: &str) {
    let tag = id.to_string();
    registry.register(id, move |c| {
        Arc::new(Tagger {
            base: TechniqueBase::new(c),
            tag: tag.clone(),
        }) as Arc<dyn Technique>
    });
}

fn configure(registry: &TechniqueRegistry, id: &str, priority: i32) {
    registry
        .create_instance(id, TechniqueConfig::new(id).with_priority(priority))
        .unwrap();
}

fn engine_over(registry: TechniqueRegistry) -> PromptEngine {
    PromptEngine::new(Arc::new(registry), EngineConfig::default()).unwrap()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// Applied order is descending priority; ties keep the caller's order.
    #[test]
    fn applied_order_is_stable_priority_order(priorities in prop::collection::vec(0i32..4, 1..8)) {
        let mut registry = TechniqueRegistry::new();
        let ids: Vec<String> = (0..priorities.len()).map(|i| format!("t{}", i)).collect();
        for (id, priority) in ids.iter().zip(&priorities) {
            register_tagger(&mut registry, id);
            configure(&registry, id, *priority);
        }
        let engine = engine_over(registry);

        let mut expected: Vec<(i32, String)> =
            priorities.iter().copied().zip(ids.iter().cloned()).collect();
        expected.sort_by(|a, b| b.0.cmp(&a.0));
        let expected: Vec<String> = expected.into_iter().map(|(_, id)| id).collect();

        let result = runtime()
            .block_on(engine.generate(GenerationRequest::new("seed prompt").with_techniques(ids.clone())))
            .unwrap();

        let expected_text = expected
            .iter()
            .fold("seed prompt".to_string(), |acc, id| format!("{} [{}]", acc, id));
        prop_assert_eq!(&result.techniques_applied, &expected);
        prop_assert_eq!(result.enhanced_text, expected_text);
    }

    /// Every score stays in [0, 1] and overall is the fixed weighted sum.
    #[test]
    fn metrics_are_bounded(
        original in "(?s).{0,200}",
        enhanced in "(?s).{0,400}",
        applied in prop::collection::vec(
            prop_oneof![
                Just("chain_of_thought"),
                Just("few_shot"),
                Just("role_play"),
                Just("structured_output"),
                Just("emotional_appeal"),
                Just("custom"),
            ],
            0..5,
        ),
    ) {
        let applied: Vec<String> = applied.into_iter().map(String::from).collect();
        let m = MetricsCalculator::new().calculate(&original, &enhanced, &applied);

        prop_assert!(m.available);
        for score in [m.clarity, m.specificity, m.coherence, m.overall_quality] {
            prop_assert!((0.0..=1.0).contains(&score), "score out of range: {}", score);
        }
        for score in m.technique_effectiveness.values() {
            prop_assert!((0.0..=1.0).contains(score));
        }
        prop_assert!((0.0..=100.0).contains(&m.improvement_percentage));
        let weighted = 0.3 * m.clarity + 0.3 * m.specificity + 0.4 * m.coherence;
        prop_assert!((m.overall_quality - weighted).abs() < 1e-9);
    }
}

// ---------------------------------------------------------------------------
// Chain behavior
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failing_step_does_not_abort_chain() {
    let mut registry = TechniqueRegistry::new();
    register_tagger(&mut registry, "first");
    register_tagger(&mut registry, "last");
    registry.register("middle", |c| {
        Arc::new(AlwaysFails { base: TechniqueBase::new(c) }) as Arc<dyn Technique>
    });
    configure(&registry, "first", 30);
    configure(&registry, "middle", 20);
    configure(&registry, "last", 10);

    let result = engine_over(registry)
        .generate(GenerationRequest::new("Start").with_techniques(["first", "middle", "last"]))
        .await
        .unwrap();

    assert_eq!(result.enhanced_text, "Start [first] [last]");
    assert_eq!(result.techniques_applied, vec!["first", "last"]);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].technique_id, "middle");
    assert_eq!(result.chain.failed_count, 1);
    assert_eq!(result.chain.steps[1].outcome, StepOutcome::Failed);
}

#[tokio::test]
async fn context_flows_between_consecutive_steps() {
    let mut registry = TechniqueRegistry::new();
    registry.register("producer", |c| {
        Arc::new(Producer { base: TechniqueBase::new(c) }) as Arc<dyn Technique>
    });
    registry.register("consumer", |c| {
        Arc::new(Consumer { base: TechniqueBase::new(c) }) as Arc<dyn Technique>
    });
    configure(&registry, "producer", 20);
    configure(&registry, "consumer", 10);
    let engine = engine_over(registry);

    let result = engine
        .generate(GenerationRequest::new("Task").with_techniques(["consumer", "producer"]))
        .await
        .unwrap();
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(
        result.enhanced_text,
        "Task (produced) (consumed abc123 after producer)"
    );

    // Without the producer the consumer has nothing to read.
    let result = engine
        .generate(GenerationRequest::new("Task").with_techniques(["consumer"]))
        .await
        .unwrap();
    assert_eq!(result.enhanced_text, "Task");
    assert_eq!(result.errors[0].technique_id, "consumer");
    assert!(result.errors[0].message.contains("token missing"));
}

#[tokio::test]
async fn empty_technique_list_returns_original() {
    let engine = PromptEngine::with_builtins();
    let text = "Summarize   the attached report.\n\n\nKeep it short.";
    let result = engine
        .generate(GenerationRequest::new(text).with_techniques(Vec::<String>::new()))
        .await
        .unwrap();

    assert_eq!(result.enhanced_text, text);
    assert!(result.techniques_applied.is_empty());
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn oversized_prompt_is_rejected_before_any_step() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = TechniqueRegistry::new();
    let counter = calls.clone();
    registry.register("counting", move |c| {
        Arc::new(Counting {
            base: TechniqueBase::new(c),
            calls: counter.clone(),
        }) as Arc<dyn Technique>
    });
    configure(&registry, "counting", 1);

    let config = EngineConfig {
        max_prompt_length: 50,
        ..EngineConfig::default()
    };
    let engine = PromptEngine::new(Arc::new(registry), config).unwrap();

    let ok = engine
        .generate(GenerationRequest::new("a".repeat(50)).with_techniques(["counting"]))
        .await;
    assert!(ok.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let err = engine
        .generate(GenerationRequest::new("a".repeat(51)).with_techniques(["counting"]))
        .await
        .unwrap_err();
    assert!(err.is_invalid_request());
    assert!(matches!(err, EngineError::InvalidRequest { ref errors } if errors[0].contains("got 51")));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn disabled_technique_is_skipped_with_reason() {
    let registry = TechniqueRegistry::with_builtins();
    registry
        .create_instance(
            "emotional_appeal",
            TechniqueConfig::new("emotional_appeal")
                .with_priority(30)
                .with_enabled(false),
        )
        .unwrap();
    let engine = engine_over(registry);

    let result = engine
        .generate(
            GenerationRequest::new("Debug this code")
                .with_techniques(["chain_of_thought", "emotional_appeal"]),
        )
        .await
        .unwrap();

    assert_eq!(result.techniques_applied, vec!["chain_of_thought"]);
    assert!(result.enhanced_text.starts_with("Debug this code"));
    assert!(result.enhanced_text.contains("step by step"));
    assert!(result
        .warnings
        .iter()
        .any(|w| w.contains("emotional_appeal") && w.contains("skipped: disabled")));
    assert_eq!(result.chain.skipped_count, 1);
    assert_eq!(result.chain.steps[1].outcome, StepOutcome::SkippedDisabled);
}

#[tokio::test]
async fn rejected_input_is_skipped_with_reason() {
    let engine = PromptEngine::with_builtins();
    let text = "You are a pirate. Debug this code";
    let result = engine
        .generate(GenerationRequest::new(text).with_techniques(["role_play"]))
        .await
        .unwrap();

    assert_eq!(result.enhanced_text, text);
    assert!(result.techniques_applied.is_empty());
    assert!(result.errors.is_empty());
    assert_eq!(result.chain.skipped_count, 1);
    assert_eq!(result.chain.steps[0].outcome, StepOutcome::SkippedValidationFailed);
    assert!(result
        .warnings
        .iter()
        .any(|w| w == "Technique 'role_play' skipped: validation_failed"));
}

#[tokio::test]
async fn rejected_step_leaves_later_steps_running() {
    let engine = PromptEngine::with_builtins();
    let result = engine
        .generate(
            GenerationRequest::new("You are a pirate. Debug this code")
                .with_techniques(["role_play", "chain_of_thought"]),
        )
        .await
        .unwrap();

    assert_eq!(result.techniques_applied, vec!["chain_of_thought"]);
    assert_eq!(result.chain.steps[0].outcome, StepOutcome::SkippedValidationFailed);
    assert_eq!(result.chain.steps[1].outcome, StepOutcome::Applied);
    assert!(result.enhanced_text.starts_with("You are a pirate. Debug this code"));
}

#[tokio::test]
async fn tracker_survives_technique_overrides() {
    let registry = TechniqueRegistry::with_builtins();
    let tracker = Arc::new(InMemoryTracker::new());
    registry.attach_tracker(tracker.clone());
    let engine = engine_over(registry);

    let overrides = prompt_enhancer::config::parse_technique_overrides(
        "technique:\n  id: chain_of_thought\n  priority: 99\n",
    )
    .unwrap();
    assert_eq!(engine.apply_technique_overrides(&overrides).unwrap(), 1);
    assert_eq!(engine.registry().priority_of("chain_of_thought"), 99);

    engine
        .generate(GenerationRequest::new("Debug this code").with_techniques(["chain_of_thought"]))
        .await
        .unwrap();

    let stats = tracker.stats_for("chain_of_thought").unwrap();
    assert_eq!(stats.applications, 1);
    assert_eq!(stats.successes, 1);
}

#[tokio::test]
async fn slow_recommender_falls_back_to_default() {
    let config = EngineConfig {
        recommender_timeout_ms: 50,
        ..EngineConfig::default()
    };
    let engine = PromptEngine::new(Arc::new(TechniqueRegistry::with_builtins()), config)
        .unwrap()
        .with_recommender(Arc::new(SlowRecommender));

    let result = engine
        .generate(GenerationRequest::new("Explain how tides work"))
        .await
        .unwrap();

    assert_eq!(result.techniques_applied, vec!["zero_shot"]);
    assert!(result.warnings.iter().any(|w| w.contains("timed out after 50 ms")));
}

#[tokio::test]
async fn builtin_chain_publishes_role_to_later_steps() {
    let engine = PromptEngine::with_builtins();
    let result = engine
        .generate(
            GenerationRequest::new("Write a function that parses ISO dates")
                .with_techniques(["structured_output", "role_play"]),
        )
        .await
        .unwrap();

    assert_eq!(result.techniques_applied, vec!["role_play", "structured_output"]);
    assert!(result.enhanced_text.starts_with("You are"));
    assert!(result.step_metadata.contains_key("role_play"));
    assert!(result.metrics.overall_quality > 0.0);
}

#[tokio::test]
async fn instance_trackers_receive_reports() {
    let registry = TechniqueRegistry::with_builtins();
    let tracker = Arc::new(InMemoryTracker::new());
    assert_eq!(registry.attach_tracker(tracker.clone()), 10);
    let engine = engine_over(registry);

    engine
        .generate(GenerationRequest::new("Debug this code").with_techniques(["chain_of_thought"]))
        .await
        .unwrap();

    let stats = tracker.stats_for("chain_of_thought").unwrap();
    assert_eq!(stats.applications, 1);
    assert_eq!(stats.successes, 1);
    assert!(stats.total_token_delta > 0);
    assert_eq!(tracker.tracked_techniques(), vec!["chain_of_thought"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_do_not_interfere() {
    let engine = Arc::new(PromptEngine::with_builtins());
    let prompts: Vec<String> = (0..16).map(|i| format!("Debug failing test number {}", i)).collect();

    let handles: Vec<_> = prompts
        .iter()
        .cloned()
        .map(|prompt| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .generate(GenerationRequest::new(prompt).with_techniques(["chain_of_thought"]))
                    .await
            })
        })
        .collect();

    let results = futures::future::join_all(handles).await;
    for (prompt, joined) in prompts.iter().zip(results) {
        let result = joined.unwrap().unwrap();
        assert_eq!(&result.original_text, prompt);
        assert!(result.enhanced_text.starts_with(prompt.as_str()));
        assert_eq!(result.techniques_applied, vec!["chain_of_thought"]);
    }
}
