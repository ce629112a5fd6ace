//! Command-line front end for the enhancement engine.
//!
//! # Environment Variables
//!
//! - `ENHANCER_TECHNIQUES`: comma-separated technique ids (default: recommended)
//! - `ENHANCER_TECHNIQUES_FILE`: YAML technique overrides
//! - `ENHANCER_MAX_LENGTH`: maximum output length in characters
//! - `ENHANCER_*`: engine limits, see `EngineConfig::from_env`
//! - `RUST_LOG`: tracing filter (default: "info,prompt_enhancer=debug")
//!
//! # Usage
//!
//! ```bash
//! ENHANCER_TECHNIQUES=chain_of_thought,role_play cargo run --bin enhance -- Debug this code
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use prompt_enhancer::config::load_technique_overrides;
use prompt_enhancer::{
    EngineConfig, GenerationRequest, InMemoryTracker, PromptEngine, StaticRecommender,
    TechniqueRegistry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,prompt_enhancer=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let prompt = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if prompt.trim().is_empty() {
        bail!("usage: enhance <prompt text>");
    }

    let tracker = Arc::new(InMemoryTracker::new());
    let registry = Arc::new(TechniqueRegistry::with_builtins());
    let engine = PromptEngine::new(registry, EngineConfig::from_env())?
        .with_recommender(Arc::new(StaticRecommender::with_defaults()))
        .with_tracker(tracker.clone());

    if let Ok(path) = std::env::var("ENHANCER_TECHNIQUES_FILE") {
        let path = PathBuf::from(path);
        let overrides = load_technique_overrides(&path)
            .with_context(|| format!("loading technique overrides from {}", path.display()))?;
        let applied = engine.apply_technique_overrides(&overrides)?;
        tracing::info!("Applied {} technique override(s)", applied);
    }

    let mut request = GenerationRequest::new(prompt);
    if let Ok(list) = std::env::var("ENHANCER_TECHNIQUES") {
        request = request.with_techniques(
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
        );
    }
    if let Ok(raw) = std::env::var("ENHANCER_MAX_LENGTH") {
        let max: usize = raw
            .trim()
            .parse()
            .with_context(|| format!("ENHANCER_MAX_LENGTH is not a number: '{}'", raw))?;
        request = request.with_max_length(max);
    }

    let result = engine.generate(request).await?;
    tracing::info!(
        request_id = %result.request_id,
        applied = result.techniques_applied.len(),
        overall_quality = result.metrics.overall_quality,
        "Enhancement complete"
    );
    for id in tracker.tracked_techniques() {
        if let Some(stats) = tracker.stats_for(&id) {
            tracing::debug!(technique = %id, success_rate = stats.success_rate(), "tracked");
        }
    }

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
