//! Effectiveness reporting side channel.
//!
//! A tracker receives one [`TechniqueReport`] per attempted application.
//! The engine never reads tracker state back, so wiring one in (or not)
//! does not change chain behavior.

use std::fmt;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Outcome of one technique application, as seen by a tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechniqueReport {
    /// Technique identifier.
    pub technique_id: String,
    /// Time spent in `apply`.
    pub duration: Duration,
    /// Estimated tokens added (negative when the text shrank).
    pub token_delta: i64,
    /// Whether the application succeeded.
    pub success: bool,
}

/// Receives technique reports. Implementations must not block.
pub trait EffectivenessTracker: Send + Sync + fmt::Debug {
    /// Record one report.
    fn record(&self, report: &TechniqueReport);
}

/// Aggregated statistics for one technique.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechniqueStats {
    /// Attempted applications.
    pub applications: u64,
    /// Successful applications.
    pub successes: u64,
    /// Summed `apply` time.
    pub total_duration: Duration,
    /// Summed token delta over successful applications.
    pub total_token_delta: i64,
}

impl TechniqueStats {
    /// Fraction of applications that succeeded.
    pub fn success_rate(&self) -> f64 {
        if self.applications == 0 {
            0.0
        } else {
            self.successes as f64 / self.applications as f64
        }
    }

    /// Mean `apply` time.
    pub fn average_duration(&self) -> Duration {
        match u32::try_from(self.applications) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(n) => self.total_duration / n,
        }
    }
}

/// In-process tracker aggregating reports per technique.
#[derive(Debug, Default)]
pub struct InMemoryTracker {
    stats: DashMap<String, TechniqueStats>,
}

impl InMemoryTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the statistics for one technique.
    pub fn stats_for(&self, technique_id: &str) -> Option<TechniqueStats> {
        self.stats.get(technique_id).map(|s| s.value().clone())
    }

    /// Identifiers with at least one report, sorted.
    pub fn tracked_techniques(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.stats.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Drop all statistics.
    pub fn reset(&self) {
        self.stats.clear();
    }
}

impl EffectivenessTracker for InMemoryTracker {
    fn record(&self, report: &TechniqueReport) {
        let mut entry = self.stats.entry(report.technique_id.clone()).or_default();
        entry.applications += 1;
        entry.total_duration += report.duration;
        if report.success {
            entry.successes += 1;
            entry.total_token_delta += report.token_delta;
        }
    }
}
