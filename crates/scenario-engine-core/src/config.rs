use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ScenarioError;
use crate::ScenarioResult;

/// Tunables for the simulation engine.
///
/// Every field has a default so a partial JSON/YAML document is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Runs below this many iterations are always single-threaded.
    pub parallel_threshold: usize,
    /// Upper bound on auto-tuned worker count.
    pub max_workers: usize,
    /// Per-worker wall-clock cap for parallel Monte Carlo.
    pub worker_timeout_secs: u64,
    /// Fraction of requested samples a parallel run must deliver before
    /// the single-threaded fallback engages.
    pub min_success_ratio: f64,
    pub histogram_bins: usize,
    /// Raw values returned with the histogram in the parallel path.
    pub histogram_value_cap: usize,
    /// Per-variable cap for the threaded sensitivity sweep.
    pub sensitivity_timeout_secs: u64,
    pub cache_ttl_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: 1_000,
            max_workers: 4,
            worker_timeout_secs: 300,
            min_success_ratio: 0.9,
            histogram_bins: 50,
            histogram_value_cap: 1_000,
            sensitivity_timeout_secs: 60,
            cache_ttl_secs: 3_600,
        }
    }
}

impl EngineConfig {
    pub fn worker_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_timeout_secs)
    }

    pub fn sensitivity_timeout(&self) -> Duration {
        Duration::from_secs(self.sensitivity_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn validate(&self) -> ScenarioResult<()> {
        if self.max_workers == 0 {
            return Err(ScenarioError::InvalidInput {
                field: "max_workers".into(),
                reason: "Must be at least 1".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.min_success_ratio) {
            return Err(ScenarioError::InvalidInput {
                field: "min_success_ratio".into(),
                reason: "Must be between 0 and 1".into(),
            });
        }
        if self.histogram_bins == 0 {
            return Err(ScenarioError::InvalidInput {
                field: "histogram_bins".into(),
                reason: "Must be at least 1".into(),
            });
        }
        Ok(())
    }
}
