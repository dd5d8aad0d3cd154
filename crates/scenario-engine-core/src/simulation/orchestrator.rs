use std::collections::BTreeMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::evaluator::{evaluate_model, resolve_parameters, ScenarioModel};
use super::result::{ExecutionMode, ExecutionSummary, SimulationResult};
use super::sampler::{sample, validate_variable};
use super::statistics::{normalize_levels, summarize, SummaryOptions};
use super::variable::ScenarioVariable;
use crate::config::EngineConfig;
use crate::error::ScenarioError;
use crate::types::ParameterSet;
use crate::ScenarioResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One Monte Carlo request: base case, uncertain inputs and run shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloRequest {
    pub base_case: ParameterSet,
    #[serde(default)]
    pub variables: Vec<ScenarioVariable>,
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Fractions in `[0, 1]`.
    #[serde(default = "default_confidence_levels")]
    pub confidence_levels: Vec<f64>,
    /// Optional seed for reproducibility.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Worker count; auto-tuned from the iteration count when absent.
    #[serde(default)]
    pub workers: Option<usize>,
}

fn default_iterations() -> usize {
    10_000
}

fn default_confidence_levels() -> Vec<f64> {
    vec![0.05, 0.25, 0.5, 0.75, 0.95]
}

impl MonteCarloRequest {
    pub fn new(base_case: ParameterSet, variables: Vec<ScenarioVariable>, iterations: usize) -> Self {
        Self {
            base_case,
            variables,
            iterations,
            confidence_levels: default_confidence_levels(),
            seed: None,
            workers: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_confidence_levels(mut self, levels: Vec<f64>) -> Self {
        self.confidence_levels = levels;
        self
    }
}

/// A contiguous slice of the logical iteration space owned by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerTask {
    pub index: usize,
    pub start: usize,
    pub len: usize,
    /// Base seed plus the worker index.
    pub seed: u64,
}

/// Split `total` iterations as evenly as possible; the first
/// `total % workers` tasks take one extra iteration.
pub fn partition(total: usize, workers: usize, base_seed: u64) -> Vec<WorkerTask> {
    let workers = workers.max(1);
    let chunk = total / workers;
    let remainder = total % workers;
    let mut start = 0;
    (0..workers)
        .map(|index| {
            let len = chunk + usize::from(index < remainder);
            let task = WorkerTask {
                index,
                start,
                len,
                seed: base_seed.wrapping_add(index as u64),
            };
            start += len;
            task
        })
        .collect()
}

/// Outputs of one sampling loop plus the draws that produced them.
struct Batch {
    outputs: Vec<f64>,
    draws: BTreeMap<String, Vec<f64>>,
    skipped: usize,
}

/// Sample and evaluate `count` iterations in order from `rng`.
///
/// Model failures skip the iteration; sampler failures abort the batch.
fn run_batch(
    count: usize,
    rng: &mut StdRng,
    base_case: &ParameterSet,
    variables: &[ScenarioVariable],
    model: &dyn ScenarioModel,
    keep_draws: bool,
) -> ScenarioResult<Batch> {
    let mut outputs = Vec::with_capacity(count);
    let mut draws: BTreeMap<String, Vec<f64>> = if keep_draws {
        variables
            .iter()
            .map(|v| (v.name.clone(), Vec::with_capacity(count)))
            .collect()
    } else {
        BTreeMap::new()
    };
    let mut skipped = 0usize;
    let mut first_failure: Option<String> = None;

    for i in 0..count {
        let mut drawn = Vec::with_capacity(variables.len());
        for var in variables {
            drawn.push((var.name.as_str(), sample(var, rng)?));
        }
        let params = resolve_parameters(base_case, drawn.iter().copied());

        match evaluate_model(model, &params) {
            Ok(value) => {
                outputs.push(value);
                if keep_draws {
                    for (name, x) in &drawn {
                        if let Some(column) = draws.get_mut(*name) {
                            column.push(*x);
                        }
                    }
                }
            }
            Err(e) => {
                skipped += 1;
                debug!(iteration = i, error = %e, "Model evaluation failed; iteration skipped");
                if first_failure.is_none() {
                    first_failure = Some(e.to_string());
                }
            }
        }
    }

    if let Some(reason) = first_failure {
        warn!(
            skipped,
            requested = count,
            first_error = %reason,
            "Skipped iterations after model evaluation failures"
        );
    }

    Ok(Batch {
        outputs,
        draws,
        skipped,
    })
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs Monte Carlo requests single-threaded or across worker threads.
#[derive(Debug, Clone, Default)]
pub struct Orchestrator {
    config: EngineConfig,
}

impl Orchestrator {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether results produced in `mode` carry input/output correlations.
    pub fn supports_correlation(&self, mode: ExecutionMode) -> bool {
        mode.supports_correlation()
    }

    /// Worker count by iteration volume, capped at `max_workers`.
    pub fn auto_workers(&self, iterations: usize) -> usize {
        let tuned = match iterations {
            n if n < 1_000 => 1,
            n if n < 5_000 => 2,
            n if n < 20_000 => 4,
            _ => thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        };
        tuned.min(self.config.max_workers).max(1)
    }

    pub fn worker_count(&self, request: &MonteCarloRequest) -> usize {
        request
            .workers
            .unwrap_or_else(|| self.auto_workers(request.iterations))
            .max(1)
    }

    /// Small runs and single-worker runs never pay for thread dispatch.
    pub fn plan(&self, request: &MonteCarloRequest) -> ExecutionMode {
        if request.iterations < self.config.parallel_threshold || self.worker_count(request) <= 1 {
            ExecutionMode::SingleThreaded
        } else {
            ExecutionMode::Parallel
        }
    }

    fn validate(&self, request: &MonteCarloRequest) -> ScenarioResult<()> {
        self.config.validate()?;
        if request.iterations == 0 {
            return Err(ScenarioError::InvalidInput {
                field: "iterations".into(),
                reason: "Must be at least 1".into(),
            });
        }
        normalize_levels(&request.confidence_levels)?;
        for var in &request.variables {
            validate_variable(var)?;
        }
        Ok(())
    }

    /// Run the simulation and aggregate its outputs.
    ///
    /// Per-iteration model failures are skipped, so `iterations` in the
    /// result may be below the request. Invalid distribution parameters are
    /// the only input problem reported as an error.
    pub fn run(
        &self,
        request: &MonteCarloRequest,
        model: Arc<dyn ScenarioModel>,
    ) -> ScenarioResult<SimulationResult> {
        self.validate(request)?;
        let seed = request.seed.unwrap_or_else(rand::random);
        let start = Instant::now();

        let result = match self.plan(request) {
            ExecutionMode::SingleThreaded => self.run_single(request, model.as_ref(), seed, false, 0),
            ExecutionMode::Parallel => {
                let workers = self.worker_count(request);
                self.run_parallel(request, model, seed, workers)
            }
        }?;

        info!(
            iterations = result.iterations,
            requested = request.iterations,
            mode = ?result.execution.mode,
            workers = result.execution.workers,
            fell_back = result.execution.fell_back,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Monte Carlo run complete"
        );
        Ok(result)
    }

    fn run_single(
        &self,
        request: &MonteCarloRequest,
        model: &dyn ScenarioModel,
        seed: u64,
        fell_back: bool,
        failed_workers: usize,
    ) -> ScenarioResult<SimulationResult> {
        debug!(iterations = request.iterations, seed, "Running single-threaded Monte Carlo");
        let mut rng = StdRng::seed_from_u64(seed);
        let batch = run_batch(
            request.iterations,
            &mut rng,
            &request.base_case,
            &request.variables,
            model,
            true,
        )?;

        let execution = ExecutionSummary {
            mode: ExecutionMode::SingleThreaded,
            workers: 1,
            failed_workers,
            fell_back,
            supports_correlation: self.supports_correlation(ExecutionMode::SingleThreaded),
            seed,
        };
        let mut result = summarize(
            &batch.outputs,
            SummaryOptions {
                confidence_levels: &request.confidence_levels,
                requested_iterations: request.iterations,
                histogram_bins: self.config.histogram_bins,
                value_cap: None,
                input_samples: Some(&batch.draws),
                execution,
            },
        )?;
        result.skipped_iterations = batch.skipped;
        Ok(result)
    }

    fn run_parallel(
        &self,
        request: &MonteCarloRequest,
        model: Arc<dyn ScenarioModel>,
        seed: u64,
        workers: usize,
    ) -> ScenarioResult<SimulationResult> {
        let tasks = partition(request.iterations, workers, seed);
        debug!(workers, iterations = request.iterations, seed, "Dispatching Monte Carlo workers");

        let (tx, rx) = mpsc::channel::<(usize, ScenarioResult<Batch>)>();
        let mut pending = 0usize;
        let mut failed = 0usize;

        for task in tasks {
            let tx = tx.clone();
            let model = Arc::clone(&model);
            let base_case = request.base_case.clone();
            let variables = request.variables.clone();
            let spawned = thread::Builder::new()
                .name(format!("mc-worker-{}", task.index))
                .spawn(move || {
                    let mut rng = StdRng::seed_from_u64(task.seed);
                    let batch = run_batch(
                        task.len,
                        &mut rng,
                        &base_case,
                        &variables,
                        model.as_ref(),
                        false,
                    );
                    let _ = tx.send((task.index, batch));
                });
            match spawned {
                Ok(_) => pending += 1,
                Err(e) => {
                    warn!(worker = task.index, error = %e, "Failed to spawn Monte Carlo worker");
                    failed += 1;
                }
            }
        }
        drop(tx);

        // Workers start together, so one deadline caps each of them.
        let deadline = Instant::now() + self.config.worker_timeout();
        let mut collected: Vec<Option<Vec<f64>>> = vec![None; workers];
        while pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok((index, Ok(batch))) => {
                    pending -= 1;
                    collected[index] = Some(batch.outputs);
                }
                Ok((index, Err(e))) => {
                    pending -= 1;
                    failed += 1;
                    warn!(worker = index, error = %e, "Monte Carlo worker failed; results dropped");
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(workers = pending, "Monte Carlo workers timed out; results dropped");
                    failed += pending;
                    pending = 0;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    warn!(workers = pending, "Monte Carlo workers exited without reporting");
                    failed += pending;
                    pending = 0;
                }
            }
        }

        // Pooled in worker order; position carries no meaning.
        let outputs: Vec<f64> = collected.into_iter().flatten().flatten().collect();
        let required = self.config.min_success_ratio * request.iterations as f64;
        if (outputs.len() as f64) < required {
            warn!(
                collected = outputs.len(),
                requested = request.iterations,
                failed_workers = failed,
                "Parallel run below success threshold; rerunning single-threaded"
            );
            return self.run_single(request, model.as_ref(), seed, true, failed);
        }

        let execution = ExecutionSummary {
            mode: ExecutionMode::Parallel,
            workers,
            failed_workers: failed,
            fell_back: false,
            supports_correlation: self.supports_correlation(ExecutionMode::Parallel),
            seed,
        };
        summarize(
            &outputs,
            SummaryOptions {
                confidence_levels: &request.confidence_levels,
                requested_iterations: request.iterations,
                histogram_bins: self.config.histogram_bins,
                value_cap: Some(self.config.histogram_value_cap),
                input_samples: None,
                execution,
            },
        )
    }
}
