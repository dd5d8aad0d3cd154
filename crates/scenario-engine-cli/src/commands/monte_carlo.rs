use clap::Args;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use scenario_engine_core::models::BuiltinModel;
use scenario_engine_core::simulation::{MonteCarloRequest, Orchestrator, ScenarioModel};
use scenario_engine_core::{with_metadata, EngineConfig};

use super::check_base_case;
use crate::input;

/// Arguments for a Monte Carlo simulation
#[derive(Args)]
pub struct MonteCarloArgs {
    /// Path to JSON or YAML input file
    #[arg(long)]
    pub input: Option<String>,

    /// Built-in model to simulate (overrides the input file)
    #[arg(long)]
    pub model: Option<String>,

    /// Number of iterations (overrides the input file)
    #[arg(long)]
    pub iterations: Option<usize>,

    /// Seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of worker threads; 1 forces a single-threaded run
    #[arg(long)]
    pub workers: Option<usize>,
}

#[derive(Deserialize)]
struct MonteCarloInput {
    #[serde(default)]
    model: Option<String>,
    #[serde(flatten)]
    request: MonteCarloRequest,
}

pub fn run_monte_carlo(
    args: MonteCarloArgs,
    config: &EngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mc_input: MonteCarloInput = input::read_request(args.input.as_deref(), "Monte Carlo simulation")?;

    let model_name = args
        .model
        .or(mc_input.model)
        .ok_or("a model name is required (--model or \"model\" in the input)")?;
    let model = BuiltinModel::from_name(&model_name)?;

    let mut request = mc_input.request;
    if let Some(iterations) = args.iterations {
        request.iterations = iterations;
    }
    if let Some(seed) = args.seed {
        request.seed = Some(seed);
    }
    if let Some(workers) = args.workers {
        request.workers = Some(workers);
    }
    check_base_case(model, &request.base_case)?;

    let start = Instant::now();
    let orchestrator = Orchestrator::new(config.clone());
    let shared: Arc<dyn ScenarioModel> = Arc::new(model);
    let result = orchestrator.run(&request, shared)?;
    let elapsed = start.elapsed().as_micros() as u64;

    let mut warnings = Vec::new();
    if result.skipped_iterations > 0 {
        warnings.push(format!(
            "{} of {} iterations failed to evaluate and were skipped",
            result.skipped_iterations, result.requested_iterations
        ));
    }
    if result.execution.fell_back {
        warnings.push(format!(
            "Parallel run lost {} worker(s); results come from a single-threaded rerun",
            result.execution.failed_workers
        ));
    }
    if !result.execution.supports_correlation {
        warnings.push("Input/output correlations are not computed for parallel runs".into());
    }

    info!(
        model = model.name(),
        iterations = result.iterations,
        mean = result.mean,
        elapsed_us = elapsed,
        "Monte Carlo complete"
    );

    let assumptions = json!({
        "model": model.name(),
        "variables": request.variables.iter().map(|v| v.name.as_str()).collect::<Vec<_>>(),
        "iterations": request.iterations,
        "confidence_levels": request.confidence_levels,
        "seed": result.execution.seed,
    });
    let output = with_metadata(
        &format!("Monte Carlo simulation of {} ({:?})", model.name(), result.execution.mode),
        &assumptions,
        warnings,
        elapsed,
        result,
    );
    Ok(serde_json::to_value(output)?)
}
