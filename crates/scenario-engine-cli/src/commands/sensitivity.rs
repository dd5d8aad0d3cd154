use clap::Args;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

use scenario_engine_core::models::BuiltinModel;
use scenario_engine_core::sensitivity::{self, SensitivityRequest};
use scenario_engine_core::simulation::ScenarioModel;
use scenario_engine_core::{with_metadata, EngineConfig};

use super::check_base_case;
use crate::input;

/// Arguments for a sensitivity sweep
#[derive(Args)]
pub struct SensitivityArgs {
    /// Path to JSON or YAML input file
    #[arg(long)]
    pub input: Option<String>,

    /// Built-in model to sweep (overrides the input file)
    #[arg(long)]
    pub model: Option<String>,

    /// Relative variation either side of the base value, e.g. 0.2 for ±20%
    #[arg(long)]
    pub variation: Option<f64>,

    /// Sweep points on each side of the base value
    #[arg(long)]
    pub steps: Option<usize>,

    /// Sweep each variable on its own thread (range-approximation elasticity)
    #[arg(long)]
    pub parallel: bool,
}

#[derive(Deserialize)]
struct SensitivityInput {
    #[serde(default)]
    model: Option<String>,
    #[serde(flatten)]
    request: SensitivityRequest,
}

pub fn run_sensitivity(
    args: SensitivityArgs,
    config: &EngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let sens_input: SensitivityInput = input::read_request(args.input.as_deref(), "sensitivity analysis")?;

    let model_name = args
        .model
        .or(sens_input.model)
        .ok_or("a model name is required (--model or \"model\" in the input)")?;
    let model = BuiltinModel::from_name(&model_name)?;

    let mut request = sens_input.request;
    if let Some(variation) = args.variation {
        request.variation_pct = variation;
    }
    if let Some(steps) = args.steps {
        request.steps = steps;
    }
    check_base_case(model, &request.base_case)?;

    let start = Instant::now();
    let result = if args.parallel {
        let shared: Arc<dyn ScenarioModel> = Arc::new(model);
        sensitivity::analyze_parallel(&request, shared, config.sensitivity_timeout())?
    } else {
        sensitivity::analyze(&request, &model)?
    };
    let elapsed = start.elapsed().as_micros() as u64;

    let assumptions = json!({
        "model": model.name(),
        "variables": request.variables,
        "variation_pct": request.variation_pct,
        "steps": request.steps,
    });
    let warnings = result.warnings.clone();
    let output = with_metadata(
        &format!(
            "One-at-a-time sensitivity of {} ({:?} elasticity)",
            model.name(),
            result.elasticity_method
        ),
        &assumptions,
        warnings,
        elapsed,
        result,
    );
    Ok(serde_json::to_value(output)?)
}
