use std::collections::{BTreeMap, BTreeSet};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::elasticity::ElasticityMethod;
use super::tornado::{tornado_bars, TornadoBar};
use crate::error::ScenarioError;
use crate::simulation::evaluator::{evaluate_model, resolve_parameters, ScenarioModel};
use crate::types::ParameterSet;
use crate::ScenarioResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One-at-a-time sensitivity request around a base case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityRequest {
    pub base_case: ParameterSet,
    /// Names to sweep; names absent from the base case are skipped.
    pub variables: Vec<String>,
    /// Half-width of the sweep as a fraction of the base value (0.2 = ±20%).
    #[serde(default = "default_variation_pct")]
    pub variation_pct: f64,
    /// Points on each side of the base value.
    #[serde(default = "default_steps")]
    pub steps: usize,
}

fn default_variation_pct() -> f64 {
    0.2
}

fn default_steps() -> usize {
    5
}

impl SensitivityRequest {
    pub fn new(base_case: ParameterSet, variables: Vec<String>) -> Self {
        Self {
            base_case,
            variables,
            variation_pct: default_variation_pct(),
            steps: default_steps(),
        }
    }

    pub fn with_variation(mut self, variation_pct: f64, steps: usize) -> Self {
        self.variation_pct = variation_pct;
        self.steps = steps;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub value: f64,
    pub multiplier: f64,
    pub result: f64,
    pub pct_change_input: f64,
    pub pct_change_output: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSensitivity {
    pub values: Vec<SweepPoint>,
    pub elasticity: f64,
    /// `|elasticity|`
    pub sensitivity_rank: f64,
    /// Why the sweep produced a zero placeholder, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VariableSensitivity {
    fn placeholder(reason: String) -> Self {
        Self {
            values: Vec::new(),
            elasticity: 0.0,
            sensitivity_rank: 0.0,
            error: Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityResult {
    /// Model output at the unperturbed base case.
    pub base_result: f64,
    pub variables: BTreeMap<String, VariableSensitivity>,
    /// `(name, rank)` sorted by rank, highest first.
    pub sensitivity_ranking: Vec<(String, f64)>,
    pub elasticity_method: ElasticityMethod,
    pub tornado: Vec<TornadoBar>,
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Sweep helpers
// ---------------------------------------------------------------------------

/// `2 * steps + 1` evenly spaced multipliers across `1 ± variation_pct`.
/// The centre point is exactly 1.0.
pub fn multipliers(variation_pct: f64, steps: usize) -> Vec<f64> {
    let lo = 1.0 - variation_pct;
    let count = 2 * steps + 1;
    let step = 2.0 * variation_pct / (count - 1) as f64;
    let mut out: Vec<f64> = (0..count).map(|i| lo + i as f64 * step).collect();
    out[steps] = 1.0;
    out
}

fn validate(request: &SensitivityRequest) -> ScenarioResult<()> {
    if !request.variation_pct.is_finite() || request.variation_pct < 0.0 {
        return Err(ScenarioError::InvalidInput {
            field: "variation_pct".into(),
            reason: "Must be a finite fraction >= 0".into(),
        });
    }
    if request.steps == 0 {
        return Err(ScenarioError::InvalidInput {
            field: "steps".into(),
            reason: "Must be at least 1".into(),
        });
    }
    Ok(())
}

/// Split requested names into those present in the base case and warnings
/// for the rest.
fn known_variables(request: &SensitivityRequest) -> (Vec<String>, Vec<String>) {
    let mut names = Vec::new();
    let mut warnings = Vec::new();
    for name in &request.variables {
        if request.base_case.contains_key(name) {
            names.push(name.clone());
        } else {
            warn!(variable = %name, "Variable not in base case; skipped");
            warnings.push(format!("Variable '{name}' not found in base case; skipped"));
        }
    }
    (names, warnings)
}

/// Sweep a single variable holding every other input at its base value.
fn sweep_variable(
    name: &str,
    base_case: &ParameterSet,
    base_result: f64,
    multipliers: &[f64],
    model: &dyn ScenarioModel,
    method: ElasticityMethod,
) -> ScenarioResult<VariableSensitivity> {
    let base_value = base_case
        .get(name)
        .copied()
        .ok_or_else(|| ScenarioError::MissingParameter(name.to_string()))?;

    let mut values = Vec::with_capacity(multipliers.len());
    for &multiplier in multipliers {
        let value = base_value * multiplier;
        let params = resolve_parameters(base_case, [(name, value)]);
        let result = evaluate_model(model, &params)?;
        let pct_change_output = if base_result == 0.0 {
            0.0
        } else {
            (result - base_result) / base_result * 100.0
        };
        values.push(SweepPoint {
            value,
            multiplier,
            result,
            pct_change_input: (multiplier - 1.0) * 100.0,
            pct_change_output,
        });
    }

    let pct_in: Vec<f64> = values.iter().map(|p| p.pct_change_input).collect();
    let pct_out: Vec<f64> = values.iter().map(|p| p.pct_change_output).collect();
    let elasticity = method.estimate(&pct_in, &pct_out);

    Ok(VariableSensitivity {
        values,
        elasticity,
        sensitivity_rank: elasticity.abs(),
        error: None,
    })
}

fn evaluate_base(
    request: &SensitivityRequest,
    model: &dyn ScenarioModel,
) -> ScenarioResult<(f64, Vec<String>)> {
    let base = evaluate_model(model, &request.base_case)?;
    let mut warnings = Vec::new();
    if base == 0.0 {
        warnings.push(
            "Base result is zero; output percentage changes reported as 0".to_string(),
        );
    }
    Ok((base, warnings))
}

fn assemble(
    base_result: f64,
    variables: BTreeMap<String, VariableSensitivity>,
    method: ElasticityMethod,
    warnings: Vec<String>,
) -> SensitivityResult {
    let mut sensitivity_ranking: Vec<(String, f64)> = variables
        .iter()
        .map(|(name, v)| (name.clone(), v.sensitivity_rank))
        .collect();
    sensitivity_ranking.sort_by(|a, b| b.1.total_cmp(&a.1));
    let tornado = tornado_bars(base_result, &variables);

    SensitivityResult {
        base_result,
        variables,
        sensitivity_ranking,
        elasticity_method: method,
        tornado,
        warnings,
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Sweep each variable in turn and fit a regression elasticity.
///
/// A variable whose sweep hits a model error gets elasticity 0 and no
/// points; only a failure at the base case itself is returned as an error.
pub fn analyze(
    request: &SensitivityRequest,
    model: &dyn ScenarioModel,
) -> ScenarioResult<SensitivityResult> {
    validate(request)?;
    let (base, mut warnings) = evaluate_base(request, model)?;
    let (names, skipped) = known_variables(request);
    warnings.extend(skipped);
    let points = multipliers(request.variation_pct, request.steps);

    let method = ElasticityMethod::Regression;
    let mut variables = BTreeMap::new();
    for name in names {
        let entry = match sweep_variable(&name, &request.base_case, base, &points, model, method) {
            Ok(v) => v,
            Err(e) => {
                warn!(variable = %name, error = %e, "Sensitivity sweep failed");
                warnings.push(format!("Sweep of '{name}' failed: {e}"));
                VariableSensitivity::placeholder(e.to_string())
            }
        };
        variables.insert(name, entry);
    }

    Ok(assemble(base, variables, method, warnings))
}

/// Sweep every variable on its own thread with a per-variable timeout.
///
/// Uses the range approximation for elasticity. Variables that error or
/// miss the deadline get zero placeholders.
pub fn analyze_parallel(
    request: &SensitivityRequest,
    model: Arc<dyn ScenarioModel>,
    timeout: Duration,
) -> ScenarioResult<SensitivityResult> {
    validate(request)?;
    let (base, mut warnings) = evaluate_base(request, model.as_ref())?;
    let (names, skipped) = known_variables(request);
    warnings.extend(skipped);
    let points = Arc::new(multipliers(request.variation_pct, request.steps));
    let base_case = Arc::new(request.base_case.clone());

    let (tx, rx) = mpsc::channel::<(String, ScenarioResult<VariableSensitivity>)>();
    let mut outstanding = BTreeSet::new();
    let mut variables = BTreeMap::new();

    for name in names {
        let tx = tx.clone();
        let model = Arc::clone(&model);
        let points = Arc::clone(&points);
        let base_case = Arc::clone(&base_case);
        let thread_name = name.clone();
        let spawned = thread::Builder::new()
            .name(format!("sens-{thread_name}"))
            .spawn(move || {
                let result = sweep_variable(
                    &thread_name,
                    &base_case,
                    base,
                    &points,
                    model.as_ref(),
                    ElasticityMethod::RangeApprox,
                );
                let _ = tx.send((thread_name, result));
            });
        match spawned {
            Ok(_) => {
                outstanding.insert(name);
            }
            Err(e) => {
                warnings.push(format!("Sweep of '{name}' could not start: {e}"));
                variables.insert(name, VariableSensitivity::placeholder(e.to_string()));
            }
        }
    }
    drop(tx);

    let deadline = Instant::now() + timeout;
    while !outstanding.is_empty() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok((name, Ok(v))) => {
                debug!(variable = %name, elasticity = v.elasticity, "Sensitivity sweep complete");
                outstanding.remove(&name);
                variables.insert(name, v);
            }
            Ok((name, Err(e))) => {
                warn!(variable = %name, error = %e, "Sensitivity sweep failed");
                outstanding.remove(&name);
                warnings.push(format!("Sweep of '{name}' failed: {e}"));
                variables.insert(name, VariableSensitivity::placeholder(e.to_string()));
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    for name in outstanding {
        warn!(variable = %name, "Sensitivity sweep timed out or exited without reporting");
        warnings.push(format!("Sweep of '{name}' did not finish within {timeout:?}"));
        variables.insert(name, VariableSensitivity::placeholder("timed out".to_string()));
    }

    Ok(assemble(base, variables, ElasticityMethod::RangeApprox, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::evaluator::param;

    fn base_case() -> ParameterSet {
        ParameterSet::from([("x".to_string(), 10.0), ("y".to_string(), 5.0)])
    }

    fn square_plus() -> impl Fn(&ParameterSet) -> ScenarioResult<f64> + Send + Sync + 'static {
        |p: &ParameterSet| -> ScenarioResult<f64> {
            let x = param(p, "x")?;
            Ok(x * x + param(p, "y")?)
        }
    }

    #[test]
    fn test_multipliers() {
        let m = multipliers(0.2, 2);
        assert_eq!(m.len(), 5);
        assert!((m[0] - 0.8).abs() < 1e-12);
        assert_eq!(m[2], 1.0);
        assert!((m[4] - 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_square_term_dominates() {
        let req = SensitivityRequest::new(base_case(), vec!["x".into(), "y".into()]);
        let r = analyze(&req, &square_plus()).unwrap();
        assert_eq!(r.base_result, 105.0);
        assert!(r.variables["x"].sensitivity_rank > r.variables["y"].sensitivity_rank);
        assert_eq!(r.sensitivity_ranking[0].0, "x");
        assert_eq!(r.variables["x"].values.len(), 11);
        assert_eq!(r.elasticity_method, ElasticityMethod::Regression);
    }

    #[test]
    fn test_center_point_reproduces_base() {
        let req = SensitivityRequest::new(base_case(), vec!["x".into()]);
        let r = analyze(&req, &square_plus()).unwrap();
        let centre = &r.variables["x"].values[5];
        assert_eq!(centre.multiplier, 1.0);
        assert_eq!(centre.result, r.base_result);
        assert_eq!(centre.pct_change_output, 0.0);
    }

    #[test]
    fn test_zero_variation_gives_zero_elasticity() {
        let req = SensitivityRequest::new(base_case(), vec!["x".into(), "y".into()]).with_variation(0.0, 5);
        let r = analyze(&req, &square_plus()).unwrap();
        for v in r.variables.values() {
            assert_eq!(v.elasticity, 0.0);
        }
        let r = analyze_parallel(&req, Arc::new(square_plus()), Duration::from_secs(5)).unwrap();
        for v in r.variables.values() {
            assert_eq!(v.elasticity, 0.0);
        }
    }

    #[test]
    fn test_unknown_variable_skipped_with_warning() {
        let req = SensitivityRequest::new(base_case(), vec!["x".into(), "z".into()]);
        let r = analyze(&req, &square_plus()).unwrap();
        assert!(r.variables.contains_key("x"));
        assert!(!r.variables.contains_key("z"));
        assert!(r.warnings.iter().any(|w| w.contains("'z'")));
    }

    #[test]
    fn test_failing_variable_gets_placeholder() {
        let model = |p: &ParameterSet| -> ScenarioResult<f64> {
            let y = param(p, "y")?;
            if y > 5.5 {
                return Err(ScenarioError::ModelEvaluation("y out of range".into()));
            }
            Ok(param(p, "x")? + y)
        };
        let req = SensitivityRequest::new(base_case(), vec!["x".into(), "y".into()]);
        let r = analyze(&req, &model).unwrap();
        assert!(r.variables["y"].values.is_empty());
        assert_eq!(r.variables["y"].elasticity, 0.0);
        assert!(r.variables["y"].error.is_some());
        assert!(!r.variables["x"].values.is_empty());
    }

    #[test]
    fn test_linear_model_elasticity_is_one() {
        // output proportional to x: 1% in => 1% out
        let model = |p: &ParameterSet| -> ScenarioResult<f64> { Ok(3.0 * param(p, "x")?) };
        let req = SensitivityRequest::new(base_case(), vec!["x".into()]);
        let r = analyze(&req, &model).unwrap();
        assert!((r.variables["x"].elasticity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_parallel_matches_ranking() {
        let req = SensitivityRequest::new(base_case(), vec!["x".into(), "y".into()]);
        let r = analyze_parallel(&req, Arc::new(square_plus()), Duration::from_secs(60)).unwrap();
        assert_eq!(r.elasticity_method, ElasticityMethod::RangeApprox);
        assert_eq!(r.sensitivity_ranking[0].0, "x");
        assert!(r.variables["x"].elasticity > 0.0);
    }

    #[test]
    fn test_parallel_timeout_gives_placeholder() {
        let model = |p: &ParameterSet| -> ScenarioResult<f64> {
            let slow = thread::current().name().is_some_and(|n| n == "sens-y");
            if slow {
                thread::sleep(Duration::from_millis(200));
            }
            Ok(param(p, "x")? + param(p, "y")?)
        };
        let req = SensitivityRequest::new(base_case(), vec!["x".into(), "y".into()]).with_variation(0.1, 1);
        let r = analyze_parallel(&req, Arc::new(model), Duration::from_millis(100)).unwrap();
        assert_eq!(r.variables["y"].elasticity, 0.0);
        assert_eq!(r.variables["y"].error.as_deref(), Some("timed out"));
    }

    #[test]
    fn test_tornado_sorted_by_range() {
        let req = SensitivityRequest::new(base_case(), vec!["x".into(), "y".into()]);
        let r = analyze(&req, &square_plus()).unwrap();
        assert_eq!(r.tornado.len(), 2);
        assert_eq!(r.tornado[0].name, "x");
        assert!(r.tornado[0].range >= r.tornado[1].range);
        assert!(r.tornado[0].low_deviation < 0.0 && r.tornado[0].high_deviation > 0.0);
    }

    #[test]
    fn test_base_case_failure_is_an_error() {
        let model = |_: &ParameterSet| -> ScenarioResult<f64> {
            Err(ScenarioError::ModelEvaluation("broken".into()))
        };
        let req = SensitivityRequest::new(base_case(), vec!["x".into()]);
        assert!(analyze(&req, &model).is_err());
    }
}
