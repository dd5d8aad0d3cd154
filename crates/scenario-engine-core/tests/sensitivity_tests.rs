use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use scenario_engine_core::models::BuiltinModel;
use scenario_engine_core::sensitivity::{analyze, analyze_parallel, ElasticityMethod, SensitivityRequest};
use scenario_engine_core::simulation::{param, ScenarioModel};
use scenario_engine_core::{ParameterSet, ScenarioResult};

fn base_case() -> ParameterSet {
    ParameterSet::from([("x".to_string(), 10.0), ("y".to_string(), 5.0)])
}

fn square_plus() -> Arc<dyn ScenarioModel> {
    Arc::new(|p: &ParameterSet| -> ScenarioResult<f64> {
        let x = param(p, "x")?;
        Ok(x * x + param(p, "y")?)
    })
}

#[test]
fn test_square_term_dominates_ranking() {
    let request = SensitivityRequest::new(base_case(), vec!["x".into(), "y".into()]);
    let result = analyze(&request, square_plus().as_ref()).unwrap();

    assert_eq!(result.base_result, 105.0);
    assert_eq!(result.elasticity_method, ElasticityMethod::Regression);
    let x = &result.variables["x"];
    let y = &result.variables["y"];
    assert!(x.sensitivity_rank > y.sensitivity_rank);
    assert_eq!(result.sensitivity_ranking[0].0, "x");
    assert_eq!(result.tornado[0].name, "x");
}

#[test]
fn test_parallel_sweep_agrees_on_ranking() {
    let request = SensitivityRequest::new(base_case(), vec!["x".into(), "y".into()]);
    let result = analyze_parallel(&request, square_plus(), Duration::from_secs(30)).unwrap();

    assert_eq!(result.elasticity_method, ElasticityMethod::RangeApprox);
    assert_eq!(result.sensitivity_ranking[0].0, "x");
    assert!(result.variables.values().all(|v| v.error.is_none()));
}

#[test]
fn test_zero_variation_reports_zero_elasticity() {
    let request = SensitivityRequest::new(base_case(), vec!["x".into(), "y".into()])
        .with_variation(0.0, 5);

    let serial = analyze(&request, square_plus().as_ref()).unwrap();
    let threaded = analyze_parallel(&request, square_plus(), Duration::from_secs(30)).unwrap();
    for result in [serial, threaded] {
        for (name, v) in &result.variables {
            assert_eq!(v.elasticity, 0.0, "{name}");
            assert_eq!(v.sensitivity_rank, 0.0, "{name}");
        }
    }
}

#[test]
fn test_sweep_points_span_the_variation() {
    let request = SensitivityRequest::new(base_case(), vec!["y".into()]).with_variation(0.1, 2);
    let result = analyze(&request, square_plus().as_ref()).unwrap();
    let points = &result.variables["y"].values;

    assert_eq!(points.len(), 5);
    assert!((points[0].value - 4.5).abs() < 1e-12);
    assert!((points[4].value - 5.5).abs() < 1e-12);
    assert_eq!(points[2].result, result.base_result);
}

#[test]
fn test_builtin_npv_rate_sensitivity_is_negative() {
    let base = ParameterSet::from([
        ("initial_investment".to_string(), 1_000.0),
        ("annual_cash_flow".to_string(), 300.0),
        ("years".to_string(), 5.0),
        ("discount_rate".to_string(), 0.10),
    ]);
    let request = SensitivityRequest::new(
        base,
        vec!["annual_cash_flow".into(), "discount_rate".into()],
    );
    let result = analyze(&request, &BuiltinModel::Npv).unwrap();

    assert!(result.variables["discount_rate"].elasticity < 0.0);
    assert!(result.variables["annual_cash_flow"].elasticity > 0.0);
    assert_eq!(result.sensitivity_ranking[0].0, "annual_cash_flow");
}

#[test]
fn test_tornado_serializes_low_and_high_fields() {
    let request = SensitivityRequest::new(base_case(), vec!["x".into()]);
    let result = analyze(&request, square_plus().as_ref()).unwrap();
    let bar = serde_json::to_value(&result.tornado[0]).unwrap();

    for key in ["name", "low_output", "high_output", "low_deviation", "high_deviation", "range"] {
        assert!(bar.get(key).is_some(), "missing {key}");
    }
    // x^2 + 5 at x = 8 and x = 12
    let low = bar["low_output"].as_f64().unwrap();
    let high = bar["high_output"].as_f64().unwrap();
    assert!((low - 69.0).abs() < 1e-9, "low = {low}");
    assert!((high - 149.0).abs() < 1e-9, "high = {high}");
}
