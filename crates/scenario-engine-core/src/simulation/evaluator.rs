use crate::error::ScenarioError;
use crate::types::ParameterSet;
use crate::ScenarioResult;

/// A pure model mapping named inputs to a scalar output.
///
/// Results are cached and evaluated from several threads, so an
/// implementation must return the same output for the same inputs and must
/// not rely on side effects.
pub trait ScenarioModel: Send + Sync {
    fn evaluate(&self, params: &ParameterSet) -> ScenarioResult<f64>;
}

impl<F> ScenarioModel for F
where
    F: Fn(&ParameterSet) -> ScenarioResult<f64> + Send + Sync,
{
    fn evaluate(&self, params: &ParameterSet) -> ScenarioResult<f64> {
        self(params)
    }
}

/// Look up a named model argument.
pub fn param(params: &ParameterSet, name: &str) -> ScenarioResult<f64> {
    params
        .get(name)
        .copied()
        .ok_or_else(|| ScenarioError::MissingParameter(name.to_string()))
}

/// Copy of the base case with the given draws laid over it.
pub fn resolve_parameters<'a, I>(base_case: &ParameterSet, draws: I) -> ParameterSet
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    let mut params = base_case.clone();
    for (name, value) in draws {
        params.insert(name.to_string(), value);
    }
    params
}

/// Call boundary for one resolved parameter set. Errors are returned to the
/// caller untouched; deciding whether to skip is the orchestrator's job.
pub fn evaluate_model(model: &dyn ScenarioModel, params: &ParameterSet) -> ScenarioResult<f64> {
    let value = model.evaluate(params)?;
    if !value.is_finite() {
        return Err(ScenarioError::ModelEvaluation(format!(
            "model returned non-finite value {value}"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ParameterSet {
        ParameterSet::from([("x".to_string(), 10.0), ("y".to_string(), 5.0)])
    }

    #[test]
    fn test_closure_is_a_model() {
        let model = |p: &ParameterSet| -> ScenarioResult<f64> { Ok(param(p, "x")? * param(p, "y")?) };
        assert_eq!(evaluate_model(&model, &base()).unwrap(), 50.0);
    }

    #[test]
    fn test_missing_parameter() {
        let model = |p: &ParameterSet| -> ScenarioResult<f64> { param(p, "z") };
        let err = evaluate_model(&model, &base()).unwrap_err();
        assert!(matches!(err, ScenarioError::MissingParameter(ref n) if n == "z"));
    }

    #[test]
    fn test_resolve_overrides_only_drawn_names() {
        let params = resolve_parameters(&base(), [("x", 12.0)]);
        assert_eq!(params["x"], 12.0);
        assert_eq!(params["y"], 5.0);
    }

    #[test]
    fn test_non_finite_output_is_an_error() {
        let model = |p: &ParameterSet| -> ScenarioResult<f64> { Ok(param(p, "x")? / 0.0) };
        assert!(evaluate_model(&model, &base()).is_err());
    }
}
