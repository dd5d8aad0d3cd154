pub mod models;
pub mod monte_carlo;
pub mod sensitivity;

use scenario_engine_core::models::BuiltinModel;
use scenario_engine_core::ParameterSet;

/// Reject a base case that leaves any of the model's inputs undefined.
pub(crate) fn check_base_case(
    model: BuiltinModel,
    base_case: &ParameterSet,
) -> Result<(), Box<dyn std::error::Error>> {
    let missing: Vec<&str> = model
        .required_parameters()
        .into_iter()
        .filter(|p| !base_case.contains_key(*p))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "Model '{}' needs base_case values for: {}",
            model.name(),
            missing.join(", ")
        )
        .into())
    }
}
