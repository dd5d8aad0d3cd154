use clap::Args;
use serde_json::Value;

use scenario_engine_core::models::BuiltinModel;

/// Arguments for listing built-in models
#[derive(Args)]
pub struct ModelsArgs {
    /// Show a single model
    #[arg(long)]
    pub name: Option<String>,
}

pub fn run_models(args: ModelsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let models = match args.name {
        Some(ref name) => vec![BuiltinModel::from_name(name)?.info()],
        None => BuiltinModel::ALL.iter().map(|m| m.info()).collect(),
    };
    Ok(serde_json::to_value(models)?)
}
