//! Monte Carlo simulation: sampling, model evaluation, orchestration and
//! aggregation of outputs.

pub mod evaluator;
pub mod orchestrator;
pub mod result;
pub mod sampler;
pub mod statistics;
pub mod variable;

pub use evaluator::{param, ScenarioModel};
pub use orchestrator::{MonteCarloRequest, Orchestrator};
pub use result::{CorrelationStat, ExecutionMode, ExecutionSummary, HistogramData, SimulationResult};
pub use variable::{Distribution, ScenarioVariable};
