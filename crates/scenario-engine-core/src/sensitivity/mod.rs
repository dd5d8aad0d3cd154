//! One-at-a-time sensitivity sweeps, elasticity estimates and tornado data.

pub mod elasticity;
pub mod sweep;
pub mod tornado;

pub use elasticity::{elasticity_range_approx, elasticity_regression, ElasticityMethod};
pub use sweep::{analyze, analyze_parallel, SensitivityRequest, SensitivityResult, VariableSensitivity};
pub use tornado::TornadoBar;
