pub mod config;
pub mod error;
pub mod time_value;
pub mod types;

#[cfg(feature = "simulation")]
pub mod simulation;

#[cfg(feature = "sensitivity")]
pub mod sensitivity;

#[cfg(feature = "cache")]
pub mod cache;

#[cfg(feature = "models")]
pub mod models;

pub use config::EngineConfig;
pub use error::ScenarioError;
pub use types::*;

/// Standard result type for all scenario-engine operations
pub type ScenarioResult<T> = Result<T, ScenarioError>;
