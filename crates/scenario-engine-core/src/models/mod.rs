//! Built-in investment models usable as a [`ScenarioModel`](crate::simulation::ScenarioModel).

pub mod builtin;

pub use builtin::{BuiltinModel, ModelInfo};
