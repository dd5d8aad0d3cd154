use serde::{Deserialize, Serialize};

/// Shape of the draw for an uncertain input.
///
/// Unrecognized names deserialize to `Unknown`, which samples
/// deterministically to the variable's base value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    Normal,
    Uniform,
    Triangular,
    #[serde(other)]
    Unknown,
}

/// One uncertain model input.
///
/// `min_value <= base_value <= max_value` is expected but not enforced here;
/// a triangular mode outside `[min_value, max_value]` is rejected when sampled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioVariable {
    pub name: String,
    pub base_value: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub distribution: Distribution,
    /// Normal only. Defaults to a quarter of the bounds width.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,
    /// Triangular only. Defaults to `base_value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<f64>,
}

impl ScenarioVariable {
    pub fn new(
        name: impl Into<String>,
        base_value: f64,
        min_value: f64,
        max_value: f64,
        distribution: Distribution,
    ) -> Self {
        Self {
            name: name.into(),
            base_value,
            min_value,
            max_value,
            distribution,
            std_dev: None,
            mode: None,
        }
    }

    pub fn with_std_dev(mut self, std_dev: f64) -> Self {
        self.std_dev = Some(std_dev);
        self
    }

    pub fn with_mode(mut self, mode: f64) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn effective_std_dev(&self) -> f64 {
        self.std_dev
            .unwrap_or((self.max_value - self.min_value) / 4.0)
    }

    pub fn effective_mode(&self) -> f64 {
        self.mode.unwrap_or(self.base_value)
    }
}
