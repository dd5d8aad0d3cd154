use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How a Monte Carlo run was actually executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    SingleThreaded,
    Parallel,
}

impl ExecutionMode {
    /// Input/output correlations need every draw kept next to its output,
    /// which only the single-threaded path does.
    pub fn supports_correlation(self) -> bool {
        matches!(self, ExecutionMode::SingleThreaded)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub mode: ExecutionMode,
    pub workers: usize,
    /// Workers whose whole contribution was dropped (error, panic or timeout).
    pub failed_workers: usize,
    /// Parallel results were discarded for a full single-threaded rerun.
    pub fell_back: bool,
    pub supports_correlation: bool,
    pub seed: u64,
}

/// Pearson correlation between one input's draws and the model output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationStat {
    pub correlation: f64,
    pub p_value: f64,
    pub significant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramData {
    /// Raw outputs; capped to the first N collected in the parallel path.
    pub values: Vec<f64>,
    /// Bin edges, one more than the number of bins.
    pub bins: Vec<f64>,
    pub counts: Vec<u32>,
}

/// Aggregate statistics of one Monte Carlo run. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Successful evaluations; may be below `requested_iterations`.
    pub iterations: usize,
    pub requested_iterations: usize,
    pub skipped_iterations: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub percentiles: BTreeMap<String, f64>,
    /// Values at the lowest and highest requested confidence level. Only a
    /// 90% interval when 0.05 and 0.95 are the extremes requested.
    #[serde(rename = "confidence_interval_90")]
    pub requested_bounds_interval: (f64, f64),
    /// `std_dev / mean`; `+inf` when the mean is exactly zero, written as
    /// the string `"+inf"` since JSON has no infinity.
    #[serde(with = "extended_f64_serde")]
    pub coefficient_of_variation: f64,
    pub correlations: BTreeMap<String, CorrelationStat>,
    pub histogram_data: HistogramData,
    pub execution: ExecutionSummary,
}

/// Finite values as numbers, non-finite ones as `"+inf"`, `"-inf"` or `"NaN"`.
mod extended_f64_serde {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if *value > 0.0 {
            serializer.serialize_str("+inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(v),
            Repr::Text(t) => match t.as_str() {
                "+inf" | "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                "NaN" => Ok(f64::NAN),
                other => Err(D::Error::custom(format!("expected a number or +inf/-inf/NaN, got '{other}'"))),
            },
        }
    }
}
