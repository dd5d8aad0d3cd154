use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::sweep::VariableSensitivity;

/// One bar of a tornado chart: how far a single input moves the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TornadoBar {
    pub name: String,
    pub low_output: f64,
    pub high_output: f64,
    pub low_deviation: f64,
    pub high_deviation: f64,
    pub range: f64,
}

/// Bars for every variable with sweep points, widest first.
pub fn tornado_bars(
    base_result: f64,
    variables: &BTreeMap<String, VariableSensitivity>,
) -> Vec<TornadoBar> {
    let mut bars: Vec<TornadoBar> = variables
        .iter()
        .filter(|(_, v)| !v.values.is_empty())
        .map(|(name, v)| {
            let low_output = v.values.iter().map(|p| p.result).fold(f64::INFINITY, f64::min);
            let high_output = v
                .values
                .iter()
                .map(|p| p.result)
                .fold(f64::NEG_INFINITY, f64::max);
            TornadoBar {
                name: name.clone(),
                low_output,
                high_output,
                low_deviation: low_output - base_result,
                high_deviation: high_output - base_result,
                range: high_output - low_output,
            }
        })
        .collect();
    bars.sort_by(|a, b| b.range.total_cmp(&a.range));
    bars
}
