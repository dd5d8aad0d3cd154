use std::collections::BTreeMap;

use statrs::distribution::{ContinuousCDF, StudentsT};

use super::result::{CorrelationStat, ExecutionSummary, HistogramData, SimulationResult};
use crate::error::ScenarioError;
use crate::ScenarioResult;

const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// Everything the aggregator needs besides the raw outputs.
pub struct SummaryOptions<'a> {
    pub confidence_levels: &'a [f64],
    pub requested_iterations: usize,
    pub histogram_bins: usize,
    /// Cap on raw values echoed back with the histogram.
    pub value_cap: Option<usize>,
    /// Per-variable draws aligned with the outputs, when they were kept.
    pub input_samples: Option<&'a BTreeMap<String, Vec<f64>>>,
    pub execution: ExecutionSummary,
}

/// Compute the percentile value from a **sorted** slice using linear interpolation.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    assert!(!sorted.is_empty());
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

/// `p5`, `p50`, `p95`, ... for a level given as a fraction.
pub fn percentile_label(level: f64) -> String {
    format!("p{}", (level * 100.0).round() as u32)
}

/// Equal-width histogram over the full range of `values`.
///
/// A constant sample gets a unit-wide range centred on the value.
pub fn build_histogram(values: &[f64], num_bins: usize) -> (Vec<f64>, Vec<u32>) {
    if values.is_empty() || num_bins == 0 {
        return (Vec::new(), Vec::new());
    }
    let mut min_val = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut max_val = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max_val - min_val < f64::EPSILON {
        min_val -= 0.5;
        max_val += 0.5;
    }

    let bin_width = (max_val - min_val) / num_bins as f64;
    let mut edges: Vec<f64> = (0..num_bins)
        .map(|i| min_val + i as f64 * bin_width)
        .collect();
    edges.push(max_val);

    let mut counts = vec![0u32; num_bins];
    for &val in values {
        let mut idx = ((val - min_val) / bin_width).floor() as usize;
        if idx >= num_bins {
            idx = num_bins - 1;
        }
        counts[idx] += 1;
    }
    (edges, counts)
}

/// Pearson correlation with a two-sided p-value from Student's t.
///
/// Degenerate inputs (fewer than three points, or a constant series) report
/// no correlation rather than NaN.
pub fn pearson(x: &[f64], y: &[f64]) -> CorrelationStat {
    let none = CorrelationStat {
        correlation: 0.0,
        p_value: 1.0,
        significant: false,
    };
    let n = x.len().min(y.len());
    if n < 3 {
        return none;
    }
    let nf = n as f64;
    let mean_x = x[..n].iter().sum::<f64>() / nf;
    let mean_y = y[..n].iter().sum::<f64>() / nf;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x[..n].iter().zip(&y[..n]) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return none;
    }

    let r = (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0);
    let dof = nf - 2.0;
    let p_value = if (1.0 - r.abs()) < 1e-15 {
        0.0
    } else {
        let t = r * (dof / (1.0 - r * r)).sqrt();
        match StudentsT::new(0.0, 1.0, dof) {
            Ok(dist) => (2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0),
            Err(_) => 1.0,
        }
    };

    CorrelationStat {
        correlation: r,
        p_value,
        significant: p_value < SIGNIFICANCE_LEVEL,
    }
}

/// Reject levels outside `[0, 1]` and return them sorted ascending.
pub fn normalize_levels(levels: &[f64]) -> ScenarioResult<Vec<f64>> {
    if levels.is_empty() {
        return Err(ScenarioError::InvalidInput {
            field: "confidence_levels".into(),
            reason: "At least one confidence level is required".into(),
        });
    }
    if let Some(bad) = levels.iter().find(|l| !(0.0..=1.0).contains(*l)) {
        return Err(ScenarioError::InvalidInput {
            field: "confidence_levels".into(),
            reason: format!("Levels are fractions in [0, 1], got {bad}"),
        });
    }
    let mut sorted = levels.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Ok(sorted)
}

/// Aggregate the successful model outputs of one run.
pub fn summarize(results: &[f64], opts: SummaryOptions<'_>) -> ScenarioResult<SimulationResult> {
    if results.is_empty() {
        return Err(ScenarioError::InsufficientData(format!(
            "No successful evaluations out of {} requested iterations",
            opts.requested_iterations
        )));
    }
    let levels = normalize_levels(opts.confidence_levels)?;

    let mut sorted = results.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len() as f64;

    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    // A constant sample must report its value exactly, not a rounded sum.
    let mean = if min == max {
        min
    } else {
        sorted.iter().sum::<f64>() / n
    };
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();
    let median = percentile_sorted(&sorted, 50.0);

    let percentiles: BTreeMap<String, f64> = levels
        .iter()
        .map(|&l| (percentile_label(l), percentile_sorted(&sorted, l * 100.0)))
        .collect();

    let first = levels[0];
    let last = levels[levels.len() - 1];
    let requested_bounds_interval = (
        percentile_sorted(&sorted, first * 100.0),
        percentile_sorted(&sorted, last * 100.0),
    );

    let coefficient_of_variation = if mean == 0.0 {
        f64::INFINITY
    } else {
        std_dev / mean
    };

    let correlations = match opts.input_samples {
        Some(samples) if opts.execution.supports_correlation => samples
            .iter()
            .map(|(name, draws)| (name.clone(), pearson(draws, results)))
            .collect(),
        _ => BTreeMap::new(),
    };

    let (bins, counts) = build_histogram(results, opts.histogram_bins);
    let values = match opts.value_cap {
        Some(cap) => results.iter().take(cap).copied().collect(),
        None => results.to_vec(),
    };

    Ok(SimulationResult {
        iterations: results.len(),
        requested_iterations: opts.requested_iterations,
        skipped_iterations: opts.requested_iterations.saturating_sub(results.len()),
        mean,
        std_dev,
        min,
        max,
        median,
        percentiles,
        requested_bounds_interval,
        coefficient_of_variation,
        correlations,
        histogram_data: HistogramData {
            values,
            bins,
            counts,
        },
        execution: opts.execution,
    })
}
