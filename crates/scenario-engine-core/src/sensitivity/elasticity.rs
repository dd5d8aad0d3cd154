use serde::{Deserialize, Serialize};

/// Estimator used to turn a sweep into a single elasticity figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElasticityMethod {
    /// Least-squares slope of output % change on input % change. Signed.
    Regression,
    /// Output % spread over input % spread. Unsigned, and only equal to the
    /// regression slope for monotone linear responses.
    RangeApprox,
}

/// Least-squares slope of `y` on `x`; zero when `x` has no spread.
pub fn linear_slope(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let nf = n as f64;
    let mean_x = x[..n].iter().sum::<f64>() / nf;
    let mean_y = y[..n].iter().sum::<f64>() / nf;
    let (sxy, sxx) = x[..n]
        .iter()
        .zip(&y[..n])
        .fold((0.0, 0.0), |(sxy, sxx), (a, b)| {
            let dx = a - mean_x;
            (sxy + dx * (b - mean_y), sxx + dx * dx)
        });
    if sxx.abs() < f64::EPSILON {
        0.0
    } else {
        sxy / sxx
    }
}

pub fn elasticity_regression(pct_in: &[f64], pct_out: &[f64]) -> f64 {
    linear_slope(pct_in, pct_out)
}

pub fn elasticity_range_approx(pct_in: &[f64], pct_out: &[f64]) -> f64 {
    let spread = |xs: &[f64]| {
        let lo = xs.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        hi - lo
    };
    if pct_in.is_empty() || pct_out.is_empty() {
        return 0.0;
    }
    let input_spread = spread(pct_in);
    if input_spread.abs() < f64::EPSILON {
        return 0.0;
    }
    spread(pct_out) / input_spread
}

impl ElasticityMethod {
    pub fn estimate(self, pct_in: &[f64], pct_out: &[f64]) -> f64 {
        match self {
            ElasticityMethod::Regression => elasticity_regression(pct_in, pct_out),
            ElasticityMethod::RangeApprox => elasticity_range_approx(pct_in, pct_out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slope_of_line() {
        let x = [-20.0, -10.0, 0.0, 10.0, 20.0];
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v).collect();
        assert!((linear_slope(&x, &y) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_input_spread_gives_zero() {
        let x = [0.0; 5];
        let y = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(elasticity_regression(&x, &y), 0.0);
        assert_eq!(elasticity_range_approx(&x, &y), 0.0);
    }

    #[test]
    fn test_estimators_diverge_on_sign() {
        let x = [-10.0, 0.0, 10.0];
        let y = [10.0, 0.0, -10.0];
        assert!((ElasticityMethod::Regression.estimate(&x, &y) + 1.0).abs() < 1e-12);
        assert!((ElasticityMethod::RangeApprox.estimate(&x, &y) - 1.0).abs() < 1e-12);
    }
}
