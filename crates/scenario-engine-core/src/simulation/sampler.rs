use rand::Rng;
use statrs::distribution::{Normal, Triangular, Uniform};

use super::variable::{Distribution, ScenarioVariable};
use crate::error::ScenarioError;
use crate::ScenarioResult;

fn invalid(variable: &ScenarioVariable, reason: impl Into<String>) -> ScenarioError {
    ScenarioError::InvalidDistribution {
        variable: variable.name.clone(),
        reason: reason.into(),
    }
}

/// Check the variable's parameters without drawing from it.
///
/// Only parameters the underlying distributions cannot represent are
/// rejected; a base value outside the bounds is the caller's concern.
pub fn validate_variable(variable: &ScenarioVariable) -> ScenarioResult<()> {
    match variable.distribution {
        Distribution::Normal => {
            let sd = variable.effective_std_dev();
            if !sd.is_finite() || sd < 0.0 {
                return Err(invalid(variable, format!("std_dev must be >= 0, got {sd}")));
            }
        }
        Distribution::Triangular => {
            let mode = variable.effective_mode();
            if variable.min_value > mode || mode > variable.max_value {
                return Err(invalid(
                    variable,
                    format!(
                        "triangular requires min <= mode <= max (min={}, mode={mode}, max={})",
                        variable.min_value, variable.max_value
                    ),
                ));
            }
        }
        Distribution::Uniform | Distribution::Unknown => {}
    }
    Ok(())
}

/// Clip into `[lo, hi]`; with inverted bounds the upper bound wins.
fn clip(x: f64, lo: f64, hi: f64) -> f64 {
    x.max(lo).min(hi)
}

/// Draw one value for `variable`.
///
/// Normal draws are clipped into `[min_value, max_value]`, so the tails pile
/// up on the bounds rather than following a true Gaussian. Unknown
/// distributions return `base_value` without touching the RNG.
pub fn sample<R: Rng + ?Sized>(variable: &ScenarioVariable, rng: &mut R) -> ScenarioResult<f64> {
    validate_variable(variable)?;
    let (lo, hi) = (variable.min_value, variable.max_value);

    match variable.distribution {
        Distribution::Normal => {
            let sd = variable.effective_std_dev();
            if sd == 0.0 {
                return Ok(clip(variable.base_value, lo, hi));
            }
            let n = Normal::new(variable.base_value, sd)
                .map_err(|e| invalid(variable, format!("Invalid Normal parameters: {e}")))?;
            Ok(clip(rng.sample(n), lo, hi))
        }
        Distribution::Uniform => {
            if lo == hi {
                return Ok(lo);
            }
            let u = Uniform::new(lo.min(hi), lo.max(hi))
                .map_err(|e| invalid(variable, format!("Invalid Uniform parameters: {e}")))?;
            Ok(rng.sample(u))
        }
        Distribution::Triangular => {
            if lo == hi {
                return Ok(lo);
            }
            let t = Triangular::new(lo, hi, variable.effective_mode())
                .map_err(|e| invalid(variable, format!("Invalid Triangular parameters: {e}")))?;
            Ok(rng.sample(t))
        }
        Distribution::Unknown => Ok(variable.base_value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SEED: u64 = 42;

    fn draw_many(v: &ScenarioVariable, n: usize) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(SEED);
        (0..n).map(|_| sample(v, &mut rng).unwrap()).collect()
    }

    #[test]
    fn test_uniform_mean_and_bounds() {
        let v = ScenarioVariable::new("rate", 0.05, 0.03, 0.07, Distribution::Uniform);
        let xs = draw_many(&v, 10_000);
        let mean = xs.iter().sum::<f64>() / xs.len() as f64;
        let expected = (0.03 + 0.07) / 2.0;
        assert!(((mean - expected) / expected).abs() < 0.02, "mean={mean}");
        assert!(xs.iter().all(|x| (0.03..=0.07).contains(x)));
    }

    #[test]
    fn test_normal_is_clipped_into_bounds() {
        // std_dev far wider than the bounds forces frequent clipping
        let v = ScenarioVariable::new("x", 10.0, 9.0, 11.0, Distribution::Normal).with_std_dev(5.0);
        let xs = draw_many(&v, 10_000);
        assert!(xs.iter().all(|x| (9.0..=11.0).contains(x)));
        assert!(xs.iter().any(|&x| x == 9.0));
        assert!(xs.iter().any(|&x| x == 11.0));
    }

    #[test]
    fn test_normal_default_std_dev() {
        let v = ScenarioVariable::new("x", 100.0, 60.0, 140.0, Distribution::Normal);
        let xs = draw_many(&v, 20_000);
        let mean = xs.iter().sum::<f64>() / xs.len() as f64;
        assert!((mean - 100.0).abs() < 0.5, "mean={mean}");
    }

    #[test]
    fn test_normal_zero_std_dev_returns_base() {
        let v = ScenarioVariable::new("x", 5.0, 0.0, 10.0, Distribution::Normal).with_std_dev(0.0);
        assert!(draw_many(&v, 10).iter().all(|&x| x == 5.0));
    }

    #[test]
    fn test_triangular_mean() {
        let v = ScenarioVariable::new("growth", 0.05, 0.0, 0.10, Distribution::Triangular);
        let xs = draw_many(&v, 10_000);
        let mean = xs.iter().sum::<f64>() / xs.len() as f64;
        let expected = (0.0 + 0.05 + 0.10) / 3.0;
        assert!((mean - expected).abs() < 0.005, "mean={mean}");
        assert!(xs.iter().all(|x| (0.0..=0.10).contains(x)));
    }

    #[test]
    fn test_triangular_mode_outside_bounds_is_an_error() {
        let v = ScenarioVariable::new("x", 5.0, 0.0, 10.0, Distribution::Triangular).with_mode(12.0);
        let mut rng = StdRng::seed_from_u64(SEED);
        let err = sample(&v, &mut rng).unwrap_err();
        assert!(matches!(err, ScenarioError::InvalidDistribution { .. }));
    }

    #[test]
    fn test_unknown_distribution_returns_base_value() {
        let v = ScenarioVariable::new("x", 7.5, 0.0, 10.0, Distribution::Unknown);
        assert!(draw_many(&v, 100).iter().all(|&x| x == 7.5));
    }

    #[test]
    fn test_unknown_distribution_does_not_advance_rng() {
        let v = ScenarioVariable::new("x", 7.5, 0.0, 10.0, Distribution::Unknown);
        let mut a = StdRng::seed_from_u64(SEED);
        let mut b = StdRng::seed_from_u64(SEED);
        sample(&v, &mut a).unwrap();
        assert_eq!(a.gen::<u64>(), b.gen::<u64>());
    }

    #[test]
    fn test_degenerate_uniform() {
        let v = ScenarioVariable::new("x", 3.0, 3.0, 3.0, Distribution::Uniform);
        assert!(draw_many(&v, 5).iter().all(|&x| x == 3.0));
    }

    #[test]
    fn test_inverted_bounds_do_not_panic() {
        let v = ScenarioVariable::new("x", 3.0, 5.0, 1.0, Distribution::Uniform);
        assert!(draw_many(&v, 100).iter().all(|x| (1.0..=5.0).contains(x)));
        let n = ScenarioVariable::new("y", 3.0, 5.0, 1.0, Distribution::Normal).with_std_dev(1.0);
        assert!(draw_many(&n, 100).iter().all(|&x| x == 1.0));
    }

    #[test]
    fn test_negative_std_dev_rejected() {
        let v = ScenarioVariable::new("x", 3.0, 0.0, 5.0, Distribution::Normal).with_std_dev(-1.0);
        assert!(validate_variable(&v).is_err());
    }
}
