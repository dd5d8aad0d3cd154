use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ScenarioError;
use crate::simulation::{param, ScenarioModel};
use crate::time_value::{level_irr, level_npv};
use crate::types::{Money, ParameterSet};
use crate::ScenarioResult;

const INVESTMENT: &str = "initial_investment";
const CASH_FLOW: &str = "annual_cash_flow";
const YEARS: &str = "years";
const DISCOUNT_RATE: &str = "discount_rate";

/// Investment calculators that can be driven by a Monte Carlo run or a
/// sensitivity sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuiltinModel {
    /// Total return over the horizon as a percentage of the outlay.
    Roi,
    /// Net present value of level annual cash flows.
    Npv,
    /// Internal rate of return, in percent.
    Irr,
    /// Years until cumulative inflows cover the outlay.
    Payback,
}

/// Listing entry for a built-in model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub required_parameters: Vec<&'static str>,
}

impl BuiltinModel {
    pub const ALL: [BuiltinModel; 4] = [
        BuiltinModel::Roi,
        BuiltinModel::Npv,
        BuiltinModel::Irr,
        BuiltinModel::Payback,
    ];

    /// Case-insensitive lookup.
    pub fn from_name(name: &str) -> ScenarioResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "roi" => Ok(BuiltinModel::Roi),
            "npv" => Ok(BuiltinModel::Npv),
            "irr" => Ok(BuiltinModel::Irr),
            "payback" => Ok(BuiltinModel::Payback),
            other => Err(ScenarioError::InvalidInput {
                field: "model".into(),
                reason: format!("Unknown model '{other}'; expected one of roi, npv, irr, payback"),
            }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BuiltinModel::Roi => "roi",
            BuiltinModel::Npv => "npv",
            BuiltinModel::Irr => "irr",
            BuiltinModel::Payback => "payback",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            BuiltinModel::Roi => "Return on investment over the horizon (%)",
            BuiltinModel::Npv => "Net present value of level annual cash flows",
            BuiltinModel::Irr => "Internal rate of return of level annual cash flows (%)",
            BuiltinModel::Payback => "Simple payback period (years)",
        }
    }

    pub fn required_parameters(self) -> Vec<&'static str> {
        match self {
            BuiltinModel::Roi | BuiltinModel::Irr => vec![INVESTMENT, CASH_FLOW, YEARS],
            BuiltinModel::Npv => vec![INVESTMENT, CASH_FLOW, YEARS, DISCOUNT_RATE],
            BuiltinModel::Payback => vec![INVESTMENT, CASH_FLOW],
        }
    }

    pub fn info(self) -> ModelInfo {
        ModelInfo {
            name: self.name(),
            description: self.description(),
            required_parameters: self.required_parameters(),
        }
    }
}

impl ScenarioModel for BuiltinModel {
    fn evaluate(&self, params: &ParameterSet) -> ScenarioResult<f64> {
        match self {
            BuiltinModel::Roi => roi(params),
            BuiltinModel::Npv => npv_model(params),
            BuiltinModel::Irr => irr_model(params),
            BuiltinModel::Payback => payback(params),
        }
    }
}

fn positive_investment(params: &ParameterSet) -> ScenarioResult<f64> {
    let investment = param(params, INVESTMENT)?;
    if investment <= 0.0 {
        return Err(ScenarioError::DivisionByZero {
            context: format!("{INVESTMENT} must be positive, got {investment}"),
        });
    }
    Ok(investment)
}

fn horizon(params: &ParameterSet) -> ScenarioResult<u32> {
    let years = param(params, YEARS)?.round();
    if !(1.0..=200.0).contains(&years) {
        return Err(ScenarioError::ModelEvaluation(format!(
            "{YEARS} must be between 1 and 200, got {years}"
        )));
    }
    Ok(years as u32)
}

fn to_decimal(name: &str, value: f64) -> ScenarioResult<Decimal> {
    Decimal::from_f64(value).ok_or_else(|| {
        ScenarioError::ModelEvaluation(format!("{name} is not representable as a decimal: {value}"))
    })
}

fn to_f64(name: &str, value: Decimal) -> ScenarioResult<f64> {
    value
        .to_f64()
        .ok_or_else(|| ScenarioError::ModelEvaluation(format!("{name} overflowed f64")))
}

/// Outlay, annual inflow and horizon as decimals.
fn level_terms(params: &ParameterSet) -> ScenarioResult<(Money, Money, u32)> {
    let investment = to_decimal(INVESTMENT, positive_investment(params)?)?;
    let annual = to_decimal(CASH_FLOW, param(params, CASH_FLOW)?)?;
    Ok((investment, annual, horizon(params)?))
}

fn roi(params: &ParameterSet) -> ScenarioResult<f64> {
    let investment = positive_investment(params)?;
    let total = param(params, CASH_FLOW)? * f64::from(horizon(params)?);
    Ok((total - investment) / investment * 100.0)
}

fn npv_model(params: &ParameterSet) -> ScenarioResult<f64> {
    let rate = to_decimal(DISCOUNT_RATE, param(params, DISCOUNT_RATE)?)?;
    let (investment, annual, years) = level_terms(params)?;
    to_f64("npv", level_npv(rate, investment, annual, years)?)
}

fn irr_model(params: &ParameterSet) -> ScenarioResult<f64> {
    let (investment, annual, years) = level_terms(params)?;
    to_f64("irr", level_irr(investment, annual, years)? * dec!(100))
}

fn payback(params: &ParameterSet) -> ScenarioResult<f64> {
    let investment = positive_investment(params)?;
    let annual = param(params, CASH_FLOW)?;
    if annual <= 0.0 {
        return Err(ScenarioError::ModelEvaluation(format!(
            "payback never reached with {CASH_FLOW} = {annual}"
        )));
    }
    Ok(investment / annual)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, f64)]) -> ParameterSet {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn project() -> ParameterSet {
        params(&[
            (INVESTMENT, 1000.0),
            (CASH_FLOW, 300.0),
            (YEARS, 5.0),
            (DISCOUNT_RATE, 0.10),
        ])
    }

    #[test]
    fn test_from_name_is_case_insensitive() {
        assert_eq!(BuiltinModel::from_name("NPV").unwrap(), BuiltinModel::Npv);
        assert_eq!(BuiltinModel::from_name(" Payback ").unwrap(), BuiltinModel::Payback);
        assert!(BuiltinModel::from_name("wacc").is_err());
    }

    #[test]
    fn test_roi() {
        let v = BuiltinModel::Roi.evaluate(&project()).unwrap();
        assert!((v - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_npv_matches_annuity() {
        let v = BuiltinModel::Npv.evaluate(&project()).unwrap();
        // 300 * (1 - 1.1^-5) / 0.1 - 1000
        assert!((v - 137.236).abs() < 0.01, "npv = {v}");
    }

    #[test]
    fn test_irr_zeroes_npv() {
        let v = BuiltinModel::Irr.evaluate(&project()).unwrap();
        // 15.24% for 1000 out, 5 x 300 in
        assert!((v - 15.24).abs() < 0.01, "irr = {v}");
    }

    #[test]
    fn test_npv_long_horizon_does_not_overflow() {
        let p = params(&[
            (INVESTMENT, 1.0),
            (CASH_FLOW, 300.0),
            (YEARS, 200.0),
            (DISCOUNT_RATE, 0.5),
        ]);
        // perpetuity limit: 300 / 0.5 - 1
        let v = BuiltinModel::Npv.evaluate(&p).unwrap();
        assert!((v - 599.0).abs() < 1e-6, "npv = {v}");
    }

    #[test]
    fn test_npv_rate_near_minus_one_is_an_error() {
        let mut p = project();
        p.insert(YEARS.into(), 200.0);
        p.insert(DISCOUNT_RATE.into(), -0.99);
        assert!(matches!(
            BuiltinModel::Npv.evaluate(&p),
            Err(ScenarioError::ModelEvaluation(_))
        ));
    }

    #[test]
    fn test_irr_beyond_search_range_is_an_error() {
        let p = params(&[(INVESTMENT, 1.0), (CASH_FLOW, 1000.0), (YEARS, 30.0)]);
        assert!(matches!(
            BuiltinModel::Irr.evaluate(&p),
            Err(ScenarioError::ConvergenceFailure { .. })
        ));
    }

    #[test]
    fn test_payback() {
        let v = BuiltinModel::Payback.evaluate(&project()).unwrap();
        assert!((v - 1000.0 / 300.0).abs() < 1e-12);
    }

    #[test]
    fn test_payback_requires_inflows() {
        let mut p = project();
        p.insert(CASH_FLOW.into(), 0.0);
        assert!(BuiltinModel::Payback.evaluate(&p).is_err());
    }

    #[test]
    fn test_missing_parameter() {
        let p = params(&[(INVESTMENT, 1000.0)]);
        match BuiltinModel::Roi.evaluate(&p) {
            Err(ScenarioError::MissingParameter(name)) => assert_eq!(name, CASH_FLOW),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_required_parameters_cover_evaluation() {
        for model in BuiltinModel::ALL {
            let p: ParameterSet = model
                .required_parameters()
                .into_iter()
                .map(|k| (k.to_string(), project()[k]))
                .collect();
            assert!(model.evaluate(&p).is_ok(), "{} failed", model.name());
        }
    }
}
