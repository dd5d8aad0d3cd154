//! Decimal present-value math for an up-front outlay followed by equal
//! annual inflows. Every operation is checked: an input that would overflow
//! `Decimal` comes back as an error instead of a panic.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::ScenarioError;
use crate::types::{Money, Rate};
use crate::ScenarioResult;

/// IRR search bracket.
const LOWEST_RATE: Rate = dec!(-0.99);
const HIGHEST_RATE: Rate = dec!(100);
const IRR_TOLERANCE: Decimal = dec!(0.0000000001);
const MAX_IRR_ITERATIONS: u32 = 200;

fn overflow(what: &str, rate: Rate, years: u32) -> ScenarioError {
    ScenarioError::ModelEvaluation(format!(
        "{what} overflowed at rate {rate} over {years} years"
    ))
}

/// `sum(v^t, t = 1..=years)` with `v = 1 / (1 + rate)`, or `None` when the
/// terms grow past what `Decimal` can hold.
///
/// Terms that shrink below `Decimal` precision end the sum early.
fn checked_annuity_factor(rate: Rate, years: u32) -> Option<Decimal> {
    let v = Decimal::ONE.checked_div(Decimal::ONE.checked_add(rate)?)?;
    let mut term = Decimal::ONE;
    let mut total = Decimal::ZERO;
    for _ in 0..years {
        term = match term.checked_mul(v) {
            Some(next) => next,
            None if v < Decimal::ONE => break,
            None => return None,
        };
        if term.is_zero() {
            break;
        }
        total = total.checked_add(term)?;
    }
    Some(total)
}

/// Present value of 1 received at the end of each of `years` years.
pub fn annuity_factor(rate: Rate, years: u32) -> ScenarioResult<Decimal> {
    if rate <= dec!(-1) {
        return Err(ScenarioError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }
    checked_annuity_factor(rate, years).ok_or_else(|| overflow("annuity factor", rate, years))
}

/// NPV of `-investment` now and `annual_cash_flow` at the end of each year.
pub fn level_npv(
    rate: Rate,
    investment: Money,
    annual_cash_flow: Money,
    years: u32,
) -> ScenarioResult<Money> {
    let factor = annuity_factor(rate, years)?;
    annual_cash_flow
        .checked_mul(factor)
        .and_then(|pv| pv.checked_sub(investment))
        .ok_or_else(|| overflow("NPV", rate, years))
}

/// Rate at which [`level_npv`] is zero, found by bisection on the annuity
/// factor, which falls monotonically as the rate rises.
///
/// Only rates in `[-99%, 10000%]` are searched; a root outside that range
/// is a `ConvergenceFailure`.
pub fn level_irr(investment: Money, annual_cash_flow: Money, years: u32) -> ScenarioResult<Rate> {
    if investment <= Decimal::ZERO || years == 0 {
        return Err(ScenarioError::InvalidInput {
            field: "investment".into(),
            reason: "IRR needs a positive outlay and at least one inflow".into(),
        });
    }
    if annual_cash_flow <= Decimal::ZERO {
        return Err(ScenarioError::ConvergenceFailure {
            function: "IRR".into(),
            iterations: 0,
            last_delta: -investment,
        });
    }
    let target = investment
        .checked_div(annual_cash_flow)
        .ok_or_else(|| ScenarioError::DivisionByZero {
            context: "IRR payback multiple".into(),
        })?;

    // Overflow means the factor is far above any finite target.
    let above_target = |rate: Rate| checked_annuity_factor(rate, years).map_or(true, |f| f > target);

    let root_above = above_target(HIGHEST_RATE);
    if root_above || !above_target(LOWEST_RATE) {
        let edge = if root_above { HIGHEST_RATE } else { LOWEST_RATE };
        return Err(ScenarioError::ConvergenceFailure {
            function: "IRR".into(),
            iterations: 0,
            last_delta: level_npv(edge, investment, annual_cash_flow, years).unwrap_or(Decimal::MAX),
        });
    }

    let (mut lo, mut hi) = (LOWEST_RATE, HIGHEST_RATE);
    for _ in 0..MAX_IRR_ITERATIONS {
        let mid = (lo + hi) / dec!(2);
        if above_target(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < IRR_TOLERANCE {
            return Ok((lo + hi) / dec!(2));
        }
    }

    Err(ScenarioError::ConvergenceFailure {
        function: "IRR".into(),
        iterations: MAX_IRR_ITERATIONS,
        last_delta: hi - lo,
    })
}
