use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tables::{InterpolationTable, ProgressiveSchedule};
use crate::types::Money;

/// Outcome of a bounded fixed-point iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedPoint {
    /// Last computed value (accepted even when the cap was hit)
    pub value: Money,
    /// Rounds actually run
    pub iterations: u32,
    /// Whether the change fell below epsilon before the cap
    pub converged: bool,
    /// Absolute change in the final round
    pub last_delta: Money,
}

/// Fee charged on `base` slice-by-slice through the schedule's brackets.
///
/// Zero or negative bases yield zero. The last bracket is open-ended.
pub fn progressive_fee(base: Money, schedule: &ProgressiveSchedule) -> Money {
    if base <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let last = schedule.brackets.len().saturating_sub(1);
    let mut fee = Decimal::ZERO;
    let mut lower = Decimal::ZERO;

    for (i, bracket) in schedule.brackets.iter().enumerate() {
        let upper = if i == last { None } else { bracket.upper_bound };
        match upper {
            Some(upper) if base > upper => {
                fee += (upper - lower) * bracket.rate;
                lower = upper;
            }
            _ => {
                fee += (base - lower) * bracket.rate;
                break;
            }
        }
    }

    fee
}

/// Straight-line interpolation between the breakpoints bracketing `value`.
///
/// Values at or below the first key read the first fee, values at or above the
/// last key read the last fee. Zero or negative values yield zero.
pub fn interpolate(value: Money, table: &InterpolationTable) -> Money {
    let (first, last) = match (table.points.first(), table.points.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Decimal::ZERO,
    };
    if value <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    if value <= first.key {
        return first.fee;
    }
    if value >= last.key {
        return last.fee;
    }

    for pair in table.points.windows(2) {
        let (lo, hi) = (&pair[0], &pair[1]);
        if value <= hi.key {
            let span = hi.key - lo.key;
            if span.is_zero() {
                return hi.fee;
            }
            return lo.fee + (hi.fee - lo.fee) * (value - lo.key) / span;
        }
    }

    last.fee
}

/// One application of the management-fee recursion:
/// `schedule(total_funding − land_cost − fee)`.
pub fn management_fee_step(
    fee: Money,
    total_funding: Money,
    land_cost: Money,
    schedule: &ProgressiveSchedule,
) -> Money {
    progressive_fee(total_funding - land_cost - fee, schedule)
}

/// Solve `f = schedule(total_funding − land_cost − f)` by bounded iteration.
///
/// Seeds at zero and stops once successive values differ by less than
/// `epsilon`; on hitting `max_iterations` the last value is accepted.
pub fn solve_management_fee(
    total_funding: Money,
    land_cost: Money,
    schedule: &ProgressiveSchedule,
    max_iterations: u32,
    epsilon: Money,
) -> FixedPoint {
    let mut fee = Decimal::ZERO;
    let mut previous = Decimal::ZERO;
    let mut delta = Decimal::ZERO;

    for iteration in 1..=max_iterations {
        fee = management_fee_step(fee, total_funding, land_cost, schedule);
        delta = (fee - previous).abs();
        debug!(iteration, fee = %fee, delta = %delta, "management fee iteration");

        if delta < epsilon {
            return FixedPoint {
                value: fee,
                iterations: iteration,
                converged: true,
                last_delta: delta,
            };
        }
        previous = fee;
    }

    FixedPoint {
        value: fee,
        iterations: max_iterations,
        converged: false,
        last_delta: delta,
    }
}
