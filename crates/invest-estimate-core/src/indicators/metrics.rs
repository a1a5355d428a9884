use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::EstimateError;
use crate::types::{Money, Rate, Years};
use crate::EstimateResult;

const CONVERGENCE_THRESHOLD: Decimal = dec!(0.0000001);
const MAX_IRR_ITERATIONS: u32 = 100;
const MAX_BISECTION_ITERATIONS: u32 = 200;
const MIN_RATE: Rate = dec!(-0.99);
const MAX_RATE: Rate = dec!(10);

/// Default starting rate for the IRR search.
pub const DEFAULT_IRR_GUESS: Rate = dec!(0.1);

/// Rates scanned for a sign change when Newton-Raphson gives up.
const BRACKET_GRID: [Rate; 19] = [
    dec!(-0.99),
    dec!(-0.9),
    dec!(-0.75),
    dec!(-0.5),
    dec!(-0.25),
    dec!(0),
    dec!(0.05),
    dec!(0.1),
    dec!(0.2),
    dec!(0.35),
    dec!(0.5),
    dec!(0.75),
    dec!(1),
    dec!(1.5),
    dec!(2),
    dec!(3),
    dec!(5),
    dec!(7.5),
    dec!(10),
];

/// Internal rate of return, or why there is none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IrrEstimate {
    Computed { rate: Rate, iterations: u32 },
    NotComputable { reason: String },
}

impl IrrEstimate {
    pub fn rate(&self) -> Option<Rate> {
        match self {
            IrrEstimate::Computed { rate, .. } => Some(*rate),
            IrrEstimate::NotComputable { .. } => None,
        }
    }
}

/// Payback period, or the sentinel for a horizon that never recovers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Payback {
    Recovered { years: Years },
    Unrecovered,
}

impl Payback {
    pub fn years(&self) -> Option<Years> {
        match self {
            Payback::Recovered { years } => Some(*years),
            Payback::Unrecovered => None,
        }
    }
}

/// Net Present Value of yearly cash flows, the first flow at t = 1.
pub fn npv(rate: Rate, cash_flows: &[Money]) -> EstimateResult<Money> {
    if rate <= dec!(-1) {
        return Err(EstimateError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;
    let mut result = Decimal::ZERO;

    for (t, cf) in cash_flows.iter().enumerate() {
        discount = discount
            .checked_mul(one_plus_r)
            .ok_or_else(|| EstimateError::InvalidInput {
                field: "rate".into(),
                reason: format!("discount factor overflows at year {}", t + 1),
            })?;
        if discount.is_zero() {
            return Err(EstimateError::DivisionByZero {
                context: format!("NPV discount factor at year {}", t + 1),
            });
        }
        let discounted = cf
            .checked_div(discount)
            .ok_or_else(|| EstimateError::InvalidInput {
                field: "rate".into(),
                reason: format!("discounted flow overflows at year {}", t + 1),
            })?;
        result += discounted;
    }

    Ok(result)
}

/// Discount factor `1 / (1 + rate)^t` for each year t = 1..=n.
pub fn discount_factors(rate: Rate, years: usize) -> EstimateResult<Vec<Decimal>> {
    if rate <= dec!(-1) {
        return Err(EstimateError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }
    let inverse = Decimal::ONE / (Decimal::ONE + rate);
    let mut factor = Decimal::ONE;
    let mut factors = Vec::with_capacity(years);
    for t in 1..=years {
        factor = factor
            .checked_mul(inverse)
            .ok_or_else(|| EstimateError::InvalidInput {
                field: "rate".into(),
                reason: format!("discount factor overflows at year {t}"),
            })?;
        factors.push(factor);
    }
    Ok(factors)
}

/// NPV and dNPV/dr at `rate`, or `None` when a factor overflows.
fn npv_with_derivative(rate: Rate, cash_flows: &[Money]) -> Option<(Money, Money)> {
    let one_plus_r = Decimal::ONE + rate;
    if one_plus_r <= Decimal::ZERO {
        return None;
    }
    let inverse = Decimal::ONE.checked_div(one_plus_r)?;
    let mut factor = Decimal::ONE;
    let mut value = Decimal::ZERO;
    let mut derivative = Decimal::ZERO;

    for (i, cf) in cash_flows.iter().enumerate() {
        let t = Decimal::from(i as u64 + 1);
        factor = factor.checked_mul(inverse)?;
        value = value.checked_add(cf.checked_mul(factor)?)?;
        // d/dr [cf (1+r)^-t] = -t cf (1+r)^-(t+1)
        let term = t.checked_mul(*cf)?.checked_mul(factor)?.checked_mul(inverse)?;
        derivative = derivative.checked_sub(term)?;
    }
    Some((value, derivative))
}

fn has_sign_change(cash_flows: &[Money]) -> bool {
    cash_flows.iter().any(|cf| *cf > Decimal::ZERO)
        && cash_flows.iter().any(|cf| *cf < Decimal::ZERO)
}

/// Internal Rate of Return by Newton-Raphson, falling back to bisection.
///
/// The rate stays within [-0.99, 10]. A result is reported only when the NPV
/// at the rate is within 1e-7 of zero.
pub fn irr(cash_flows: &[Money], guess: Rate) -> IrrEstimate {
    if cash_flows.len() < 2 {
        return IrrEstimate::NotComputable {
            reason: "IRR requires at least 2 cash flows".into(),
        };
    }
    if !has_sign_change(cash_flows) {
        return IrrEstimate::NotComputable {
            reason: "cash flows never change sign".into(),
        };
    }

    let mut rate = guess.max(MIN_RATE).min(MAX_RATE);

    for i in 0..MAX_IRR_ITERATIONS {
        let Some((value, derivative)) = npv_with_derivative(rate, cash_flows) else {
            break;
        };

        if value.abs() <= CONVERGENCE_THRESHOLD {
            return IrrEstimate::Computed {
                rate,
                iterations: i + 1,
            };
        }

        if derivative.is_zero() {
            break;
        }
        let Some(step) = value.checked_div(derivative) else {
            break;
        };

        // Guard against divergence
        let next = (rate - step).max(MIN_RATE).min(MAX_RATE);
        if next == rate {
            break;
        }
        rate = next;
    }

    bisect(cash_flows)
}

fn bisect(cash_flows: &[Money]) -> IrrEstimate {
    let evaluated: Vec<(Rate, Money)> = BRACKET_GRID
        .iter()
        .filter_map(|&r| npv_with_derivative(r, cash_flows).map(|(v, _)| (r, v)))
        .collect();

    let bracket = evaluated.windows(2).find_map(|pair| {
        let ((lo, f_lo), (hi, f_hi)) = (pair[0], pair[1]);
        if f_lo.is_zero() {
            Some((lo, lo, f_lo))
        } else if (f_lo > Decimal::ZERO) != (f_hi > Decimal::ZERO) {
            Some((lo, hi, f_lo))
        } else {
            None
        }
    });

    let Some((mut lo, mut hi, mut f_lo)) = bracket else {
        return IrrEstimate::NotComputable {
            reason: "no root within [-0.99, 10]".into(),
        };
    };

    for i in 0..MAX_BISECTION_ITERATIONS {
        let mid = (lo + hi) / dec!(2);
        let Some((f_mid, _)) = npv_with_derivative(mid, cash_flows) else {
            break;
        };
        if f_mid.abs() <= CONVERGENCE_THRESHOLD {
            return IrrEstimate::Computed {
                rate: mid,
                iterations: MAX_IRR_ITERATIONS + i + 1,
            };
        }
        if mid == lo || mid == hi {
            break;
        }
        if (f_mid > Decimal::ZERO) == (f_lo > Decimal::ZERO) {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }

    IrrEstimate::NotComputable {
        reason: "search did not reach the NPV tolerance".into(),
    }
}

/// Years until the running sum of `cash_flows` first turns non-negative,
/// interpolated within the year it does. Recovery in year 1 counts as 1.
pub fn payback(cash_flows: &[Money]) -> Payback {
    let mut cumulative = Decimal::ZERO;
    for (i, cf) in cash_flows.iter().enumerate() {
        let previous = cumulative;
        cumulative += cf;
        if cumulative >= Decimal::ZERO {
            if i == 0 {
                return Payback::Recovered {
                    years: Decimal::ONE,
                };
            }
            let fraction = if cf.is_zero() {
                Decimal::ZERO
            } else {
                previous.abs() / cf
            };
            return Payback::Recovered {
                years: Decimal::from(i as u64) + fraction,
            };
        }
    }
    Payback::Unrecovered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_npv_discounts_from_year_one() {
        let cfs = vec![dec!(110), dec!(121)];
        let result = npv(dec!(0.10), &cfs).unwrap();
        assert_eq!(result, dec!(200));
    }

    #[test]
    fn test_npv_zero_rate() {
        let cfs = vec![dec!(-100), dec!(50), dec!(50), dec!(50)];
        let result = npv(dec!(0.0), &cfs).unwrap();
        assert_eq!(result, dec!(50));
    }

    #[test]
    fn test_npv_rejects_rate_at_minus_one() {
        assert!(npv(dec!(-1), &[dec!(1)]).is_err());
    }

    #[test]
    fn test_irr_basic() {
        let cfs = vec![dec!(-1000), dec!(400), dec!(400), dec!(400)];
        let rate = irr(&cfs, DEFAULT_IRR_GUESS).rate().unwrap();
        // IRR should be ~9.7%
        assert!((rate - dec!(0.097)).abs() < dec!(0.001), "irr {rate}");
        assert!(npv(rate, &cfs).unwrap().abs() < dec!(0.0001));
    }

    #[test]
    fn test_irr_all_positive_not_computable() {
        let result = irr(&[dec!(10), dec!(20), dec!(30)], DEFAULT_IRR_GUESS);
        assert!(matches!(result, IrrEstimate::NotComputable { .. }));
    }

    #[test]
    fn test_irr_bad_guess_recovers() {
        let cfs = vec![dec!(-1000), dec!(400), dec!(400), dec!(400)];
        let rate = irr(&cfs, dec!(9.5)).rate().unwrap();
        assert!((rate - dec!(0.097)).abs() < dec!(0.001), "irr {rate}");
    }

    #[test]
    fn test_discount_factors() {
        let factors = discount_factors(dec!(0.25), 2).unwrap();
        assert_eq!(factors, vec![dec!(0.8), dec!(0.64)]);
    }

    #[test]
    fn test_payback_interpolates() {
        // cumulative: -100, -50, 50 -> 2 + 50/100
        let years = payback(&[dec!(-100), dec!(50), dec!(100)]).years().unwrap();
        assert_eq!(years, dec!(2.5));
    }

    #[test]
    fn test_payback_first_year() {
        assert_eq!(
            payback(&[dec!(10), dec!(5)]),
            Payback::Recovered {
                years: Decimal::ONE
            }
        );
    }

    #[test]
    fn test_payback_unrecovered() {
        assert_eq!(payback(&[dec!(-100), dec!(20), dec!(30)]), Payback::Unrecovered);
    }
}
