use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::EstimateError;
use crate::types::{round_money, with_metadata, ComputationOutput, Money, Rate};
use crate::EstimateResult;

/// Input for a standalone construction-period interest calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructionInterestInput {
    /// Construction investment (part E) the loan ratio applies to
    pub construction_investment: Money,
    pub construction_years: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loan_ratio: Option<Rate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loan_amount_override: Option<Money>,
    #[serde(default)]
    pub annual_loan_rate: Rate,
}

/// One construction year of the drawdown schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanYear {
    pub year: u32,
    /// Principal drawn before this year
    pub opening_principal: Money,
    pub drawdown: Money,
    pub interest: Money,
    pub closing_principal: Money,
}

/// Part F: capitalized construction-period interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructionInterest {
    pub loan_amount: Money,
    pub annual_rate: Rate,
    pub schedule: Vec<LoanYear>,
    pub total_interest: Money,
}

/// Compute the drawdown schedule and simple interest over the construction period.
///
/// Interest for a year is charged on everything drawn before it plus half of
/// that year's drawdown (mid-year convention). Interest is not compounded.
pub fn construction_interest(
    input: &ConstructionInterestInput,
) -> EstimateResult<ComputationOutput<ConstructionInterest>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_interest_input(input)?;

    let loan_amount = resolve_loan_amount(
        input.construction_investment,
        input.loan_ratio,
        input.loan_amount_override,
    );
    if input.loan_ratio.is_none() && input.loan_amount_override.is_none() {
        warnings.push(
            "No loan ratio or loan amount given; no construction interest accrues".into(),
        );
    }
    if input.loan_amount_override.is_some() && input.loan_ratio.is_some() {
        warnings.push("Loan amount override takes precedence over loan ratio".into());
    }
    if loan_amount > input.construction_investment {
        warnings.push(format!(
            "Loan amount {loan_amount} exceeds construction investment {}",
            input.construction_investment
        ));
    }

    let interest = interest_schedule(loan_amount, input.construction_years, input.annual_loan_rate);

    let loan_basis = if input.loan_amount_override.is_some() {
        "override"
    } else {
        "ratio of construction investment"
    };
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Construction-period interest: front-loaded drawdowns, mid-year simple interest",
        &serde_json::json!({
            "construction_years": input.construction_years,
            "annual_loan_rate": input.annual_loan_rate.to_string(),
            "loan_basis": loan_basis,
        }),
        warnings,
        elapsed,
        interest,
    ))
}

fn validate_interest_input(input: &ConstructionInterestInput) -> EstimateResult<()> {
    if input.construction_investment < Decimal::ZERO {
        return Err(EstimateError::invalid(
            "construction_investment",
            "cannot be negative",
        ));
    }
    if input.construction_years == 0 {
        return Err(EstimateError::invalid(
            "construction_years",
            "must be at least 1",
        ));
    }
    if let Some(ratio) = input.loan_ratio {
        if ratio < Decimal::ZERO || ratio > Decimal::ONE {
            return Err(EstimateError::invalid(
                "loan_ratio",
                format!("must be between 0 and 1, got {ratio}"),
            ));
        }
    }
    if input.loan_amount_override.is_some_and(|a| a < Decimal::ZERO) {
        return Err(EstimateError::invalid(
            "loan_amount_override",
            "cannot be negative",
        ));
    }
    if input.annual_loan_rate < Decimal::ZERO {
        return Err(EstimateError::invalid(
            "annual_loan_rate",
            "cannot be negative",
        ));
    }
    Ok(())
}

/// The override if present, else `ratio × basis` rounded down; zero when
/// neither is given.
pub fn resolve_loan_amount(
    basis: Money,
    ratio: Option<Rate>,
    override_amount: Option<Money>,
) -> Money {
    match (override_amount, ratio) {
        (Some(amount), _) => amount,
        (None, Some(ratio)) => round_loan_amount(basis * ratio),
        (None, None) => Decimal::ZERO,
    }
}

/// Round down to the nearest 1 000 from 10 000 upward, else to the nearest 100.
pub fn round_loan_amount(amount: Money) -> Money {
    if amount <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let step = if amount >= dec!(10000) {
        dec!(1000)
    } else {
        dec!(100)
    };
    (amount / step).floor() * step
}

/// Split `total` across `years`: every year but the last draws the rounded
/// average, the last draws what is left. Never draws more than remains.
pub fn distribute_drawdowns(total: Money, years: u32) -> Vec<Money> {
    if years == 0 {
        return Vec::new();
    }
    let average = (total / Decimal::from(years))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    let mut remaining = total;
    let mut draws = Vec::with_capacity(years as usize);
    for _ in 1..years {
        let draw = average.min(remaining).max(Decimal::ZERO);
        draws.push(draw);
        remaining -= draw;
    }
    draws.push(remaining.max(Decimal::ZERO));
    draws
}

pub(crate) fn interest_schedule(
    loan_amount: Money,
    years: u32,
    rate: Rate,
) -> ConstructionInterest {
    let mut opening = Decimal::ZERO;
    let mut schedule = Vec::with_capacity(years as usize);
    let two = dec!(2);

    for (i, drawdown) in distribute_drawdowns(loan_amount, years).into_iter().enumerate() {
        let interest = round_money((opening + drawdown / two) * rate);
        let closing = opening + drawdown;
        schedule.push(LoanYear {
            year: i as u32 + 1,
            opening_principal: opening,
            drawdown,
            interest,
            closing_principal: closing,
        });
        opening = closing;
    }

    ConstructionInterest {
        loan_amount,
        annual_rate: rate,
        total_interest: schedule.iter().map(|y| y.interest).sum(),
        schedule,
    }
}
