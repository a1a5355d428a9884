use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::EstimateError;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::EstimateResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepaymentMethod {
    /// Level monthly payment (annuity); reported per year
    #[default]
    EqualInstallment,
    /// Level yearly principal, interest on the opening balance
    EqualPrincipal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepaymentInput {
    pub loan_amount: Money,
    pub annual_rate: Rate,
    /// Contractual repayment term in years
    pub term_years: u32,
    /// Operating horizon; rows beyond it are not produced
    pub operation_years: u32,
    #[serde(default)]
    pub method: RepaymentMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepaymentYear {
    pub year: u32,
    pub opening_balance: Money,
    pub interest: Money,
    pub principal: Money,
    pub payment: Money,
    pub closing_balance: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepaymentSchedule {
    pub method: RepaymentMethod,
    pub rows: Vec<RepaymentYear>,
    pub total_interest: Money,
    pub total_payment: Money,
    /// Balance left when the operating horizon ends before the term
    pub outstanding_balance: Money,
}

const MONTHS: u32 = 12;

/// Operating-period repayment schedule for a construction loan.
pub fn repayment_schedule(
    input: &RepaymentInput,
) -> EstimateResult<ComputationOutput<RepaymentSchedule>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_repayment_input(input)?;

    let years = input.term_years.min(input.operation_years);
    let rows = match input.method {
        RepaymentMethod::EqualInstallment => equal_installment(input, years)?,
        RepaymentMethod::EqualPrincipal => equal_principal(input, years),
    };

    let outstanding_balance = rows
        .last()
        .map(|r| r.closing_balance)
        .unwrap_or(input.loan_amount);
    if input.term_years > input.operation_years {
        warnings.push(format!(
            "Term of {} years exceeds the {}-year operating period; {} remains outstanding",
            input.term_years, input.operation_years, outstanding_balance
        ));
    }

    let schedule = RepaymentSchedule {
        method: input.method,
        total_interest: rows.iter().map(|r| r.interest).sum(),
        total_payment: rows.iter().map(|r| r.payment).sum(),
        outstanding_balance,
        rows,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        match input.method {
            RepaymentMethod::EqualInstallment => {
                "Loan repayment: level monthly annuity, aggregated per year"
            }
            RepaymentMethod::EqualPrincipal => "Loan repayment: level yearly principal",
        },
        &serde_json::json!({
            "annual_rate": input.annual_rate.to_string(),
            "term_years": input.term_years,
            "operation_years": input.operation_years,
        }),
        warnings,
        elapsed,
        schedule,
    ))
}

fn validate_repayment_input(input: &RepaymentInput) -> EstimateResult<()> {
    if input.loan_amount < Decimal::ZERO {
        return Err(EstimateError::invalid("loan_amount", "cannot be negative"));
    }
    if input.annual_rate < Decimal::ZERO {
        return Err(EstimateError::invalid("annual_rate", "cannot be negative"));
    }
    if input.term_years == 0 {
        return Err(EstimateError::invalid("term_years", "must be at least 1"));
    }
    if input.operation_years == 0 {
        return Err(EstimateError::invalid(
            "operation_years",
            "must be at least 1",
        ));
    }
    Ok(())
}

fn equal_installment(input: &RepaymentInput, years: u32) -> EstimateResult<Vec<RepaymentYear>> {
    let monthly_rate = input.annual_rate / Decimal::from(MONTHS);
    let months = input.term_years * MONTHS;
    let payment = monthly_payment(input.loan_amount, monthly_rate, months)?;

    let mut balance = input.loan_amount;
    let mut rows = Vec::with_capacity(years as usize);
    for year in 1..=years {
        let opening = balance;
        let mut interest = Decimal::ZERO;
        let mut principal = Decimal::ZERO;
        for month in 1..=MONTHS {
            let month_interest = balance * monthly_rate;
            let is_final = year == input.term_years && month == MONTHS;
            let month_principal = if is_final {
                balance
            } else {
                (payment - month_interest).min(balance)
            };
            interest += month_interest;
            principal += month_principal;
            balance -= month_principal;
        }
        rows.push(RepaymentYear {
            year,
            opening_balance: opening,
            interest,
            principal,
            payment: interest + principal,
            closing_balance: balance,
        });
    }
    Ok(rows)
}

fn monthly_payment(principal: Money, monthly_rate: Rate, months: u32) -> EstimateResult<Money> {
    if monthly_rate.is_zero() {
        return Ok(principal / Decimal::from(months));
    }
    let growth = (Decimal::ONE + monthly_rate)
        .checked_powu(months as u64)
        .ok_or_else(|| EstimateError::invalid("annual_rate", "annuity factor overflows"))?;
    let denominator = growth - Decimal::ONE;
    if denominator.is_zero() {
        return Err(EstimateError::DivisionByZero {
            context: "annuity payment factor".into(),
        });
    }
    Ok(principal * monthly_rate * growth / denominator)
}

fn equal_principal(input: &RepaymentInput, years: u32) -> Vec<RepaymentYear> {
    let level = input.loan_amount / Decimal::from(input.term_years);
    let mut balance = input.loan_amount;
    let mut rows = Vec::with_capacity(years as usize);
    for year in 1..=years {
        let opening = balance;
        let interest = opening * input.annual_rate;
        let principal = if year == input.term_years {
            opening
        } else {
            level.min(opening)
        };
        balance = opening - principal;
        rows.push(RepaymentYear {
            year,
            opening_balance: opening,
            interest,
            principal,
            payment: interest + principal,
            closing_balance: balance,
        });
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn input(method: RepaymentMethod) -> RepaymentInput {
        RepaymentInput {
            loan_amount: dec!(7000),
            annual_rate: dec!(0.049),
            term_years: 10,
            operation_years: 20,
            method,
        }
    }

    #[test]
    fn test_equal_principal_schedule() {
        let out = repayment_schedule(&input(RepaymentMethod::EqualPrincipal)).unwrap();
        let rows = &out.result.rows;
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0].principal, dec!(700));
        assert_eq!(rows[0].interest, dec!(343));
        // year 2 interest on 6300
        assert_eq!(rows[1].interest, dec!(308.7));
        assert_eq!(out.result.outstanding_balance, Decimal::ZERO);
    }

    #[test]
    fn test_equal_installment_clears_balance() {
        let out = repayment_schedule(&input(RepaymentMethod::EqualInstallment)).unwrap();
        let rows = &out.result.rows;
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[9].closing_balance, Decimal::ZERO);
        let principal: Decimal = rows.iter().map(|r| r.principal).sum();
        assert!((principal - dec!(7000)).abs() < dec!(0.0001), "principal {principal}");
        // Level payments: first and middle years pay the same
        assert!((rows[0].payment - rows[5].payment).abs() < dec!(0.0001));
    }

    #[test]
    fn test_zero_rate_installment() {
        let mut zero = input(RepaymentMethod::EqualInstallment);
        zero.annual_rate = Decimal::ZERO;
        let out = repayment_schedule(&zero).unwrap();
        assert_eq!(out.result.total_interest, Decimal::ZERO);
        assert!((out.result.rows[0].payment - dec!(700)).abs() < dec!(0.0001));
    }

    #[test]
    fn test_term_beyond_operation_truncates() {
        let mut long = input(RepaymentMethod::EqualPrincipal);
        long.operation_years = 4;
        let out = repayment_schedule(&long).unwrap();
        assert_eq!(out.result.rows.len(), 4);
        assert_eq!(out.result.outstanding_balance, dec!(4200));
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_zero_term_rejected() {
        let mut bad = input(RepaymentMethod::EqualPrincipal);
        bad.term_years = 0;
        assert!(repayment_schedule(&bad).is_err());
    }
}
