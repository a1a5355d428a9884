use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde_json::Value;

use invest_estimate_core::estimate::{repayment_schedule, RepaymentInput, RepaymentMethod};

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MethodArg {
    EqualInstallment,
    EqualPrincipal,
}

/// Arguments for an operating-period repayment schedule
#[derive(Args)]
pub struct RepaymentArgs {
    /// Path to a JSON or YAML input file
    #[arg(long)]
    pub input: Option<String>,

    /// Principal outstanding when operation starts
    #[arg(long)]
    pub loan_amount: Option<Decimal>,

    /// Annual loan rate
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Contractual term in years
    #[arg(long)]
    pub term_years: Option<u32>,

    /// Operating horizon in years (defaults to the term)
    #[arg(long)]
    pub operation_years: Option<u32>,

    #[arg(long, value_enum, default_value = "equal-installment")]
    pub method: MethodArg,
}

pub fn run_repayment(args: RepaymentArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let repayment_input: RepaymentInput = match input::load(args.input.as_deref())? {
        Some(parsed) => parsed,
        None => {
            let term_years = args
                .term_years
                .ok_or("--term-years is required (or provide --input)")?;
            RepaymentInput {
                loan_amount: args
                    .loan_amount
                    .ok_or("--loan-amount is required (or provide --input)")?,
                annual_rate: args.rate.ok_or("--rate is required (or provide --input)")?,
                term_years,
                operation_years: args.operation_years.unwrap_or(term_years),
                method: match args.method {
                    MethodArg::EqualInstallment => RepaymentMethod::EqualInstallment,
                    MethodArg::EqualPrincipal => RepaymentMethod::EqualPrincipal,
                },
            }
        }
    };

    let result = repayment_schedule(&repayment_input)?;
    Ok(serde_json::to_value(result)?)
}
