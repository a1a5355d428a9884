use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use invest_estimate_core::estimate::{construction_interest, ConstructionInterestInput};

use crate::input;

/// Arguments for construction-period interest
#[derive(Args)]
pub struct InterestArgs {
    /// Path to a JSON or YAML input file
    #[arg(long)]
    pub input: Option<String>,

    /// Construction investment the loan ratio applies to
    #[arg(long)]
    pub investment: Option<Decimal>,

    /// Construction period in years
    #[arg(long)]
    pub years: Option<u32>,

    #[arg(long)]
    pub loan_ratio: Option<Decimal>,

    /// Fixed loan amount, used instead of the ratio
    #[arg(long)]
    pub loan_amount: Option<Decimal>,

    /// Annual loan rate
    #[arg(long, default_value = "0")]
    pub rate: Decimal,
}

pub fn run_interest(args: InterestArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let interest_input: ConstructionInterestInput = match input::load(args.input.as_deref())? {
        Some(parsed) => parsed,
        None => ConstructionInterestInput {
            construction_investment: args
                .investment
                .ok_or("--investment is required (or provide --input)")?,
            construction_years: args
                .years
                .ok_or("--years is required (or provide --input)")?,
            loan_ratio: args.loan_ratio,
            loan_amount_override: args.loan_amount,
            annual_loan_rate: args.rate,
        },
    };

    let result = construction_interest(&interest_input)?;
    Ok(serde_json::to_value(result)?)
}
