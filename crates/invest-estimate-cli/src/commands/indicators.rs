use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use invest_estimate_core::indicators::{financial_indicators, IndicatorInput};

use crate::input;

/// Arguments for appraisal indicators
#[derive(Args)]
pub struct IndicatorsArgs {
    /// Path to a JSON or YAML input file
    #[arg(long)]
    pub input: Option<String>,

    /// Benchmark discount rate (e.g. 0.08)
    #[arg(long)]
    pub discount_rate: Option<Decimal>,

    /// Yearly pre-tax flows, year 1 first (e.g. "-1000,300,300,600")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub cash_flows: Option<Vec<Decimal>>,

    /// Yearly post-tax flows, same length as the pre-tax series
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub post_tax_cash_flows: Option<Vec<Decimal>>,

    /// Starting rate for the IRR search
    #[arg(long)]
    pub irr_guess: Option<Decimal>,
}

pub fn run_indicators(args: IndicatorsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let indicator_input: IndicatorInput = match input::load(args.input.as_deref())? {
        Some(parsed) => parsed,
        None => IndicatorInput {
            discount_rate: args
                .discount_rate
                .ok_or("--discount-rate is required (or provide --input)")?,
            pre_tax_cash_flows: args
                .cash_flows
                .ok_or("--cash-flows is required (or provide --input)")?,
            post_tax_cash_flows: args.post_tax_cash_flows,
            project: None,
            irr_guess: args.irr_guess,
        },
    };

    let result = financial_indicators(&indicator_input)?;
    Ok(serde_json::to_value(result)?)
}
