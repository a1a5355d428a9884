use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use invest_estimate_core::estimate::{
    estimate_investment, ConvergencePolicy, EstimateInput, ProjectParameters,
};

use super::CategoryArg;
use crate::input;

/// Arguments for a full investment estimate
#[derive(Args)]
pub struct EstimateArgs {
    /// Path to a JSON or YAML estimate input (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Path to a JSON or YAML convergence policy
    #[arg(long)]
    pub policy: Option<String>,

    /// Project name carried into the result
    #[arg(long)]
    pub name: Option<String>,

    /// Target total investment
    #[arg(long)]
    pub target: Option<Decimal>,

    /// Construction period in years
    #[arg(long)]
    pub construction_years: Option<u32>,

    /// Operating period in years
    #[arg(long, default_value_t = 20)]
    pub operation_years: u32,

    /// Debt share of construction investment (e.g. 0.7)
    #[arg(long)]
    pub loan_ratio: Option<Decimal>,

    /// Fixed loan amount, used instead of the ratio
    #[arg(long)]
    pub loan_amount: Option<Decimal>,

    /// Annual loan rate (e.g. 0.049)
    #[arg(long, default_value = "0")]
    pub loan_rate: Decimal,

    /// Land acquisition cost
    #[arg(long, default_value = "0")]
    pub land_cost: Decimal,

    #[arg(long, value_enum, default_value = "construction")]
    pub category: CategoryArg,
}

pub fn run_estimate(args: EstimateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut estimate_input: EstimateInput = match input::load(args.input.as_deref())? {
        Some(parsed) => parsed,
        None => {
            let target = args
                .target
                .ok_or("--target is required (or provide --input)")?;
            let construction_years = args
                .construction_years
                .ok_or("--construction-years is required (or provide --input)")?;

            EstimateInput {
                parameters: ProjectParameters {
                    project_name: args.name,
                    target_investment: target,
                    construction_years,
                    operation_years: args.operation_years,
                    loan_ratio: args.loan_ratio,
                    loan_amount_override: args.loan_amount,
                    annual_loan_rate: args.loan_rate,
                    land_cost: args.land_cost,
                    drafted_items: Vec::new(),
                    project_category: args.category.into(),
                },
                policy: None,
                fee_tables: None,
            }
        }
    };

    if let Some(ref path) = args.policy {
        let policy: ConvergencePolicy = input::file::read_document(path)?;
        estimate_input.policy = Some(policy);
    }

    let result = estimate_investment(&estimate_input)?;
    Ok(serde_json::to_value(result)?)
}
