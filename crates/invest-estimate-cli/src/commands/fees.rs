use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use invest_estimate_core::estimate::{ancillary_fees, AncillaryFeeInput, CostBreakdown};

use super::CategoryArg;
use crate::input;

/// Arguments for a standalone ancillary-fee calculation
#[derive(Args)]
pub struct FeesArgs {
    /// Path to a JSON or YAML input file
    #[arg(long)]
    pub input: Option<String>,

    /// Primary-works construction cost
    #[arg(long, default_value = "0")]
    pub construction: Decimal,

    /// Primary-works equipment purchases
    #[arg(long, default_value = "0")]
    pub equipment: Decimal,

    /// Primary-works installation cost
    #[arg(long, default_value = "0")]
    pub installation: Decimal,

    /// Primary-works other cost
    #[arg(long, default_value = "0")]
    pub other: Decimal,

    /// Total project funding the funding-based lines are charged on
    #[arg(long)]
    pub total_funding: Option<Decimal>,

    #[arg(long, default_value = "0")]
    pub land_cost: Decimal,

    #[arg(long, value_enum, default_value = "construction")]
    pub category: CategoryArg,
}

pub fn run_fees(args: FeesArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let fee_input: AncillaryFeeInput = match input::load(args.input.as_deref())? {
        Some(parsed) => parsed,
        None => AncillaryFeeInput {
            primary_works: CostBreakdown {
                construction: args.construction,
                equipment: args.equipment,
                installation: args.installation,
                other: args.other,
            },
            total_funding: args
                .total_funding
                .ok_or("--total-funding is required (or provide --input)")?,
            land_cost: args.land_cost,
            project_category: args.category.into(),
            fee_tables: None,
            policy: None,
        },
    };

    let result = ancillary_fees(&fee_input)?;
    Ok(serde_json::to_value(result)?)
}
