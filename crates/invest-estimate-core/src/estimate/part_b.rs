use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::warn;

use super::cost_tree::{CostBreakdown, CostItem};
use super::part_a::ProjectCategory;
use super::policy::ConvergencePolicy;
use crate::error::EstimateError;
use crate::fee_schedule::{
    interpolate, progressive_fee, solve_management_fee, FeeTables, FixedPoint,
};
use crate::types::{with_metadata, ComputationOutput, Money};
use crate::EstimateResult;

/// Input for a standalone ancillary-fee calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AncillaryFeeInput {
    /// Category totals of the primary works (Part A)
    pub primary_works: CostBreakdown,
    /// Total project funding the funding-based lines are charged on
    pub total_funding: Money,
    #[serde(default)]
    pub land_cost: Money,
    #[serde(default)]
    pub project_category: ProjectCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_tables: Option<FeeTables>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<ConvergencePolicy>,
}

/// Part B: the thirteen ancillary lines plus how the management fee settled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AncillaryFees {
    pub part: CostItem,
    /// Primary-works total less equipment purchases
    pub engineering_cost: Money,
    pub management_fee: FixedPoint,
}

/// Compute the ancillary-fee lines (Part B) for a given Part A and funding level.
pub fn ancillary_fees(
    input: &AncillaryFeeInput,
) -> EstimateResult<ComputationOutput<AncillaryFees>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if !input.primary_works.is_non_negative() {
        return Err(EstimateError::invalid(
            "primary_works",
            "cost categories cannot be negative",
        ));
    }
    if input.total_funding < Decimal::ZERO {
        return Err(EstimateError::invalid(
            "total_funding",
            "cannot be negative",
        ));
    }
    if input.land_cost < Decimal::ZERO {
        return Err(EstimateError::invalid("land_cost", "cannot be negative"));
    }

    let tables = input.fee_tables.clone().unwrap_or_default();
    tables.validate()?;
    let policy = input.policy.clone().unwrap_or_default();
    policy.validate()?;

    let fees = compute_part_b(
        &input.primary_works,
        input.total_funding,
        input.land_cost,
        input.project_category,
        &tables,
        &policy,
    );
    if !fees.management_fee.converged {
        warnings.push(management_fee_warning(&fees.management_fee));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Ancillary fees: statutory progressive and interpolated schedules",
        &serde_json::json!({
            "total_funding": input.total_funding.to_string(),
            "land_cost": input.land_cost.to_string(),
            "project_category": input.project_category,
        }),
        warnings,
        elapsed,
        fees,
    ))
}

pub(crate) fn management_fee_warning(fp: &FixedPoint) -> String {
    format!(
        "Management fee did not settle after {} rounds (last change {}); last value accepted",
        fp.iterations, fp.last_delta
    )
}

pub(crate) fn compute_part_b(
    primary: &CostBreakdown,
    total_funding: Money,
    land_cost: Money,
    category: ProjectCategory,
    tables: &FeeTables,
    policy: &ConvergencePolicy,
) -> AncillaryFees {
    let rates = &tables.rates;
    let a_total = primary.total();
    let engineering = primary.engineering();

    let management = solve_management_fee(
        total_funding,
        land_cost,
        &tables.management_fee,
        policy.management_fee_max_iterations,
        policy.management_fee_epsilon,
    );
    if !management.converged {
        warn!(
            iterations = management.iterations,
            last_delta = %management.last_delta,
            "management fee fixed point hit its cap"
        );
    }

    let supervision = interpolate(engineering, &tables.supervision);
    let survey_design = engineering * (rates.preliminary_survey + rates.construction_survey)
        + interpolate(engineering, &tables.design);
    let bidding = progressive_fee(engineering, &tables.bidding_engineering)
        + progressive_fee(primary.equipment, &tables.bidding_goods)
        + progressive_fee(survey_design + supervision, &tables.bidding_services);
    let consulting: Money = tables
        .consulting
        .iter()
        .map(|t| interpolate(total_funding, t))
        .sum();
    let municipal = if category.pays_municipal_facility_fee() {
        a_total * rates.municipal_facility
    } else {
        Decimal::ZERO
    };

    let municipal_remark = if municipal.is_zero() {
        "exempt or nil"
    } else {
        "on primary works"
    };
    let lines = [
        (
            "Construction management fee",
            management.value,
            "progressive on funding less land and fee",
        ),
        ("Land acquisition", land_cost, "as supplied"),
        (
            "Bidding agency fee",
            bidding,
            "works, goods and services tenders",
        ),
        (
            "Works supervision fee",
            supervision,
            "interpolated on engineering cost",
        ),
        (
            "Preliminary consulting fee",
            consulting,
            "interpolated on total funding",
        ),
        (
            "Survey and design fee",
            survey_design,
            "survey rates plus design table on engineering cost",
        ),
        (
            "Research and testing",
            a_total * rates.research_test,
            "on primary works",
        ),
        (
            "Environmental impact report",
            total_funding * rates.environmental_report,
            "on total funding",
        ),
        (
            "Site preparation",
            a_total * rates.site_preparation,
            "on primary works",
        ),
        (
            "Works insurance",
            a_total * rates.insurance,
            "on primary works",
        ),
        (
            "Inspection and testing",
            a_total * rates.inspection_test,
            "on primary works",
        ),
        ("Municipal facility charge", municipal, municipal_remark),
        ("Other costs", a_total * rates.other, "on primary works"),
    ];

    let children = lines
        .iter()
        .enumerate()
        .map(|(i, (name, amount, remark))| {
            CostItem::line(&(i + 1).to_string(), name, *amount, remark)
        })
        .collect();

    AncillaryFees {
        part: CostItem::group("B", "Ancillary fees", children, ""),
        engineering_cost: engineering,
        management_fee: management,
    }
}
