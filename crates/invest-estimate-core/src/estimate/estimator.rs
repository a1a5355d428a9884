use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

use super::adjustment::{adjust_to_target, AdjustmentStatus, AdjustmentSummary};
use super::convergence::{ConvergenceReport, LoopContext};
use super::cost_tree::CostItem;
use super::loan::ConstructionInterest;
use super::part_a::{seed_primary_works, validate_parameters, ProjectParameters};
use super::part_b::management_fee_warning;
use super::policy::ConvergencePolicy;
use crate::fee_schedule::FeeTables;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::EstimateResult;

/// Input for a full investment estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateInput {
    pub parameters: ProjectParameters,
    /// Loop caps and thresholds; defaults when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<ConvergencePolicy>,
    /// Fee schedules; the statutory set when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_tables: Option<FeeTables>,
}

/// One line of the parts overview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartTotal {
    pub code: String,
    pub name: String,
    pub total: Money,
    pub share_of_total: Rate,
}

/// A complete, internally consistent capital-expenditure estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestmentEstimate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    pub target_investment: Money,
    /// Primary works
    pub part_a: CostItem,
    /// Ancillary fees
    pub part_b: CostItem,
    /// A + B
    pub part_c: CostItem,
    /// Reserves
    pub part_d: CostItem,
    /// Construction investment, C + D
    pub part_e: CostItem,
    /// Capitalized construction-period interest
    pub part_f: ConstructionInterest,
    /// Total project funding, E + F
    pub part_g: CostItem,
    /// Part A less equipment purchases
    pub engineering_cost: Money,
    /// A to G totals with their share of G
    pub overview: Vec<PartTotal>,
    pub interest_loop: ConvergenceReport,
    pub adjustment: AdjustmentSummary,
}

impl InvestmentEstimate {
    pub fn total_funding(&self) -> Money {
        self.part_g.total
    }
}

/// Build the full estimate: seed Part A, drive B..G to a fixed point with the
/// construction-interest loop, move Part A toward the target and enforce the
/// per-item floor.
///
/// Only malformed input is an error. A loop that stops on its cap still
/// returns its last consistent state, flagged in the result and `warnings`.
pub fn estimate_investment(
    input: &EstimateInput,
) -> EstimateResult<ComputationOutput<InvestmentEstimate>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let params = &input.parameters;
    validate_parameters(params)?;
    let policy = input.policy.clone().unwrap_or_default();
    policy.validate()?;
    let tables = input.fee_tables.clone().unwrap_or_default();
    tables.validate()?;

    if params.loan_ratio.is_some() && params.loan_amount_override.is_some() {
        warnings.push("Loan amount override takes precedence over loan ratio".into());
    }
    if params.land_cost >= params.target_investment {
        warnings.push(format!(
            "Land cost ({}) is not below the target investment ({})",
            params.land_cost, params.target_investment
        ));
    }

    let ctx = LoopContext {
        params,
        tables: &tables,
        policy: &policy,
    };
    let mut tree = seed_primary_works(params, &policy);
    let (snapshot, report, adjustment) =
        adjust_to_target(&mut tree, &ctx, params.target_investment);

    // --- Warnings from the loops ---
    if !report.management_fee.converged {
        warnings.push(management_fee_warning(&report.management_fee));
    }
    if !report.converged() {
        warnings.push(format!(
            "Construction-interest loop stopped after {} rounds with a change of {}",
            report.iterations, report.final_delta
        ));
    }
    match adjustment.status {
        AdjustmentStatus::Capped if adjustment.rounds >= policy.adjustment_max_rounds => {
            warnings.push(format!(
                "Target matching stopped at the round cap ({} rounds); remaining gap {}",
                adjustment.rounds, adjustment.final_gap_ratio
            ))
        }
        AdjustmentStatus::Capped => warnings.push(format!(
            "Floor passes reopened the gap {} times; remaining gap {}",
            adjustment.settles, adjustment.final_gap_ratio
        )),
        AdjustmentStatus::Saturated => warnings.push(format!(
            "Every primary-works item reached its ±{} adjustment limit; remaining gap {}",
            policy.max_item_adjustment, adjustment.final_gap_ratio
        )),
        _ => {}
    }
    if adjustment.floor.infeasible {
        warnings.push(format!(
            "Minimum item share of {} cannot be met by every primary-works item",
            policy.min_item_share
        ));
    } else if !adjustment.floor.satisfied {
        warnings.push(format!(
            "Some primary-works items remain below {} of total funding",
            policy.min_item_share
        ));
    }
    if snapshot.interest.loan_amount > snapshot.summary.e.total {
        warnings.push(format!(
            "Loan amount {} exceeds construction investment {}",
            snapshot.interest.loan_amount, snapshot.summary.e.total
        ));
    }

    // --- Assemble ---
    let grand_total = snapshot.grand_total();
    let mut part_a = snapshot.a;
    let mut part_b = snapshot.b.part;
    let mut part_c = snapshot.summary.c;
    let mut part_d = snapshot.summary.d;
    let mut part_e = snapshot.summary.e;
    let mut part_g = snapshot.g;
    for part in [
        &mut part_a,
        &mut part_b,
        &mut part_c,
        &mut part_d,
        &mut part_e,
        &mut part_g,
    ] {
        part.assign_shares(grand_total);
    }

    let share = |amount: Money| {
        if grand_total > Decimal::ZERO {
            amount / grand_total
        } else {
            Decimal::ZERO
        }
    };
    let mut overview: Vec<PartTotal> = [&part_a, &part_b, &part_c, &part_d, &part_e]
        .iter()
        .map(|p| PartTotal {
            code: p.code.clone(),
            name: p.name.clone(),
            total: p.total,
            share_of_total: share(p.total),
        })
        .collect();
    overview.push(PartTotal {
        code: "F".into(),
        name: "Construction-period interest".into(),
        total: snapshot.interest.total_interest,
        share_of_total: share(snapshot.interest.total_interest),
    });
    overview.push(PartTotal {
        code: part_g.code.clone(),
        name: part_g.name.clone(),
        total: part_g.total,
        share_of_total: Decimal::ONE,
    });

    info!(
        total_funding = %grand_total,
        target = %params.target_investment,
        gap = %adjustment.final_gap_ratio,
        rounds = adjustment.rounds,
        converged = adjustment.converged,
        "estimate complete"
    );
    if !adjustment.converged {
        warn!(gap = %adjustment.final_gap_ratio, "estimate did not reach the target band");
    }

    let estimate = InvestmentEstimate {
        project_name: params.project_name.clone(),
        target_investment: params.target_investment,
        part_a,
        part_b,
        part_c,
        part_d,
        part_e,
        part_f: snapshot.interest,
        part_g,
        engineering_cost: snapshot.b.engineering_cost,
        overview,
        interest_loop: report,
        adjustment,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Investment estimate: fee schedules, construction-interest fixed point, target matching",
        &serde_json::json!({
            "target_investment": params.target_investment.to_string(),
            "construction_years": params.construction_years,
            "operation_years": params.operation_years,
            "project_category": params.project_category,
            "drafted_items": !params.drafted_items.is_empty(),
            "policy": policy,
        }),
        warnings,
        elapsed,
        estimate,
    ))
}
