use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::cost_tree::{CostItem, CostTree};
use super::loan::{interest_schedule, resolve_loan_amount, ConstructionInterest};
use super::part_a::{part_a_item, ProjectParameters};
use super::part_b::{compute_part_b, AncillaryFees};
use super::policy::ConvergencePolicy;
use super::summary::{grand_total, summarize, SummaryParts};
use crate::fee_schedule::{FeeTables, FixedPoint};
use crate::types::Money;

/// Phase of the interest / total-funding loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Seeding,
    Iterating,
    Converged,
    Capped,
}

/// How the interest / total-funding loop ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceReport {
    /// `Converged` or `Capped`
    pub status: LoopState,
    pub iterations: u32,
    /// |G − previous G| in the last round
    pub final_delta: Money,
    /// Management-fee fixed point from the last Part B evaluation
    pub management_fee: FixedPoint,
}

impl ConvergenceReport {
    pub fn converged(&self) -> bool {
        self.status == LoopState::Converged
    }
}

/// Every part computed in one consistent pass.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub a: CostItem,
    pub b: AncillaryFees,
    pub summary: SummaryParts,
    pub interest: ConstructionInterest,
    pub g: CostItem,
}

impl Snapshot {
    pub fn grand_total(&self) -> Money {
        self.g.total
    }
}

/// Everything the loop reads besides the tree.
pub(crate) struct LoopContext<'a> {
    pub params: &'a ProjectParameters,
    pub tables: &'a FeeTables,
    pub policy: &'a ConvergencePolicy,
}

impl LoopContext<'_> {
    fn parts(&self, a: &CostItem, funding: Money) -> (AncillaryFees, SummaryParts) {
        let b = compute_part_b(
            &a.categories(),
            funding,
            self.params.land_cost,
            self.params.project_category,
            self.tables,
            self.policy,
        );
        let summary = summarize(a, &b.part, &self.tables.rates);
        (b, summary)
    }

    fn interest(&self, construction_investment: Money) -> ConstructionInterest {
        let loan = resolve_loan_amount(
            construction_investment,
            self.params.loan_ratio,
            self.params.loan_amount_override,
        );
        interest_schedule(
            loan,
            self.params.construction_years,
            self.params.annual_loan_rate,
        )
    }
}

/// Drive B..G to a fixed point for the current primary works.
///
/// `warm_start` is the total funding from a previous run; without one the
/// first funding guess is A × the bootstrap multiplier.
pub(crate) fn run_interest_loop(
    tree: &CostTree,
    ctx: &LoopContext<'_>,
    warm_start: Option<Money>,
) -> (Snapshot, ConvergenceReport) {
    let a = part_a_item(tree);
    let mut state = LoopState::Seeding;

    let mut funding = warm_start.unwrap_or(a.total * ctx.policy.funding_bootstrap_multiplier);
    let (mut b, mut summary) = ctx.parts(&a, funding);
    let mut previous = summary.e.total;
    debug!(?state, funding = %funding, construction_investment = %previous, "interest loop seeded");

    state = LoopState::Iterating;
    let mut iterations = 0u32;
    loop {
        iterations += 1;
        let interest = ctx.interest(summary.e.total);
        let g = grand_total(&summary.e, interest.total_interest);
        let delta = (g.total - previous).abs();
        debug!(?state, iteration = iterations, total = %g.total, delta = %delta, "interest loop");

        let finished = if delta < ctx.policy.interest_epsilon {
            Some(LoopState::Converged)
        } else if iterations >= ctx.policy.interest_max_iterations {
            Some(LoopState::Capped)
        } else {
            None
        };

        if let Some(status) = finished {
            state = status;
            if state == LoopState::Capped {
                warn!(iterations, delta = %delta, "interest loop hit its cap");
            }
            let report = ConvergenceReport {
                status: state,
                iterations,
                final_delta: delta,
                management_fee: b.management_fee,
            };
            let snapshot = Snapshot {
                a,
                b,
                summary,
                interest,
                g,
            };
            return (snapshot, report);
        }

        previous = g.total;
        funding = g.total;
        (b, summary) = ctx.parts(&a, funding);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::part_a::{seed_primary_works, ProjectCategory};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn params() -> ProjectParameters {
        ProjectParameters {
            project_name: None,
            target_investment: dec!(10000),
            construction_years: 3,
            operation_years: 20,
            loan_ratio: Some(dec!(0.7)),
            loan_amount_override: None,
            annual_loan_rate: dec!(0.049),
            land_cost: dec!(500),
            drafted_items: Vec::new(),
            project_category: ProjectCategory::Agriculture,
        }
    }

    #[test]
    fn test_interest_loop_converges() {
        let p = params();
        let tables = FeeTables::default();
        let policy = ConvergencePolicy::default();
        let ctx = LoopContext {
            params: &p,
            tables: &tables,
            policy: &policy,
        };
        let tree = seed_primary_works(&p, &policy);
        let (snap, report) = run_interest_loop(&tree, &ctx, None);

        assert!(report.converged(), "report {report:?}");
        assert!(report.final_delta < dec!(0.01));
        assert_eq!(
            snap.g.total,
            snap.summary.e.total + snap.interest.total_interest
        );
        assert_eq!(snap.a.total, dec!(7500));
    }

    #[test]
    fn test_capped_loop_keeps_consistent_snapshot() {
        let p = params();
        let tables = FeeTables::default();
        let policy = ConvergencePolicy {
            interest_max_iterations: 1,
            ..Default::default()
        };
        let ctx = LoopContext {
            params: &p,
            tables: &tables,
            policy: &policy,
        };
        let tree = seed_primary_works(&p, &policy);
        let (snap, report) = run_interest_loop(&tree, &ctx, None);

        assert_eq!(report.status, LoopState::Capped);
        assert_eq!(report.iterations, 1);
        assert_eq!(
            snap.g.total,
            snap.summary.e.total + snap.interest.total_interest
        );
    }

    #[test]
    fn test_no_loan_converges_in_one_round() {
        let mut p = params();
        p.loan_ratio = None;
        let tables = FeeTables::default();
        let policy = ConvergencePolicy::default();
        let ctx = LoopContext {
            params: &p,
            tables: &tables,
            policy: &policy,
        };
        let tree = seed_primary_works(&p, &policy);
        let (snap, report) = run_interest_loop(&tree, &ctx, None);
        assert_eq!(report.iterations, 1);
        assert_eq!(snap.interest.total_interest, Decimal::ZERO);
    }
}
