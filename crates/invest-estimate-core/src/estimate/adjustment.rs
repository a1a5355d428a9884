use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::convergence::{run_interest_loop, ConvergenceReport, LoopContext, Snapshot};
use super::cost_tree::{CostTree, NodeId};
use super::policy::ConvergencePolicy;
use crate::types::{Money, Rate};

/// Smallest movement treated as a real change to a leaf.
const MOVE_EPSILON: Money = dec!(0.0001);

/// How the target-matching loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentStatus {
    /// Still running; never appears in a finished estimate
    Iterating,
    /// Gap within threshold
    Converged,
    /// Round cap or floor-pass cap hit with the gap still open
    Capped,
    /// Every leaf sits at its cumulative movement limit
    Saturated,
}

/// Outcome of the minimum-share pass over primary-works leaves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloorOutcome {
    pub floor_share: Rate,
    /// Floor amount against the final total funding
    pub floor_amount: Money,
    pub passes: u32,
    /// Codes of leaves raised to the floor
    pub raised_items: Vec<String>,
    /// Every leaf at or above the floor (within tolerance)
    pub satisfied: bool,
    /// Leaves × floor exceeds the primary-works total
    pub infeasible: bool,
}

/// Summary of the target-matching stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentSummary {
    pub rounds: u32,
    /// Matching runs, each followed by a floor pass
    pub settles: u32,
    pub status: AdjustmentStatus,
    /// (G − target) / target after the last round and floor pass
    pub final_gap_ratio: Rate,
    /// |final gap| within threshold
    pub converged: bool,
    pub floor: FloorOutcome,
}

/// Cumulative movement of one leaf relative to its seeded value.
#[derive(Debug, Clone)]
struct LeafTracker {
    id: NodeId,
    original: Money,
}

impl LeafTracker {
    fn bounds(&self, cap: Rate) -> (Money, Money) {
        (
            self.original * (Decimal::ONE - cap),
            self.original * (Decimal::ONE + cap),
        )
    }
}

/// Working state of one estimate's target-matching loop.
#[derive(Debug, Clone)]
pub(crate) struct ConvergenceState {
    pub current_total: Money,
    pub previous_total: Money,
    pub iteration: u32,
    trackers: Vec<LeafTracker>,
    pub status: AdjustmentStatus,
    pub last_gap: Rate,
}

impl ConvergenceState {
    fn new(tree: &CostTree, total: Money, target: Money) -> Self {
        let trackers = tree
            .leaves()
            .into_iter()
            .map(|id| LeafTracker {
                id,
                original: tree.node_total(id),
            })
            .collect();
        Self {
            current_total: total,
            previous_total: total,
            iteration: 0,
            trackers,
            status: AdjustmentStatus::Iterating,
            last_gap: gap_ratio(total, target),
        }
    }

    fn record(&mut self, total: Money, target: Money) {
        self.previous_total = self.current_total;
        self.current_total = total;
        self.last_gap = gap_ratio(total, target);
    }
}

pub(crate) fn gap_ratio(total: Money, target: Money) -> Rate {
    if target.is_zero() {
        return Decimal::ZERO;
    }
    (total - target) / target
}

/// Nudge every movable leaf one step toward the target. Returns how many moved.
///
/// A leaf the floor pass already pushed past its band in the nudge direction
/// stays where it is.
fn nudge_leaves(
    tree: &mut CostTree,
    state: &ConvergenceState,
    policy: &ConvergencePolicy,
) -> usize {
    let direction = if state.last_gap > Decimal::ZERO {
        -Decimal::ONE
    } else {
        Decimal::ONE
    };

    let mut moved = 0;
    for tracker in &state.trackers {
        let current = tree.node_total(tracker.id);
        let (lower, upper) = tracker.bounds(policy.max_item_adjustment);
        let proposed = (current + current * policy.adjustment_step_rate * direction)
            .max(lower.min(current))
            .min(upper.max(current));
        if (proposed - current).abs() < MOVE_EPSILON {
            continue;
        }
        tree.set_leaf_total(tracker.id, proposed);
        moved += 1;
    }
    moved
}

/// Move primary-works leaves until total funding lands within the gap
/// threshold of `target`, then enforce the per-leaf floor.
///
/// A floor pass can push the total back out of the threshold; matching then
/// resumes, at most `floor_max_passes` times.
pub(crate) fn adjust_to_target(
    tree: &mut CostTree,
    ctx: &LoopContext<'_>,
    target: Money,
) -> (Snapshot, ConvergenceReport, AdjustmentSummary) {
    let policy = ctx.policy;
    let (mut snapshot, mut report) = run_interest_loop(tree, ctx, None);
    let mut state = ConvergenceState::new(tree, snapshot.grand_total(), target);
    let mut passes = 0u32;
    let mut raised: Vec<String> = Vec::new();
    let mut settles = 0u32;

    let floor = loop {
        (snapshot, report) = match_target(tree, ctx, target, &mut state, snapshot, report);

        let (settled, settled_report, mut floor) = enforce_floor(tree, ctx, snapshot, report);
        snapshot = settled;
        report = settled_report;
        state.record(snapshot.grand_total(), target);

        passes += floor.passes;
        for code in floor.raised_items.drain(..) {
            if !raised.contains(&code) {
                raised.push(code);
            }
        }
        floor.passes = passes;
        floor.raised_items = raised.clone();
        settles += 1;

        let within = state.last_gap.abs() <= policy.gap_threshold;
        if within || state.status != AdjustmentStatus::Converged {
            break floor;
        }
        if settles >= policy.floor_max_passes {
            warn!(settles, gap = %state.last_gap, "floor passes kept reopening the gap");
            state.status = AdjustmentStatus::Capped;
            break floor;
        }
        debug!(gap = %state.last_gap, "floor pass reopened the gap");
    };

    // The closing floor pass can land a capped or saturated run inside the band.
    let converged = state.last_gap.abs() <= policy.gap_threshold;
    if converged {
        state.status = AdjustmentStatus::Converged;
    }

    let summary = AdjustmentSummary {
        rounds: state.iteration,
        settles,
        status: state.status,
        final_gap_ratio: state.last_gap,
        converged,
        floor,
    };
    (snapshot, report, summary)
}

/// Run nudge rounds until the gap closes, the round cap is hit or no leaf
/// can move.
fn match_target(
    tree: &mut CostTree,
    ctx: &LoopContext<'_>,
    target: Money,
    state: &mut ConvergenceState,
    mut snapshot: Snapshot,
    mut report: ConvergenceReport,
) -> (Snapshot, ConvergenceReport) {
    let policy = ctx.policy;
    state.status = AdjustmentStatus::Iterating;

    loop {
        if state.last_gap.abs() <= policy.gap_threshold {
            state.status = AdjustmentStatus::Converged;
            break;
        }
        if state.iteration >= policy.adjustment_max_rounds {
            state.status = AdjustmentStatus::Capped;
            break;
        }
        if nudge_leaves(tree, state, policy) == 0 {
            state.status = AdjustmentStatus::Saturated;
            break;
        }

        state.iteration += 1;
        tree.recompute_totals();
        (snapshot, report) = run_interest_loop(tree, ctx, Some(state.current_total));
        state.record(snapshot.grand_total(), target);
        debug!(
            round = state.iteration,
            total = %state.current_total,
            previous = %state.previous_total,
            gap = %state.last_gap,
            "adjustment round"
        );
    }

    match state.status {
        AdjustmentStatus::Capped => warn!(
            rounds = state.iteration,
            gap = %state.last_gap,
            "adjustment hit its round cap"
        ),
        AdjustmentStatus::Saturated => warn!(
            rounds = state.iteration,
            gap = %state.last_gap,
            "every primary-works item reached its adjustment limit"
        ),
        _ => {}
    }
    (snapshot, report)
}

/// Raise every leaf below `min_item_share × G` to the floor and scale the
/// rest down so the primary-works total is unchanged, then re-converge.
fn enforce_floor(
    tree: &mut CostTree,
    ctx: &LoopContext<'_>,
    mut snapshot: Snapshot,
    mut report: ConvergenceReport,
) -> (Snapshot, ConvergenceReport, FloorOutcome) {
    let policy = ctx.policy;
    let mut passes = 0u32;
    let mut raised: Vec<String> = Vec::new();
    let mut infeasible = false;

    while passes < policy.floor_max_passes {
        let floor = snapshot.grand_total() * policy.min_item_share;
        let leaves = tree.leaves();
        let below: Vec<NodeId> = leaves
            .iter()
            .copied()
            .filter(|&id| tree.node_total(id) < floor - policy.floor_tolerance)
            .collect();
        if below.is_empty() {
            break;
        }

        let primary_total = tree.total();
        if floor * Decimal::from(leaves.len() as u64) > primary_total {
            warn!(
                leaves = leaves.len(),
                floor = %floor,
                primary_total = %primary_total,
                "minimum item share cannot be met"
            );
            infeasible = true;
            break;
        }

        for id in water_fill(tree, &leaves, floor, primary_total) {
            let code = tree.node_code(id).to_string();
            if !raised.contains(&code) {
                raised.push(code);
            }
        }
        tree.recompute_totals();
        passes += 1;

        (snapshot, report) = run_interest_loop(tree, ctx, Some(snapshot.grand_total()));
        debug!(pass = passes, total = %snapshot.grand_total(), "floor pass");
    }

    let floor_amount = snapshot.grand_total() * policy.min_item_share;
    let satisfied = !infeasible
        && tree
            .leaves()
            .iter()
            .all(|&id| tree.node_total(id) >= floor_amount - policy.floor_tolerance);
    if !satisfied && !infeasible {
        warn!(passes, "minimum item share still violated after the pass cap");
    }

    let outcome = FloorOutcome {
        floor_share: policy.min_item_share,
        floor_amount,
        passes,
        raised_items: raised,
        satisfied,
        infeasible,
    };
    (snapshot, report, outcome)
}

/// Pin leaves at `floor` and scale the others by a common factor so the
/// leaves still sum to `budget`. Returns the pinned leaves.
fn water_fill(tree: &mut CostTree, leaves: &[NodeId], floor: Money, budget: Money) -> Vec<NodeId> {
    let mut pinned: Vec<NodeId> = Vec::new();

    loop {
        let free: Vec<NodeId> = leaves
            .iter()
            .copied()
            .filter(|id| !pinned.contains(id))
            .collect();
        let free_total: Money = free.iter().map(|&id| tree.node_total(id)).sum();
        let remaining = budget - floor * Decimal::from(pinned.len() as u64);

        if free.is_empty() || free_total <= Decimal::ZERO {
            let even = budget / Decimal::from(leaves.len().max(1) as u64);
            for &id in leaves {
                tree.set_leaf_total(id, even);
            }
            return leaves.to_vec();
        }

        let factor = remaining / free_total;
        let newly: Vec<NodeId> = free
            .iter()
            .copied()
            .filter(|&id| tree.node_total(id) * factor < floor)
            .collect();
        if newly.is_empty() {
            for &id in &pinned {
                tree.set_leaf_total(id, floor);
            }
            for &id in &free {
                tree.scale_leaf(id, factor);
            }
            return pinned;
        }
        pinned.extend(newly);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::cost_tree::CostBreakdown;

    fn leaf(amount: Money) -> CostBreakdown {
        CostBreakdown {
            construction: amount,
            ..Default::default()
        }
    }

    #[test]
    fn test_gap_ratio_sign() {
        assert_eq!(gap_ratio(dec!(10200), dec!(10000)), dec!(0.02));
        assert_eq!(gap_ratio(dec!(9900), dec!(10000)), dec!(-0.01));
    }

    #[test]
    fn test_water_fill_preserves_total() {
        let mut tree = CostTree::new();
        tree.add_root("1", "Big", leaf(dec!(900)), "");
        tree.add_root("2", "Mid", leaf(dec!(95)), "");
        tree.add_root("3", "Tiny", leaf(dec!(5)), "");
        tree.recompute_totals();
        let leaves = tree.leaves();

        let pinned = water_fill(&mut tree, &leaves, dec!(50), dec!(1000));
        tree.recompute_totals();

        assert_eq!(pinned.len(), 1);
        assert_eq!(tree.node_total(leaves[2]), dec!(50));
        assert!(tree.node_total(leaves[1]) >= dec!(50));
        assert!((tree.total() - dec!(1000)).abs() < dec!(0.00001));
    }

    #[test]
    fn test_water_fill_cascades() {
        let mut tree = CostTree::new();
        tree.add_root("1", "Big", leaf(dec!(940)), "");
        tree.add_root("2", "Edge", leaf(dec!(52)), "");
        tree.add_root("3", "Tiny", leaf(dec!(8)), "");
        tree.recompute_totals();
        let leaves = tree.leaves();

        // Raising "Tiny" scales "Edge" under the floor, so it is pinned too.
        let pinned = water_fill(&mut tree, &leaves, dec!(50), dec!(1000));
        tree.recompute_totals();

        assert_eq!(pinned.len(), 2);
        assert_eq!(tree.node_total(leaves[0]), dec!(900));
        assert!((tree.total() - dec!(1000)).abs() < dec!(0.00001));
    }

    #[test]
    fn test_bounds_follow_original() {
        let tracker = LeafTracker {
            id: CostTree::new().add_root("1", "x", leaf(dec!(100)), ""),
            original: dec!(100),
        };
        assert_eq!(tracker.bounds(dec!(0.2)), (dec!(80), dec!(120)));
    }

    fn single_leaf_state(amount: Money, total: Money) -> (CostTree, ConvergenceState, NodeId) {
        let mut tree = CostTree::new();
        let id = tree.add_root("1", "Works", leaf(amount), "");
        tree.recompute_totals();
        let state = ConvergenceState::new(&tree, total, dec!(1000));
        (tree, state, id)
    }

    #[test]
    fn test_nudge_steps_with_the_gap() {
        let policy = ConvergencePolicy::default();
        let (mut tree, state, id) = single_leaf_state(dec!(1000), dec!(1200));

        assert_eq!(nudge_leaves(&mut tree, &state, &policy), 1);
        assert_eq!(tree.node_total(id), dec!(992.5));
    }

    #[test]
    fn test_nudge_leaves_lowered_leaf_alone_when_over_target() {
        let policy = ConvergencePolicy::default();
        let (mut tree, state, id) = single_leaf_state(dec!(1000), dec!(1200));
        // A floor pass scaled the leaf well under its lower bound of 800.
        tree.set_leaf_total(id, dec!(500));

        assert_eq!(nudge_leaves(&mut tree, &state, &policy), 0);
        assert_eq!(tree.node_total(id), dec!(500));
    }

    #[test]
    fn test_nudge_leaves_raised_leaf_alone_when_under_target() {
        let policy = ConvergencePolicy::default();
        let (mut tree, state, id) = single_leaf_state(dec!(1000), dec!(800));
        tree.set_leaf_total(id, dec!(1500));

        assert_eq!(nudge_leaves(&mut tree, &state, &policy), 0);
        assert_eq!(tree.node_total(id), dec!(1500));
    }

    #[test]
    fn test_nudge_lowers_raised_leaf_when_over_target() {
        let policy = ConvergencePolicy::default();
        let (mut tree, state, id) = single_leaf_state(dec!(1000), dec!(1200));
        tree.set_leaf_total(id, dec!(1500));

        assert_eq!(nudge_leaves(&mut tree, &state, &policy), 1);
        assert!(tree.node_total(id) < dec!(1500));
    }
}
