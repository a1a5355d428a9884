use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use crate::types::{round_money, Money, Rate};

// ---------------------------------------------------------------------------
// Category breakdown
// ---------------------------------------------------------------------------

/// The four cost categories every estimate line is split into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub construction: Money,
    pub equipment: Money,
    pub installation: Money,
    pub other: Money,
}

impl CostBreakdown {
    pub fn other_only(amount: Money) -> Self {
        Self {
            other: amount,
            ..Default::default()
        }
    }

    pub fn total(&self) -> Money {
        self.construction + self.equipment + self.installation + self.other
    }

    /// Everything except equipment purchases; the base most fee lines use.
    pub fn engineering(&self) -> Money {
        self.total() - self.equipment
    }

    /// Every category multiplied by `factor`, rounded to money precision.
    pub fn scaled(&self, factor: Decimal) -> Self {
        Self {
            construction: round_money(self.construction * factor),
            equipment: round_money(self.equipment * factor),
            installation: round_money(self.installation * factor),
            other: round_money(self.other * factor),
        }
    }

    pub fn is_non_negative(&self) -> bool {
        self.construction >= Decimal::ZERO
            && self.equipment >= Decimal::ZERO
            && self.installation >= Decimal::ZERO
            && self.other >= Decimal::ZERO
    }
}

impl Add for CostBreakdown {
    type Output = CostBreakdown;

    fn add(self, rhs: CostBreakdown) -> CostBreakdown {
        CostBreakdown {
            construction: self.construction + rhs.construction,
            equipment: self.equipment + rhs.equipment,
            installation: self.installation + rhs.installation,
            other: self.other + rhs.other,
        }
    }
}

impl AddAssign for CostBreakdown {
    fn add_assign(&mut self, rhs: CostBreakdown) {
        *self = *self + rhs;
    }
}

impl Sum for CostBreakdown {
    fn sum<I: Iterator<Item = CostBreakdown>>(iter: I) -> Self {
        iter.fold(CostBreakdown::default(), |acc, b| acc + b)
    }
}

// ---------------------------------------------------------------------------
// Serialized tree node
// ---------------------------------------------------------------------------

/// One row of the finished estimate. Owns its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostItem {
    /// Ordinal code ("A", "3", "1.2")
    pub code: String,
    pub name: String,
    /// Category split; absent on pure summary rows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<CostBreakdown>,
    pub total: Money,
    /// Share of total project funding, filled in once the estimate is final
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_of_total: Option<Rate>,
    pub remark: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CostItem>,
}

impl CostItem {
    /// A row whose total is the sum of its own categories.
    pub fn leaf(code: &str, name: &str, breakdown: CostBreakdown, remark: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            total: breakdown.total(),
            breakdown: Some(breakdown),
            share_of_total: None,
            remark: remark.to_string(),
            children: Vec::new(),
        }
    }

    /// A single-amount fee line, booked under "other" at money precision.
    pub fn line(code: &str, name: &str, amount: Money, remark: &str) -> Self {
        Self::leaf(code, name, CostBreakdown::other_only(round_money(amount)), remark)
    }

    /// A row whose total is the sum of its children's totals.
    pub fn group(code: &str, name: &str, children: Vec<CostItem>, remark: &str) -> Self {
        let breakdown = children
            .iter()
            .map(|c| c.breakdown)
            .collect::<Option<Vec<_>>>()
            .map(|bs| bs.into_iter().sum::<CostBreakdown>());
        Self {
            code: code.to_string(),
            name: name.to_string(),
            total: children.iter().map(|c| c.total).sum(),
            breakdown,
            share_of_total: None,
            remark: remark.to_string(),
            children,
        }
    }

    /// Categories of this row, or zero when it has none.
    pub fn categories(&self) -> CostBreakdown {
        self.breakdown.unwrap_or_default()
    }

    /// True when this row and every descendant satisfy the total invariant.
    pub fn is_consistent(&self) -> bool {
        let own = if self.children.is_empty() {
            match self.breakdown {
                Some(b) => b.total() == self.total,
                None => true,
            }
        } else {
            self.children.iter().map(|c| c.total).sum::<Money>() == self.total
        };
        own && self.children.iter().all(CostItem::is_consistent)
    }

    /// Leaf rows in display order.
    pub fn leaves(&self) -> Vec<&CostItem> {
        if self.children.is_empty() {
            return vec![self];
        }
        self.children.iter().flat_map(|c| c.leaves()).collect()
    }

    /// Find a descendant (or self) by code.
    pub fn find(&self, code: &str) -> Option<&CostItem> {
        if self.code == code {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(code))
    }

    pub(crate) fn assign_shares(&mut self, grand_total: Money) {
        self.share_of_total = if grand_total > Decimal::ZERO {
            Some(self.total / grand_total)
        } else {
            None
        };
        for child in &mut self.children {
            child.assign_shares(grand_total);
        }
    }
}

// ---------------------------------------------------------------------------
// Working arena
// ---------------------------------------------------------------------------

/// Index of a node inside a [`CostTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct TreeNode {
    code: String,
    name: String,
    breakdown: CostBreakdown,
    total: Money,
    remark: String,
    children: Vec<NodeId>,
}

/// Mutable arena the primary-works items live in while the estimate iterates.
///
/// Children are always allocated after their parent, so a reverse sweep over
/// the arena visits every child before its parent.
#[derive(Debug, Clone, Default)]
pub struct CostTree {
    nodes: Vec<TreeNode>,
    roots: Vec<NodeId>,
}

impl CostTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_root(
        &mut self,
        code: &str,
        name: &str,
        breakdown: CostBreakdown,
        remark: &str,
    ) -> NodeId {
        let id = self.push(code, name, breakdown, remark);
        self.roots.push(id);
        id
    }

    pub fn add_child(
        &mut self,
        parent: NodeId,
        code: &str,
        name: &str,
        breakdown: CostBreakdown,
        remark: &str,
    ) -> NodeId {
        let id = self.push(code, name, breakdown, remark);
        self.nodes[parent.0].children.push(id);
        id
    }

    fn push(&mut self, code: &str, name: &str, breakdown: CostBreakdown, remark: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(TreeNode {
            code: code.to_string(),
            name: name.to_string(),
            total: breakdown.total(),
            breakdown,
            remark: remark.to_string(),
            children: Vec::new(),
        });
        id
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Leaf ids in display order (one depth-first walk).
    pub fn leaves(&self) -> Vec<NodeId> {
        let mut leaves = Vec::new();
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            if node.children.is_empty() {
                leaves.push(id);
            } else {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        leaves
    }

    pub fn node_total(&self, id: NodeId) -> Money {
        self.nodes[id.0].total
    }

    pub fn node_code(&self, id: NodeId) -> &str {
        &self.nodes[id.0].code
    }

    /// Sum of the root totals.
    pub fn total(&self) -> Money {
        self.roots.iter().map(|r| self.nodes[r.0].total).sum()
    }

    /// Category totals across the roots.
    pub fn breakdown(&self) -> CostBreakdown {
        self.roots.iter().map(|r| self.nodes[r.0].breakdown).sum()
    }

    /// Multiply a leaf's categories by `factor`. Ancestors are stale until
    /// [`CostTree::recompute_totals`] runs.
    pub fn scale_leaf(&mut self, id: NodeId, factor: Decimal) {
        let node = &mut self.nodes[id.0];
        node.breakdown = node.breakdown.scaled(factor);
        node.total = node.breakdown.total();
    }

    /// Set a leaf to `amount`, keeping its category mix. A leaf with nothing
    /// in it takes the whole amount as construction cost.
    pub fn set_leaf_total(&mut self, id: NodeId, amount: Money) {
        let node = &mut self.nodes[id.0];
        if node.total > Decimal::ZERO {
            let factor = amount / node.total;
            node.breakdown = node.breakdown.scaled(factor);
        } else {
            node.breakdown = CostBreakdown {
                construction: amount,
                ..Default::default()
            };
        }
        node.total = node.breakdown.total();
    }

    /// Re-establish the total invariant bottom-up after leaf mutation.
    pub fn recompute_totals(&mut self) {
        for index in (0..self.nodes.len()).rev() {
            if self.nodes[index].children.is_empty() {
                let node = &mut self.nodes[index];
                node.total = node.breakdown.total();
                continue;
            }
            let (breakdown, total) = self.nodes[index].children.iter().fold(
                (CostBreakdown::default(), Decimal::ZERO),
                |(b, t), child| {
                    let c = &self.nodes[child.0];
                    (b + c.breakdown, t + c.total)
                },
            );
            let node = &mut self.nodes[index];
            node.breakdown = breakdown;
            node.total = total;
        }
    }

    /// Snapshot the arena as owned rows.
    pub fn to_items(&self) -> Vec<CostItem> {
        self.roots.iter().map(|&r| self.item(r)).collect()
    }

    fn item(&self, id: NodeId) -> CostItem {
        let node = &self.nodes[id.0];
        CostItem {
            code: node.code.clone(),
            name: node.name.clone(),
            breakdown: Some(node.breakdown),
            total: node.total,
            share_of_total: None,
            remark: node.remark.clone(),
            children: node.children.iter().map(|&c| self.item(c)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn split(c: Money, e: Money, i: Money, o: Money) -> CostBreakdown {
        CostBreakdown {
            construction: c,
            equipment: e,
            installation: i,
            other: o,
        }
    }

    fn sample_tree() -> CostTree {
        let mut tree = CostTree::new();
        let plant = tree.add_root("1", "Plant", CostBreakdown::default(), "");
        tree.add_child(
            plant,
            "1.1",
            "Building",
            split(dec!(300), dec!(0), dec!(20), dec!(0)),
            "",
        );
        tree.add_child(
            plant,
            "1.2",
            "Machinery",
            split(dec!(0), dec!(500), dec!(50), dec!(0)),
            "",
        );
        tree.add_root("2", "Roads", split(dec!(100), dec!(0), dec!(0), dec!(10)), "");
        tree.recompute_totals();
        tree
    }

    #[test]
    fn test_leaves_in_display_order() {
        let tree = sample_tree();
        let codes: Vec<&str> = tree.leaves().iter().map(|&id| tree.node_code(id)).collect();
        assert_eq!(codes, vec!["1.1", "1.2", "2"]);
    }

    #[test]
    fn test_recompute_totals_rolls_up() {
        let tree = sample_tree();
        assert_eq!(tree.total(), dec!(980));
        assert_eq!(tree.breakdown().equipment, dec!(500));
        assert_eq!(tree.breakdown().engineering(), dec!(480));
    }

    #[test]
    fn test_scale_leaf_then_recompute_keeps_invariant() {
        let mut tree = sample_tree();
        let leaves = tree.leaves();
        tree.scale_leaf(leaves[0], dec!(1.1));
        tree.recompute_totals();
        assert_eq!(tree.node_total(leaves[0]), dec!(352));
        assert_eq!(tree.total(), dec!(1012));
        for item in tree.to_items() {
            assert!(item.is_consistent());
        }
    }

    #[test]
    fn test_set_leaf_total_on_empty_leaf() {
        let mut tree = CostTree::new();
        let id = tree.add_root("1", "Empty", CostBreakdown::default(), "");
        tree.set_leaf_total(id, dec!(25));
        assert_eq!(tree.node_total(id), dec!(25));
        assert_eq!(tree.breakdown().construction, dec!(25));
    }

    #[test]
    fn test_group_item_sums_children() {
        let group = CostItem::group(
            "B",
            "Fees",
            vec![
                CostItem::line("1", "x", dec!(10), ""),
                CostItem::line("2", "y", dec!(5), ""),
            ],
            "",
        );
        assert_eq!(group.total, dec!(15));
        assert_eq!(group.categories().other, dec!(15));
        assert!(group.is_consistent());
        assert_eq!(group.leaves().len(), 2);
        assert_eq!(group.find("2").map(|c| c.total), Some(dec!(5)));
    }
}
