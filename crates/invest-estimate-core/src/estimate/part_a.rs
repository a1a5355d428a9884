use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::cost_tree::{CostBreakdown, CostItem, CostTree, NodeId};
use super::policy::ConvergencePolicy;
use crate::error::EstimateError;
use crate::types::{Money, Rate};
use crate::EstimateResult;

/// Sector the project belongs to. Agriculture and water-conservancy projects
/// are exempt from the municipal-facility charge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectCategory {
    #[default]
    Construction,
    Agriculture,
    WaterConservancy,
}

impl ProjectCategory {
    pub fn pays_municipal_facility_fee(&self) -> bool {
        matches!(self, ProjectCategory::Construction)
    }
}

/// A pre-itemized primary-works line, possibly with sub-items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftedCostItem {
    pub name: String,
    pub construction_cost: Money,
    pub equipment_cost: Money,
    pub installation_cost: Money,
    pub other_cost: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DraftedCostItem>,
}

impl DraftedCostItem {
    pub fn breakdown(&self) -> CostBreakdown {
        CostBreakdown {
            construction: self.construction_cost,
            equipment: self.equipment_cost,
            installation: self.installation_cost,
            other: self.other_cost,
        }
    }
}

/// Everything an estimate is computed from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectParameters {
    /// Label only; carried through to the result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    /// Total project funding the estimate should land on
    pub target_investment: Money,
    /// Construction period in whole years
    pub construction_years: u32,
    /// Operating period in whole years
    pub operation_years: u32,
    /// Share of construction investment financed by debt (0..=1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loan_ratio: Option<Rate>,
    /// Fixed loan amount; takes precedence over `loan_ratio`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loan_amount_override: Option<Money>,
    /// Simple annual interest rate on drawn principal
    #[serde(default)]
    pub annual_loan_rate: Rate,
    #[serde(default)]
    pub land_cost: Money,
    /// Pre-itemized primary works; empty means seed the default buckets
    #[serde(default)]
    pub drafted_items: Vec<DraftedCostItem>,
    #[serde(default)]
    pub project_category: ProjectCategory,
}

pub fn validate_parameters(params: &ProjectParameters) -> EstimateResult<()> {
    if params.target_investment <= Decimal::ZERO {
        return Err(EstimateError::invalid(
            "target_investment",
            "must be positive",
        ));
    }
    if params.construction_years == 0 {
        return Err(EstimateError::invalid(
            "construction_years",
            "must be at least 1",
        ));
    }
    if params.operation_years == 0 {
        return Err(EstimateError::invalid(
            "operation_years",
            "must be at least 1",
        ));
    }
    if let Some(ratio) = params.loan_ratio {
        if ratio < Decimal::ZERO || ratio > Decimal::ONE {
            return Err(EstimateError::invalid(
                "loan_ratio",
                format!("must be between 0 and 1, got {ratio}"),
            ));
        }
    }
    if let Some(amount) = params.loan_amount_override {
        if amount < Decimal::ZERO {
            return Err(EstimateError::invalid(
                "loan_amount_override",
                "cannot be negative",
            ));
        }
    }
    if params.annual_loan_rate < Decimal::ZERO {
        return Err(EstimateError::invalid(
            "annual_loan_rate",
            "cannot be negative",
        ));
    }
    if params.land_cost < Decimal::ZERO {
        return Err(EstimateError::invalid("land_cost", "cannot be negative"));
    }
    for (i, item) in params.drafted_items.iter().enumerate() {
        validate_drafted(item, &format!("drafted_items[{i}]"))?;
    }
    Ok(())
}

fn validate_drafted(item: &DraftedCostItem, path: &str) -> EstimateResult<()> {
    if !item.breakdown().is_non_negative() {
        return Err(EstimateError::invalid(
            path,
            format!("'{}' has a negative cost category", item.name),
        ));
    }
    for (i, child) in item.children.iter().enumerate() {
        validate_drafted(child, &format!("{path}.children[{i}]"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

struct Bucket {
    name: &'static str,
    construction: Rate,
    equipment: Rate,
    installation: Rate,
    other: Rate,
}

const DEFAULT_BUCKETS: [Bucket; 3] = [
    Bucket {
        name: "Main works",
        construction: dec!(0.40),
        equipment: dec!(0.30),
        installation: dec!(0.15),
        other: dec!(0.05),
    },
    Bucket {
        name: "Auxiliary works",
        construction: dec!(0.05),
        equipment: dec!(0.02),
        installation: dec!(0.01),
        other: dec!(0.01),
    },
    Bucket {
        name: "Other works",
        construction: dec!(0.005),
        equipment: Decimal::ZERO,
        installation: Decimal::ZERO,
        other: dec!(0.005),
    },
];

/// Build the primary-works tree: the drafted list when one is supplied,
/// otherwise the three canonical buckets sized off `target × seed_share`.
pub fn seed_primary_works(params: &ProjectParameters, policy: &ConvergencePolicy) -> CostTree {
    let mut tree = CostTree::new();

    if params.drafted_items.is_empty() {
        let share = params.target_investment * policy.seed_share;
        for (i, bucket) in DEFAULT_BUCKETS.iter().enumerate() {
            let breakdown = CostBreakdown {
                construction: share * bucket.construction,
                equipment: share * bucket.equipment,
                installation: share * bucket.installation,
                other: share * bucket.other,
            };
            tree.add_root(&(i + 1).to_string(), bucket.name, breakdown, "default allocation");
        }
    } else {
        for (i, item) in params.drafted_items.iter().enumerate() {
            let code = (i + 1).to_string();
            let root = tree.add_root(&code, &item.name, item.breakdown(), remark(item));
            add_drafted_children(&mut tree, root, &code, &item.children);
        }
    }

    tree.recompute_totals();
    tree
}

fn add_drafted_children(
    tree: &mut CostTree,
    parent: NodeId,
    parent_code: &str,
    children: &[DraftedCostItem],
) {
    for (i, child) in children.iter().enumerate() {
        let code = format!("{parent_code}.{}", i + 1);
        let id = tree.add_child(parent, &code, &child.name, child.breakdown(), remark(child));
        add_drafted_children(tree, id, &code, &child.children);
    }
}

fn remark(item: &DraftedCostItem) -> &str {
    item.remark.as_deref().unwrap_or("")
}

/// Part A as a single summary row over the tree.
pub fn part_a_item(tree: &CostTree) -> CostItem {
    CostItem::group("A", "Primary works", tree.to_items(), "")
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn test_default_buckets_use_seed_share() {
        let tree = seed_primary_works(&params(), &ConvergencePolicy::default());
        // 10000 * 0.75 = 7500 share; bucket weights sum to 1.0
        assert_eq!(tree.total(), dec!(7500));
        assert_eq!(tree.leaves().len(), 3);
        assert_eq!(tree.breakdown().equipment, dec!(2400));
    }

    #[test]
    fn test_drafted_items_nest() {
        let mut p = params();
        p.drafted_items = vec![DraftedCostItem {
            name: "Plant".into(),
            children: vec![
                DraftedCostItem {
                    name: "Hall".into(),
                    construction_cost: dec!(1200),
                    ..Default::default()
                },
                DraftedCostItem {
                    name: "Line".into(),
                    equipment_cost: dec!(800),
                    installation_cost: dec!(100),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }];
        let tree = seed_primary_works(&p, &ConvergencePolicy::default());
        let item = part_a_item(&tree);
        assert_eq!(item.total, dec!(2100));
        assert_eq!(item.children[0].children[1].code, "1.2");
        assert!(item.is_consistent());
    }

    #[test]
    fn test_negative_drafted_amount_rejected() {
        let mut p = params();
        p.drafted_items = vec![DraftedCostItem {
            name: "Bad".into(),
            other_cost: dec!(-1),
            ..Default::default()
        }];
        let err = validate_parameters(&p).unwrap_err();
        assert!(matches!(err, EstimateError::InvalidInput { .. }));
    }

    #[test]
    fn test_zero_construction_years_rejected() {
        let mut p = params();
        p.construction_years = 0;
        assert!(validate_parameters(&p).is_err());
    }

    #[test]
    fn test_loan_ratio_above_one_rejected() {
        let mut p = params();
        p.loan_ratio = Some(dec!(1.2));
        assert!(validate_parameters(&p).is_err());
    }

    #[test]
    fn test_municipal_exemption() {
        assert!(ProjectCategory::Construction.pays_municipal_facility_fee());
        assert!(!ProjectCategory::Agriculture.pays_municipal_facility_fee());
        assert!(!ProjectCategory::WaterConservancy.pays_municipal_facility_fee());
    }
}
