use serde::{Deserialize, Serialize};

use super::cost_tree::{CostBreakdown, CostItem};
use crate::fee_schedule::FlatRates;
use crate::types::Money;

/// Parts C, D and E derived from A and B.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryParts {
    /// Parts one and two subtotal
    pub c: CostItem,
    /// Reserves
    pub d: CostItem,
    /// Construction investment
    pub e: CostItem,
}

pub(crate) fn summarize(a: &CostItem, b: &CostItem, rates: &FlatRates) -> SummaryParts {
    let c_split = a.categories() + b.categories();
    let c = CostItem::leaf("C", "Subtotal of parts A and B", c_split, "A + B");

    let subtotal = c.total;
    let d = CostItem::group(
        "D",
        "Reserves",
        vec![
            CostItem::line(
                "1",
                "Basic contingency",
                subtotal * rates.basic_contingency,
                "on subtotal C",
            ),
            CostItem::line(
                "2",
                "Price-escalation reserve",
                subtotal * rates.price_escalation,
                "flat rate on subtotal C",
            ),
        ],
        "",
    );

    let e_split = c_split + d.categories();
    let e = CostItem::leaf("E", "Construction investment", e_split, "C + D");

    SummaryParts { c, d, e }
}

/// Part G: construction investment plus capitalized interest.
pub(crate) fn grand_total(e: &CostItem, interest: Money) -> CostItem {
    let split = e.categories() + CostBreakdown::other_only(interest);
    CostItem::leaf("G", "Total project funding", split, "E + F")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_summary_chain() {
        let a = CostItem::leaf(
            "A",
            "Primary works",
            CostBreakdown {
                construction: dec!(600),
                equipment: dec!(300),
                installation: dec!(100),
                other: dec!(0),
            },
            "",
        );
        let b = CostItem::line("B", "Ancillary fees", dec!(250), "");
        let parts = summarize(&a, &b, &FlatRates::default());

        assert_eq!(parts.c.total, dec!(1250));
        assert_eq!(parts.d.total, dec!(100));
        assert_eq!(parts.e.total, dec!(1350));
        assert_eq!(parts.e.categories().equipment, dec!(300));

        let g = grand_total(&parts.e, dec!(42.5));
        assert_eq!(g.total, dec!(1392.5));
        assert!(g.is_consistent());
    }
}
