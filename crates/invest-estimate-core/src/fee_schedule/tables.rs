use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::EstimateError;
use crate::types::{Money, Rate};
use crate::EstimateResult;

// ---------------------------------------------------------------------------
// Table types
// ---------------------------------------------------------------------------

/// One slice of a progressive schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bracket {
    /// Upper edge of the slice. `None` marks the open-ended top bracket; the
    /// last bracket is treated as open-ended whatever its bound says.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<Money>,
    /// Marginal rate charged on the slice (decimal, 0.02 = 2%)
    pub rate: Rate,
}

/// A tiered fee schedule evaluated like a progressive tax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressiveSchedule {
    pub name: String,
    pub brackets: Vec<Bracket>,
}

/// A single `(key, fee)` point of an interpolation table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub key: Money,
    pub fee: Money,
}

/// A fee table read by straight-line interpolation between breakpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpolationTable {
    pub name: String,
    pub points: Vec<Breakpoint>,
}

/// Fixed-percentage fee lines and reserve rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlatRates {
    /// Research and testing, on the primary-works total
    pub research_test: Rate,
    /// Environmental impact report, on total project funding
    pub environmental_report: Rate,
    /// Site preparation and temporary facilities, on the primary-works total
    pub site_preparation: Rate,
    /// Works insurance, on the primary-works total
    pub insurance: Rate,
    /// Inspection and testing, on the primary-works total
    pub inspection_test: Rate,
    /// Municipal public-facility charge, on the primary-works total
    pub municipal_facility: Rate,
    /// Sundry other costs, on the primary-works total
    pub other: Rate,
    /// Preliminary and detailed survey, on engineering cost
    pub preliminary_survey: Rate,
    /// Construction-stage survey, on engineering cost
    pub construction_survey: Rate,
    /// Basic contingency, on the parts one and two subtotal
    pub basic_contingency: Rate,
    /// Price-escalation reserve, on the parts one and two subtotal
    pub price_escalation: Rate,
}

impl Default for FlatRates {
    fn default() -> Self {
        Self {
            research_test: dec!(0.01),
            environmental_report: dec!(0.003),
            site_preparation: dec!(0.02),
            insurance: dec!(0.005),
            inspection_test: dec!(0.006),
            municipal_facility: dec!(0.015),
            other: dec!(0.005),
            preliminary_survey: dec!(0.003),
            construction_survey: dec!(0.012),
            basic_contingency: dec!(0.08),
            price_escalation: Decimal::ZERO,
        }
    }
}

/// Every schedule the ancillary-fee and reserve calculations read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeTables {
    pub management_fee: ProgressiveSchedule,
    pub bidding_engineering: ProgressiveSchedule,
    pub bidding_goods: ProgressiveSchedule,
    pub bidding_services: ProgressiveSchedule,
    pub supervision: InterpolationTable,
    pub design: InterpolationTable,
    /// Preliminary consulting sub-items, summed
    pub consulting: Vec<InterpolationTable>,
    pub rates: FlatRates,
}

impl Default for FeeTables {
    fn default() -> Self {
        Self {
            management_fee: management_fee_schedule(),
            bidding_engineering: bidding_engineering_schedule(),
            bidding_goods: bidding_goods_schedule(),
            bidding_services: bidding_services_schedule(),
            supervision: supervision_table(),
            design: design_table(),
            consulting: consulting_tables(),
            rates: FlatRates::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl ProgressiveSchedule {
    pub fn new(name: &str, brackets: Vec<Bracket>) -> EstimateResult<Self> {
        let schedule = Self {
            name: name.to_string(),
            brackets,
        };
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn validate(&self) -> EstimateResult<()> {
        if self.brackets.is_empty() {
            return Err(table_error(&self.name, "schedule has no brackets"));
        }
        let last = self.brackets.len() - 1;
        let mut previous = Decimal::ZERO;
        for (i, bracket) in self.brackets.iter().enumerate() {
            if bracket.rate < Decimal::ZERO {
                return Err(table_error(
                    &self.name,
                    format!("bracket {i} has a negative rate"),
                ));
            }
            match bracket.upper_bound {
                Some(bound) if bound <= previous => {
                    return Err(table_error(
                        &self.name,
                        format!("bracket {i} bound {bound} is not above {previous}"),
                    ));
                }
                Some(bound) => previous = bound,
                None if i != last => {
                    return Err(table_error(
                        &self.name,
                        "only the last bracket may be unbounded",
                    ));
                }
                None => {}
            }
        }
        Ok(())
    }
}

impl InterpolationTable {
    pub fn new(name: &str, points: Vec<Breakpoint>) -> EstimateResult<Self> {
        let table = Self {
            name: name.to_string(),
            points,
        };
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> EstimateResult<()> {
        if self.points.is_empty() {
            return Err(table_error(&self.name, "table has no breakpoints"));
        }
        for pair in self.points.windows(2) {
            if pair[1].key <= pair[0].key {
                return Err(table_error(
                    &self.name,
                    format!(
                        "keys must be strictly ascending ({} then {})",
                        pair[0].key, pair[1].key
                    ),
                ));
            }
        }
        if self.points.iter().any(|p| p.fee < Decimal::ZERO) {
            return Err(table_error(&self.name, "fees cannot be negative"));
        }
        Ok(())
    }
}

impl FlatRates {
    pub fn validate(&self) -> EstimateResult<()> {
        let named = [
            ("research_test", self.research_test),
            ("environmental_report", self.environmental_report),
            ("site_preparation", self.site_preparation),
            ("insurance", self.insurance),
            ("inspection_test", self.inspection_test),
            ("municipal_facility", self.municipal_facility),
            ("other", self.other),
            ("preliminary_survey", self.preliminary_survey),
            ("construction_survey", self.construction_survey),
            ("basic_contingency", self.basic_contingency),
            ("price_escalation", self.price_escalation),
        ];
        for (name, rate) in named {
            if rate < Decimal::ZERO || rate >= Decimal::ONE {
                return Err(table_error(
                    "flat_rates",
                    format!("{name} must be in [0, 1), got {rate}"),
                ));
            }
        }
        Ok(())
    }
}

impl FeeTables {
    pub fn validate(&self) -> EstimateResult<()> {
        self.management_fee.validate()?;
        self.bidding_engineering.validate()?;
        self.bidding_goods.validate()?;
        self.bidding_services.validate()?;
        self.supervision.validate()?;
        self.design.validate()?;
        for table in &self.consulting {
            table.validate()?;
        }
        // The management-fee recursion only contracts while every marginal
        // rate stays below 100%.
        if self
            .management_fee
            .brackets
            .iter()
            .any(|b| b.rate >= Decimal::ONE)
        {
            return Err(table_error(
                &self.management_fee.name,
                "marginal rates must be below 1",
            ));
        }
        self.rates.validate()
    }
}

fn table_error(table: &str, reason: impl Into<String>) -> EstimateError {
    EstimateError::InvalidFeeTable {
        table: table.to_string(),
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Statutory schedules
// ---------------------------------------------------------------------------

fn brackets(bounds: &[Decimal], rates: &[Rate], divisor: Decimal) -> Vec<Bracket> {
    rates
        .iter()
        .enumerate()
        .map(|(i, rate)| Bracket {
            upper_bound: bounds.get(i).copied(),
            rate: *rate / divisor,
        })
        .collect()
}

fn points(pairs: &[(Decimal, Decimal)]) -> Vec<Breakpoint> {
    pairs
        .iter()
        .map(|&(key, fee)| Breakpoint { key, fee })
        .collect()
}

const BIDDING_BOUNDS: [Decimal; 9] = [
    dec!(100),
    dec!(500),
    dec!(1000),
    dec!(5000),
    dec!(10000),
    dec!(50000),
    dec!(100000),
    dec!(500000),
    dec!(1000000),
];

/// Construction-management fee, charged progressively on
/// `total funding − land − fee`.
pub fn management_fee_schedule() -> ProgressiveSchedule {
    ProgressiveSchedule {
        name: "construction_management".into(),
        brackets: brackets(
            &[
                dec!(1000),
                dec!(5000),
                dec!(10000),
                dec!(50000),
                dec!(100000),
            ],
            &[
                dec!(0.02),
                dec!(0.015),
                dec!(0.012),
                dec!(0.01),
                dec!(0.008),
                dec!(0.004),
            ],
            Decimal::ONE,
        ),
    }
}

/// Works-tender agency fee, rates in per mille.
pub fn bidding_engineering_schedule() -> ProgressiveSchedule {
    ProgressiveSchedule {
        name: "bidding_engineering".into(),
        brackets: brackets(
            &BIDDING_BOUNDS,
            &[
                dec!(6.3),
                dec!(4.41),
                dec!(3.465),
                dec!(2.205),
                dec!(1.26),
                dec!(0.315),
                dec!(0.221),
                dec!(0.05),
                dec!(0.038),
                dec!(0.025),
            ],
            dec!(1000),
        ),
    }
}

/// Goods-tender agency fee, rates in per mille.
pub fn bidding_goods_schedule() -> ProgressiveSchedule {
    ProgressiveSchedule {
        name: "bidding_goods".into(),
        brackets: brackets(
            &BIDDING_BOUNDS,
            &[
                dec!(9.45),
                dec!(6.93),
                dec!(5.04),
                dec!(3.15),
                dec!(1.575),
                dec!(0.315),
                dec!(0.221),
                dec!(0.05),
                dec!(0.038),
                dec!(0.025),
            ],
            dec!(1000),
        ),
    }
}

/// Services-tender agency fee, rates in per mille.
pub fn bidding_services_schedule() -> ProgressiveSchedule {
    ProgressiveSchedule {
        name: "bidding_services".into(),
        brackets: brackets(
            &BIDDING_BOUNDS,
            &[
                dec!(9.45),
                dec!(5.04),
                dec!(2.853),
                dec!(1.575),
                dec!(0.63),
                dec!(0.315),
                dec!(0.221),
                dec!(0.05),
                dec!(0.038),
                dec!(0.025),
            ],
            dec!(1000),
        ),
    }
}

/// Works supervision base fee by engineering cost.
pub fn supervision_table() -> InterpolationTable {
    InterpolationTable {
        name: "supervision".into(),
        points: points(&[
            (dec!(500), dec!(13.20)),
            (dec!(1000), dec!(24.08)),
            (dec!(3000), dec!(62.48)),
            (dec!(5000), dec!(96.64)),
            (dec!(8000), dec!(144.80)),
            (dec!(10000), dec!(174.88)),
            (dec!(20000), dec!(314.72)),
            (dec!(40000), dec!(566.56)),
            (dec!(60000), dec!(793.12)),
            (dec!(80000), dec!(1004.64)),
            (dec!(100000), dec!(1205.60)),
            (dec!(200000), dec!(2170.00)),
            (dec!(400000), dec!(3906.08)),
            (dec!(600000), dec!(5468.48)),
            (dec!(800000), dec!(6926.72)),
            (dec!(1000000), dec!(8312.08)),
        ]),
    }
}

/// Engineering design base fee by engineering cost.
pub fn design_table() -> InterpolationTable {
    InterpolationTable {
        name: "design".into(),
        points: points(&[
            (dec!(200), dec!(8.10)),
            (dec!(500), dec!(18.81)),
            (dec!(1000), dec!(34.92)),
            (dec!(3000), dec!(93.42)),
            (dec!(5000), dec!(147.51)),
            (dec!(8000), dec!(224.64)),
            (dec!(10000), dec!(274.32)),
            (dec!(20000), dec!(510.12)),
            (dec!(40000), dec!(948.60)),
            (dec!(60000), dec!(1363.68)),
            (dec!(80000), dec!(1764.09)),
            (dec!(100000), dec!(2154.06)),
            (dec!(200000), dec!(4005.72)),
            (dec!(400000), dec!(7449.03)),
            (dec!(600000), dec!(10707.75)),
            (dec!(800000), dec!(13852.26)),
            (dec!(1000000), dec!(16914.42)),
            (dec!(2000000), dec!(31454.01)),
        ]),
    }
}

const CONSULTING_KEYS: [Decimal; 7] = [
    dec!(500),
    dec!(1000),
    dec!(3000),
    dec!(10000),
    dec!(50000),
    dec!(100000),
    dec!(500000),
];

fn consulting_table(name: &str, fees: [Decimal; 7]) -> InterpolationTable {
    InterpolationTable {
        name: name.into(),
        points: CONSULTING_KEYS
            .iter()
            .zip(fees)
            .map(|(&key, fee)| Breakpoint { key, fee })
            .collect(),
    }
}

/// Preliminary consulting sub-items, each keyed on total project funding
/// (mid-points of the statutory ranges).
pub fn consulting_tables() -> Vec<InterpolationTable> {
    let review = [
        dec!(1.0),
        dec!(1.6),
        dec!(3.0),
        dec!(6.0),
        dec!(10.0),
        dec!(14.0),
        dec!(18.0),
    ];
    vec![
        consulting_table(
            "project_proposal",
            [
                dec!(1.0),
                dec!(1.6),
                dec!(3.4),
                dec!(8.0),
                dec!(20.4),
                dec!(36.8),
                dec!(62.0),
            ],
        ),
        consulting_table(
            "feasibility_study",
            [
                dec!(2.4),
                dec!(4.0),
                dec!(7.2),
                dec!(16.0),
                dec!(41.2),
                dec!(74.0),
                dec!(124.0),
            ],
        ),
        consulting_table(
            "proposal_review",
            [
                dec!(0.6),
                dec!(1.0),
                dec!(2.2),
                dec!(4.8),
                dec!(8.0),
                dec!(10.8),
                dec!(12.8),
            ],
        ),
        consulting_table("feasibility_review", review),
        consulting_table("preliminary_design_review", review),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statutory_tables_validate() {
        FeeTables::default().validate().unwrap();
    }

    #[test]
    fn test_bidding_rates_are_per_mille() {
        let schedule = bidding_engineering_schedule();
        assert_eq!(schedule.brackets.len(), 10);
        assert_eq!(schedule.brackets[0].rate, dec!(0.0063));
        assert_eq!(schedule.brackets[9].upper_bound, None);
    }

    #[test]
    fn test_unbounded_bracket_must_be_last() {
        let err = ProgressiveSchedule::new(
            "broken",
            vec![
                Bracket {
                    upper_bound: None,
                    rate: dec!(0.01),
                },
                Bracket {
                    upper_bound: Some(dec!(100)),
                    rate: dec!(0.02),
                },
            ],
        )
        .unwrap_err();
        assert!(matches!(err, EstimateError::InvalidFeeTable { .. }));
    }

    #[test]
    fn test_descending_keys_rejected() {
        let result = InterpolationTable::new(
            "descending",
            vec![
                Breakpoint {
                    key: dec!(1000),
                    fee: dec!(10),
                },
                Breakpoint {
                    key: dec!(500),
                    fee: dec!(5),
                },
            ],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_fee_tables_round_trip_with_partial_json() {
        let tables: FeeTables =
            serde_json::from_str(r#"{"rates": {"municipal_facility": "0.02"}}"#).unwrap();
        assert_eq!(tables.rates.municipal_facility, dec!(0.02));
        assert_eq!(tables.rates.insurance, dec!(0.005));
        assert_eq!(tables.supervision, supervision_table());
    }
}
