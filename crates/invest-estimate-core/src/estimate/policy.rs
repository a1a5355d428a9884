use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::EstimateError;
use crate::types::{Money, Rate};
use crate::EstimateResult;

/// Numeric policy for every bounded loop in an estimate.
///
/// Injected per call. The interest loop's absolute threshold and the
/// target-matching loop's relative threshold are independent values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergencePolicy {
    /// Round cap for the construction-management fee fixed point
    pub management_fee_max_iterations: u32,
    /// Absolute change below which the management fee is settled
    pub management_fee_epsilon: Money,
    /// Round cap for the interest / total-funding loop
    pub interest_max_iterations: u32,
    /// Absolute change in total funding below which the interest loop stops
    pub interest_epsilon: Money,
    /// Round cap for the target-matching adjustment loop
    pub adjustment_max_rounds: u32,
    /// Relative gap to the target accepted as final
    pub gap_threshold: Rate,
    /// Nudge applied to each leaf per round, as a share of its current value
    pub adjustment_step_rate: Rate,
    /// Cumulative cap on any leaf's movement, as a share of its original value
    pub max_item_adjustment: Rate,
    /// Minimum share of total funding every primary-works leaf must hold
    pub min_item_share: Rate,
    /// Slack allowed when checking the floor after re-convergence
    pub floor_tolerance: Money,
    /// Redistribution passes allowed for the floor
    pub floor_max_passes: u32,
    /// Share of the target allocated to the default primary-works buckets.
    /// The legacy calculator seeded 0.5, which saturates under the ±20% item
    /// limit before reaching the band.
    pub seed_share: Rate,
    /// Multiplier on the primary-works total used as the first funding guess
    pub funding_bootstrap_multiplier: Decimal,
}

impl Default for ConvergencePolicy {
    fn default() -> Self {
        Self {
            management_fee_max_iterations: 10,
            management_fee_epsilon: dec!(0.01),
            interest_max_iterations: 10,
            interest_epsilon: dec!(0.01),
            adjustment_max_rounds: 50,
            gap_threshold: dec!(0.015),
            adjustment_step_rate: dec!(0.0075),
            max_item_adjustment: dec!(0.20),
            min_item_share: dec!(0.01),
            floor_tolerance: dec!(0.01),
            floor_max_passes: 5,
            seed_share: dec!(0.75),
            funding_bootstrap_multiplier: dec!(1.5),
        }
    }
}

impl ConvergencePolicy {
    pub fn validate(&self) -> EstimateResult<()> {
        let caps = [
            (
                "management_fee_max_iterations",
                self.management_fee_max_iterations,
            ),
            ("interest_max_iterations", self.interest_max_iterations),
            ("adjustment_max_rounds", self.adjustment_max_rounds),
            ("floor_max_passes", self.floor_max_passes),
        ];
        for (field, cap) in caps {
            if cap == 0 {
                return Err(EstimateError::invalid(field, "must be at least 1"));
            }
        }

        let positive = [
            ("management_fee_epsilon", self.management_fee_epsilon),
            ("interest_epsilon", self.interest_epsilon),
            ("gap_threshold", self.gap_threshold),
            ("adjustment_step_rate", self.adjustment_step_rate),
            ("max_item_adjustment", self.max_item_adjustment),
            ("funding_bootstrap_multiplier", self.funding_bootstrap_multiplier),
        ];
        for (field, value) in positive {
            if value <= Decimal::ZERO {
                return Err(EstimateError::invalid(field, "must be positive"));
            }
        }

        let unit_interval = [
            ("adjustment_step_rate", self.adjustment_step_rate),
            ("max_item_adjustment", self.max_item_adjustment),
            ("min_item_share", self.min_item_share),
            ("seed_share", self.seed_share),
        ];
        for (field, value) in unit_interval {
            if value < Decimal::ZERO || value >= Decimal::ONE {
                return Err(EstimateError::invalid(field, "must be in [0, 1)"));
            }
        }
        if self.seed_share.is_zero() {
            return Err(EstimateError::invalid("seed_share", "must be positive"));
        }
        if self.floor_tolerance < Decimal::ZERO {
            return Err(EstimateError::invalid(
                "floor_tolerance",
                "cannot be negative",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_valid() {
        ConvergencePolicy::default().validate().unwrap();
    }

    #[test]
    fn test_thresholds_are_independent() {
        let policy = ConvergencePolicy::default();
        assert_eq!(policy.interest_epsilon, dec!(0.01));
        assert_eq!(policy.gap_threshold, dec!(0.015));
    }

    #[test]
    fn test_default_seed_share_sits_above_legacy_value() {
        assert_eq!(ConvergencePolicy::default().seed_share, dec!(0.75));
    }

    #[test]
    fn test_partial_policy_json_keeps_defaults() {
        let policy: ConvergencePolicy =
            serde_json::from_str(r#"{"adjustment_max_rounds": 5}"#).unwrap();
        assert_eq!(policy.adjustment_max_rounds, 5);
        assert_eq!(policy.gap_threshold, dec!(0.015));
    }

    #[test]
    fn test_zero_cap_rejected() {
        let policy = ConvergencePolicy {
            interest_max_iterations: 0,
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_seed_share_out_of_range_rejected() {
        let policy = ConvergencePolicy {
            seed_share: dec!(1.2),
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }
}
