use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::metrics::{discount_factors, irr, npv, payback, IrrEstimate, Payback, DEFAULT_IRR_GUESS};
use crate::error::EstimateError;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::EstimateResult;

/// Yearly project flows the cash-flow series are built from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectCashFlowInput {
    /// Investment spent in each construction year (positive amounts)
    pub construction_outlays: Vec<Money>,
    /// Operating revenue per operating year
    pub operating_inflows: Vec<Money>,
    /// Operating costs and taxes other than income tax, per operating year
    pub operating_outflows: Vec<Money>,
    /// Income tax per operating year
    pub income_tax: Vec<Money>,
    /// Recovered at the end of the last operating year
    pub residual_value: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectCashFlows {
    pub pre_tax: Vec<Money>,
    pub post_tax: Vec<Money>,
}

/// Build pre- and post-tax yearly series: construction years carry the
/// outlays as negative flows, operating years net inflows against outflows,
/// the last year adds the residual value.
pub fn project_cash_flows(input: &ProjectCashFlowInput) -> EstimateResult<ProjectCashFlows> {
    let operating_years = input
        .operating_inflows
        .len()
        .max(input.operating_outflows.len())
        .max(input.income_tax.len());
    if input.construction_outlays.is_empty() && operating_years == 0 {
        return Err(EstimateError::invalid(
            "project",
            "needs at least one construction or operating year",
        ));
    }
    let negatives = [
        ("construction_outlays", &input.construction_outlays),
        ("operating_inflows", &input.operating_inflows),
        ("operating_outflows", &input.operating_outflows),
        ("income_tax", &input.income_tax),
    ];
    for (field, values) in negatives {
        if values.iter().any(|v| *v < Decimal::ZERO) {
            return Err(EstimateError::invalid(field, "amounts cannot be negative"));
        }
    }
    if input.residual_value < Decimal::ZERO {
        return Err(EstimateError::invalid(
            "residual_value",
            "cannot be negative",
        ));
    }

    let at = |values: &[Money], i: usize| values.get(i).copied().unwrap_or(Decimal::ZERO);

    let mut pre_tax: Vec<Money> = input.construction_outlays.iter().map(|o| -*o).collect();
    let mut post_tax = pre_tax.clone();
    for i in 0..operating_years {
        let net = at(&input.operating_inflows, i) - at(&input.operating_outflows, i);
        pre_tax.push(net);
        post_tax.push(net - at(&input.income_tax, i));
    }
    if let (Some(pre), Some(post)) = (pre_tax.last_mut(), post_tax.last_mut()) {
        *pre += input.residual_value;
        *post += input.residual_value;
    }

    Ok(ProjectCashFlows { pre_tax, post_tax })
}

/// One year of the indicator cash-flow table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowRow {
    pub year: u32,
    pub flow: Money,
    pub cumulative: Money,
    pub discount_factor: Decimal,
    pub discounted: Money,
    pub discounted_cumulative: Money,
}

/// Appraisal indicators for one cash-flow series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub npv: Money,
    pub irr: IrrEstimate,
    pub static_payback: Payback,
    pub dynamic_payback: Payback,
    pub cash_flows: Vec<CashFlowRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialIndicators {
    pub discount_rate: Rate,
    pub pre_tax: IndicatorSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_tax: Option<IndicatorSet>,
}

/// Input for the indicator bundle: explicit series, or project flows to
/// build them from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorInput {
    /// Benchmark rate for NPV and dynamic payback
    pub discount_rate: Rate,
    /// Yearly pre-tax flows, year 1 first
    #[serde(default)]
    pub pre_tax_cash_flows: Vec<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_tax_cash_flows: Option<Vec<Money>>,
    /// Used instead of the explicit series when those are empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectCashFlowInput>,
    /// Starting rate for the IRR search (default 10%)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub irr_guess: Option<Rate>,
}

/// IRR, NPV and static/dynamic payback for the pre-tax series and, when
/// present, the post-tax series.
pub fn financial_indicators(
    input: &IndicatorInput,
) -> EstimateResult<ComputationOutput<FinancialIndicators>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.discount_rate <= -Decimal::ONE {
        return Err(EstimateError::invalid(
            "discount_rate",
            "must be greater than -100%",
        ));
    }
    let (pre_tax, post_tax) = match (&input.project, input.pre_tax_cash_flows.is_empty()) {
        (Some(project), true) => {
            let flows = project_cash_flows(project)?;
            (flows.pre_tax, Some(flows.post_tax))
        }
        (Some(_), false) => {
            warnings.push("Explicit cash-flow series given; project flows ignored".into());
            (input.pre_tax_cash_flows.clone(), input.post_tax_cash_flows.clone())
        }
        (None, true) => {
            return Err(EstimateError::invalid(
                "pre_tax_cash_flows",
                "provide a cash-flow series or project flows",
            ));
        }
        (None, false) => (input.pre_tax_cash_flows.clone(), input.post_tax_cash_flows.clone()),
    };
    if let Some(post) = &post_tax {
        if post.len() != pre_tax.len() {
            return Err(EstimateError::invalid(
                "post_tax_cash_flows",
                format!(
                    "has {} years but the pre-tax series has {}",
                    post.len(),
                    pre_tax.len()
                ),
            ));
        }
    }

    let guess = input.irr_guess.unwrap_or(DEFAULT_IRR_GUESS);
    let pre = indicator_set(&pre_tax, input.discount_rate, guess)?;
    let post = post_tax
        .as_deref()
        .map(|flows| indicator_set(flows, input.discount_rate, guess))
        .transpose()?;

    for (label, set) in [("pre-tax", Some(&pre)), ("post-tax", post.as_ref())] {
        let Some(set) = set else { continue };
        if let IrrEstimate::NotComputable { reason } = &set.irr {
            warnings.push(format!("{label} IRR not computable: {reason}"));
        }
        if set.static_payback == Payback::Unrecovered {
            warnings.push(format!("{label} investment is not recovered within the horizon"));
        }
    }

    let output = FinancialIndicators {
        discount_rate: input.discount_rate,
        pre_tax: pre,
        post_tax: post,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Project appraisal: NPV at benchmark rate, Newton-Raphson IRR, static and dynamic payback",
        &serde_json::json!({
            "discount_rate": input.discount_rate.to_string(),
            "years": pre_tax.len(),
            "first_flow_year": 1,
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn indicator_set(flows: &[Money], rate: Rate, guess: Rate) -> EstimateResult<IndicatorSet> {
    let factors = discount_factors(rate, flows.len())?;

    let mut rows = Vec::with_capacity(flows.len());
    let mut cumulative = Decimal::ZERO;
    let mut discounted_cumulative = Decimal::ZERO;
    let mut discounted_flows = Vec::with_capacity(flows.len());
    for (i, (flow, factor)) in flows.iter().zip(&factors).enumerate() {
        let discounted = flow * factor;
        cumulative += flow;
        discounted_cumulative += discounted;
        discounted_flows.push(discounted);
        rows.push(CashFlowRow {
            year: i as u32 + 1,
            flow: *flow,
            cumulative,
            discount_factor: *factor,
            discounted,
            discounted_cumulative,
        });
    }

    Ok(IndicatorSet {
        npv: npv(rate, flows)?,
        irr: irr(flows, guess),
        static_payback: payback(flows),
        dynamic_payback: payback(&discounted_flows),
        cash_flows: rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_project_cash_flows() {
        let flows = project_cash_flows(&ProjectCashFlowInput {
            construction_outlays: vec![dec!(600), dec!(400)],
            operating_inflows: vec![dec!(500), dec!(500)],
            operating_outflows: vec![dec!(200), dec!(200)],
            income_tax: vec![dec!(50), dec!(50)],
            residual_value: dec!(100),
        })
        .unwrap();
        assert_eq!(
            flows.pre_tax,
            vec![dec!(-600), dec!(-400), dec!(300), dec!(400)]
        );
        assert_eq!(
            flows.post_tax,
            vec![dec!(-600), dec!(-400), dec!(250), dec!(350)]
        );
    }

    #[test]
    fn test_cash_flow_table_accumulates() {
        let set =
            indicator_set(&[dec!(-100), dec!(60), dec!(60)], dec!(0.25), DEFAULT_IRR_GUESS)
                .unwrap();
        assert_eq!(set.cash_flows[2].cumulative, dec!(20));
        assert_eq!(set.cash_flows[1].discounted, dec!(38.4));
        // -80 + 38.4 + 30.72
        assert_eq!(set.cash_flows[2].discounted_cumulative, dec!(-10.88));
        assert_eq!(set.dynamic_payback, Payback::Unrecovered);
    }

    #[test]
    fn test_mismatched_series_rejected() {
        let input = IndicatorInput {
            discount_rate: dec!(0.08),
            pre_tax_cash_flows: vec![dec!(-100), dec!(60), dec!(60)],
            post_tax_cash_flows: Some(vec![dec!(-100), dec!(50)]),
            project: None,
            irr_guess: None,
        };
        assert!(financial_indicators(&input).is_err());
    }

    #[test]
    fn test_missing_series_rejected() {
        let input = IndicatorInput {
            discount_rate: dec!(0.08),
            pre_tax_cash_flows: Vec::new(),
            post_tax_cash_flows: None,
            project: None,
            irr_guess: None,
        };
        assert!(financial_indicators(&input).is_err());
    }
}
